//! Telemetry initialization and configuration

use serde::{Deserialize, Serialize};
use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging setup chosen at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Default filter directive, used when `RUST_LOG` is unset.
    pub log_level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// OTLP collector endpoint (e.g. "http://localhost:4317").
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
            otlp_endpoint: None,
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }
}

fn env_filter(default_directive: &str) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(default_directive)?),
    }
}

/// Initialize telemetry from a [`TelemetryConfig`].
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init(config: &TelemetryConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(endpoint) = &config.otlp_endpoint {
        return init_otlp_with_filter(&config.service_name, endpoint, &config.log_level);
    }

    let filter = env_filter(&config.log_level)?;
    let format = config.format;
    let service_name = config.service_name.clone();

    INIT.call_once(|| {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .with_writer(std::io::stderr);
        let registry = tracing_subscriber::registry().with(filter);
        // try_init: tests and embedding applications may already own the global subscriber
        let installed = match format {
            LogFormat::Pretty => registry.with(fmt_layer).try_init(),
            LogFormat::Json => registry.with(fmt_layer.json()).try_init(),
        };
        if installed.is_ok() {
            tracing::info!(service.name = %service_name, "Telemetry initialized");
        }
    });

    Ok(())
}

/// Initialize basic telemetry with console logging
///
/// # Example
/// ```
/// use guide_telemetry::init_telemetry;
/// init_telemetry("study-guide").expect("Failed to initialize telemetry");
/// ```
pub fn init_telemetry(service_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    init(&TelemetryConfig::new(service_name))
}

/// Initialize telemetry with OpenTelemetry OTLP export
///
/// # Example
/// ```no_run
/// use guide_telemetry::init_with_otlp;
/// init_with_otlp("study-guide", "http://localhost:4317")
///     .expect("Failed to initialize telemetry");
/// ```
pub fn init_with_otlp(service_name: &str, endpoint: &str) -> Result<(), Box<dyn std::error::Error>> {
    init_otlp_with_filter(service_name, endpoint, "info")
}

fn init_otlp_with_filter(
    service_name: &str,
    endpoint: &str,
    default_directive: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig;
    use tracing_opentelemetry::OpenTelemetryLayer;

    if INIT.is_completed() {
        return Ok(());
    }

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
        .with_trace_config(opentelemetry_sdk::trace::config().with_resource(
            opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                "service.name",
                service_name.to_string(),
            )]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;
    let filter = env_filter(default_directive)?;

    INIT.call_once(|| {
        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .with(OpenTelemetryLayer::new(tracer))
            .try_init();
        if installed.is_ok() {
            tracing::info!(
                service.name = service_name,
                otlp.endpoint = endpoint,
                "Telemetry initialized with OpenTelemetry"
            );
        }
    });

    Ok(())
}

/// Shutdown telemetry and flush any pending spans
///
/// Should be called before application exit to ensure all telemetry data is sent.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}
