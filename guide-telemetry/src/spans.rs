//! Span helpers for pipeline operations
//!
//! Pre-configured spans for instrumenting runs, stages, loop iterations, model
//! calls and tool executions.

use tracing::Span;

/// Create a span covering one pipeline run
///
/// # Example
/// ```
/// use guide_telemetry::pipeline_run_span;
/// let span = pipeline_run_span("inv-123", "user-1");
/// let _enter = span.enter();
/// ```
pub fn pipeline_run_span(invocation_id: &str, user_id: &str) -> Span {
    tracing::info_span!(
        "pipeline.run",
        invocation.id = invocation_id,
        user.id = user_id,
        otel.kind = "internal"
    )
}

/// Create a span for one stage execution
pub fn stage_run_span(stage_name: &str, invocation_id: &str) -> Span {
    tracing::info_span!(
        "stage.run",
        stage.name = stage_name,
        invocation.id = invocation_id,
        otel.kind = "internal"
    )
}

/// Create a span for one elaboration loop iteration (1-based)
pub fn loop_iteration_span(loop_name: &str, iteration: u32, max_iterations: u32) -> Span {
    tracing::info_span!(
        "loop.iteration",
        loop.name = loop_name,
        loop.iteration = iteration,
        loop.max_iterations = max_iterations,
    )
}

/// Create a span for model API calls
///
/// # Example
/// ```
/// use guide_telemetry::model_call_span;
/// let span = model_call_span("gemini-2.5-flash-lite");
/// let _enter = span.enter();
/// ```
pub fn model_call_span(model_name: &str) -> Span {
    tracing::info_span!("model.call", model.name = model_name, otel.kind = "client")
}

/// Create a span for tool execution
pub fn tool_execute_span(tool_name: &str) -> Span {
    tracing::info_span!("tool.execute", tool.name = tool_name, otel.kind = "internal")
}
