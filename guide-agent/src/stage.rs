use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use guide_core::{
    Agent, Content, Event, EventActions, EventStream, GenerateContentConfig, GuideError,
    InvocationContext, Llm, LlmRequest, LlmResponse, MissingKeyPolicy, Part, PipelineState,
    Result, Tool, ToolContext, inject_state, parse_json_output,
};
use guide_telemetry::Instrument;
use jsonschema::Validator;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Model/tool exchanges a single stage may perform before it must answer.
pub const MAX_TOOL_ROUNDS: u32 = 10;

/// User turn sent to stages that do not see the caller's request.
const CONTINUE_PROMPT: &str = "Continue with your task using the information in your instructions.";

/// How a stage's output is written to its key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Replace whatever the key held.
    #[default]
    Overwrite,
    /// Push onto the array at the key. Blank output leaves the key untouched.
    Append,
}

/// Whether the caller's request is part of the conversation sent to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IncludeContents {
    #[default]
    Default,
    /// Only the resolved instruction; everything the stage needs comes from state.
    None,
}

pub type StateCallback = Arc<dyn Fn(&PipelineState) -> Result<()> + Send + Sync>;
pub type OutputTransform = Arc<dyn Fn(String) -> String + Send + Sync>;

/// One completion call against a fixed instruction template.
///
/// The template is resolved against [`PipelineState`] right before the call,
/// the model may call the stage's tools, and the final answer is validated
/// and stored under the output key.
pub struct Stage {
    name: String,
    description: String,
    model: Arc<dyn Llm>,
    instruction: String,
    tools: Vec<Arc<dyn Tool>>,
    output_schema: Option<Value>,
    validator: Option<Arc<Validator>>,
    output_key: Option<String>,
    output_mode: OutputMode,
    include_contents: IncludeContents,
    missing_keys: MissingKeyPolicy,
    before_callback: Option<StateCallback>,
    output_transform: Option<OutputTransform>,
    streaming: bool,
    temperature: Option<f32>,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("output_key", &self.output_key)
            .field("output_mode", &self.output_mode)
            .field("include_contents", &self.include_contents)
            .finish()
    }
}

impl Stage {
    pub fn builder(name: impl Into<String>) -> StageBuilder {
        StageBuilder::new(name)
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

pub struct StageBuilder {
    name: String,
    description: String,
    model: Option<Arc<dyn Llm>>,
    instruction: String,
    tools: Vec<Arc<dyn Tool>>,
    output_schema: Option<Value>,
    output_key: Option<String>,
    output_mode: OutputMode,
    include_contents: IncludeContents,
    missing_keys: MissingKeyPolicy,
    before_callback: Option<StateCallback>,
    output_transform: Option<OutputTransform>,
    streaming: bool,
    temperature: Option<f32>,
}

impl StageBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            model: None,
            instruction: String::new(),
            tools: Vec::new(),
            output_schema: None,
            output_key: None,
            output_mode: OutputMode::Overwrite,
            include_contents: IncludeContents::Default,
            missing_keys: MissingKeyPolicy::Error,
            before_callback: None,
            output_transform: None,
            streaming: false,
            temperature: None,
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn model(mut self, model: Arc<dyn Llm>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn include_contents(mut self, include: IncludeContents) -> Self {
        self.include_contents = include;
        self
    }

    pub fn missing_keys(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_keys = policy;
        self
    }

    /// Runs against the state before the instruction is resolved.
    pub fn before_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PipelineState) -> Result<()> + Send + Sync + 'static,
    {
        self.before_callback = Some(Arc::new(callback));
        self
    }

    /// Rewrites the final answer before it is validated and stored.
    pub fn output_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        self.output_transform = Some(Arc::new(transform));
        self
    }

    /// Request streamed responses and forward partial events.
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn build(self) -> Result<Stage> {
        let model = self
            .model
            .ok_or_else(|| GuideError::Config(format!("Stage '{}' requires a model", self.name)))?;

        let mut seen = std::collections::HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name()) {
                return Err(GuideError::Config(format!(
                    "Stage '{}' has duplicate tool '{}'",
                    self.name,
                    tool.name()
                )));
            }
        }

        let validator = match &self.output_schema {
            Some(schema) => Some(Arc::new(jsonschema::validator_for(schema).map_err(|e| {
                GuideError::Config(format!("Stage '{}' has an invalid output schema: {}", self.name, e))
            })?)),
            None => None,
        };

        Ok(Stage {
            name: self.name,
            description: self.description,
            model,
            instruction: self.instruction,
            tools: self.tools,
            output_schema: self.output_schema,
            validator,
            output_key: self.output_key,
            output_mode: self.output_mode,
            include_contents: self.include_contents,
            missing_keys: self.missing_keys,
            before_callback: self.before_callback,
            output_transform: self.output_transform,
            streaming: self.streaming,
            temperature: self.temperature,
        })
    }
}

struct StageToolContext {
    function_call_id: String,
    stage_name: String,
    actions: Mutex<EventActions>,
}

impl ToolContext for StageToolContext {
    fn function_call_id(&self) -> &str {
        &self.function_call_id
    }

    fn stage_name(&self) -> &str {
        &self.stage_name
    }

    fn actions(&self) -> EventActions {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_actions(&self, actions: EventActions) {
        *self.actions.lock().unwrap_or_else(PoisonError::into_inner) = actions;
    }
}

/// Attributes a failure to the stage unless it already names one.
fn stage_error(stage: &str, error: GuideError) -> GuideError {
    match error {
        GuideError::Cancelled
        | GuideError::MissingStateKey(_)
        | GuideError::StageExecution { .. }
        | GuideError::SchemaValidation { .. } => error,
        GuideError::Model(message) => GuideError::stage(stage, message),
        other => GuideError::stage(stage, other.to_string()),
    }
}

fn validate(stage: &str, validator: &Validator, text: &str) -> Result<Value> {
    let value = parse_json_output(stage, text)?;
    let errors: Vec<String> = validator.iter_errors(&value).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(GuideError::schema(stage, errors.join("; ")))
    }
}

#[async_trait]
impl Agent for Stage {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        &[]
    }

    async fn run(&self, ctx: Arc<dyn InvocationContext>) -> Result<EventStream> {
        let name = self.name.clone();
        let invocation_id = ctx.invocation_id().to_string();
        let model = self.model.clone();
        let template = self.instruction.clone();
        let tools = self.tools.clone();
        let output_schema = self.output_schema.clone();
        let validator = self.validator.clone();
        let output_key = self.output_key.clone();
        let output_mode = self.output_mode;
        let include_contents = self.include_contents;
        let missing_keys = self.missing_keys;
        let before_callback = self.before_callback.clone();
        let output_transform = self.output_transform.clone();
        let streaming = self.streaming;
        let temperature = self.temperature;

        let s = stream! {
            if ctx.is_cancelled() {
                yield Err(GuideError::Cancelled);
                return;
            }
            guide_telemetry::info!(stage = %name, model = model.name(), "stage started");

            if let Some(callback) = &before_callback {
                if let Err(e) = callback(ctx.state()) {
                    yield Err(stage_error(&name, e));
                    return;
                }
            }

            let instruction = match inject_state(ctx.state(), &template, missing_keys) {
                Ok(text) => text,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut history = Vec::new();
            match include_contents {
                IncludeContents::Default if !ctx.user_content().parts.is_empty() => {
                    history.push(ctx.user_content().clone());
                }
                _ => history.push(Content::new("user").with_text(CONTINUE_PROMPT)),
            }

            let declarations: BTreeMap<String, Value> =
                tools.iter().map(|t| (t.name().to_string(), t.declaration())).collect();
            let token = ctx.cancellation_token().clone();
            let mut final_text: Option<String> = None;
            let mut escalated = false;
            let mut call_seq = 0u32;
            let mut round = 0u32;

            loop {
                round += 1;
                if round > MAX_TOOL_ROUNDS {
                    yield Err(GuideError::stage(
                        &name,
                        format!("no final answer after {} model rounds", MAX_TOOL_ROUNDS),
                    ));
                    return;
                }

                // Gemini rejects a JSON response schema combined with function calling
                let config = GenerateContentConfig {
                    temperature,
                    response_schema: if tools.is_empty() { output_schema.clone() } else { None },
                    ..Default::default()
                };
                let mut request = LlmRequest::new(model.name(), history.clone())
                    .with_system_instruction(instruction.clone())
                    .with_config(config);
                request.tools = declarations.clone();

                let call = model
                    .generate_content(request, streaming)
                    .instrument(guide_telemetry::model_call_span(model.name()));
                let started = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(GuideError::Cancelled),
                    result = call => result,
                };
                let mut responses = match started {
                    Ok(responses) => responses,
                    Err(e) => {
                        yield Err(stage_error(&name, e));
                        return;
                    }
                };

                let mut turn: Option<LlmResponse> = None;
                let mut partial_text = String::new();
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = token.cancelled() => Some(Err(GuideError::Cancelled)),
                        item = responses.next() => item,
                    };
                    match next {
                        None => break,
                        Some(Err(e)) => {
                            yield Err(stage_error(&name, e));
                            return;
                        }
                        Some(Ok(response)) if response.partial => {
                            if let Some(content) = &response.content {
                                partial_text.push_str(&content.text());
                            }
                            let mut event = Event::new(&invocation_id).with_author(&name);
                            event.llm_response = response;
                            yield Ok(event);
                        }
                        Some(Ok(response)) => {
                            turn = Some(response);
                            break;
                        }
                    }
                }

                let turn = match turn {
                    Some(turn) => turn,
                    None if !partial_text.is_empty() => LlmResponse::text(partial_text),
                    None => {
                        yield Err(GuideError::stage(&name, "model stream ended without a response"));
                        return;
                    }
                };

                if turn.content.is_none() {
                    if let Some(code) = &turn.error_code {
                        let detail = turn.error_message.clone().unwrap_or_default();
                        yield Err(GuideError::stage(&name, format!("model returned no content ({}): {}", code, detail)));
                        return;
                    }
                }

                let content = turn.content.clone().unwrap_or_else(|| Content::new("model"));
                let calls: Vec<(String, Value)> =
                    content.function_calls().map(|(n, a)| (n.to_string(), a.clone())).collect();

                if calls.is_empty() {
                    final_text = Some(content.text());
                    break;
                }

                history.push(content);
                let mut call_event = Event::new(&invocation_id).with_author(&name);
                call_event.llm_response = turn;
                yield Ok(call_event);

                for (call_name, args) in calls {
                    call_seq += 1;
                    let tool_ctx = Arc::new(StageToolContext {
                        function_call_id: format!("{}_{}_{}", invocation_id, name, call_seq),
                        stage_name: name.clone(),
                        actions: Mutex::new(EventActions::default()),
                    });

                    let result = match tools.iter().find(|t| t.name() == call_name) {
                        Some(tool) => {
                            let span = guide_telemetry::tool_execute_span(&call_name);
                            match tool.execute(tool_ctx.clone() as Arc<dyn ToolContext>, args).instrument(span).await {
                                Ok(value) => value,
                                Err(e) => {
                                    guide_telemetry::warn!(stage = %name, tool = %call_name, error = %e, "tool failed");
                                    json!({ "error": e.to_string() })
                                }
                            }
                        }
                        None => json!({ "error": format!("Tool {} not found", call_name) }),
                    };

                    let actions = tool_ctx.actions();
                    let response = Content {
                        role: "function".to_string(),
                        parts: vec![Part::FunctionResponse { name: call_name.clone(), response: result }],
                    };
                    let mut tool_event = Event::new(&invocation_id).with_author(&name);
                    tool_event.actions = actions.clone();
                    tool_event.set_content(response.clone());
                    yield Ok(tool_event);

                    history.push(response);
                    if actions.escalate {
                        escalated = true;
                    }
                }

                if escalated {
                    break;
                }
                if token.is_cancelled() {
                    yield Err(GuideError::Cancelled);
                    return;
                }
            }

            if escalated {
                guide_telemetry::info!(stage = %name, "stage escalated");
                return;
            }

            let mut text = final_text.unwrap_or_default();
            if let Some(transform) = &output_transform {
                text = transform(text);
            }

            let value = match &validator {
                Some(validator) => match validate(&name, validator, &text) {
                    Ok(value) => value,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                },
                None => Value::String(text.clone()),
            };

            let mut event = Event::new(&invocation_id).with_author(&name);
            event.set_content(Content::new("model").with_text(text.clone()));
            if let Some(key) = &output_key {
                match output_mode {
                    OutputMode::Overwrite => {
                        ctx.state().set(key.clone(), value.clone());
                        event.actions.state_delta.insert(key.clone(), value);
                    }
                    OutputMode::Append if text.trim().is_empty() => {
                        guide_telemetry::debug!(stage = %name, key = %key, "no new content to append");
                    }
                    OutputMode::Append => {
                        let count = ctx.state().append(key, value);
                        guide_telemetry::debug!(stage = %name, key = %key, count, "appended output");
                        let all = ctx.state().get(key).unwrap_or(Value::Null);
                        event.actions.state_delta.insert(key.clone(), all);
                    }
                }
            }
            guide_telemetry::info!(stage = %name, chars = text.len(), "stage completed");
            yield Ok(event);
        };

        Ok(Box::pin(s))
    }
}
