mod common;

use common::{TestContext, collect, study_guide_handler, system_instruction};
use guide_agent::study_guide::{ASSEMBLER_STAGE, ELABORATION_LOOP, JUDGE_STAGE, OVERVIEW_STAGE};
use guide_agent::{CustomAgent, Pipeline, PipelineConfig, StageModels, StudyGuidePipeline};
use guide_core::{
    Agent, COMPLETION_MARKER, EventStream, GuideError, InvocationContext, LoopState, Overview, Tool, keys,
};
use guide_model::MockLlm;
use guide_tool::{FirecrawlConfig, FunctionTool, research_tools};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

fn recording(name: &str, calls: Arc<AtomicUsize>) -> Arc<dyn Agent> {
    let key = name.to_string();
    Arc::new(
        CustomAgent::builder(name)
            .handler(move |ctx: Arc<dyn InvocationContext>| {
                let calls = calls.clone();
                let key = key.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ctx.state().set(key, json!("ran"));
                    Ok(Box::pin(futures::stream::empty()) as EventStream)
                }
            })
            .build()
            .unwrap(),
    )
}

fn failing(name: &str) -> Arc<dyn Agent> {
    let stage = name.to_string();
    Arc::new(
        CustomAgent::builder(name)
            .handler(move |_ctx| {
                let stage = stage.clone();
                async move { Err(GuideError::stage(stage, "quota exceeded")) }
            })
            .build()
            .unwrap(),
    )
}

#[test]
fn test_pipeline_rejects_duplicate_and_empty() {
    let calls = Arc::new(AtomicUsize::new(0));
    assert!(Pipeline::new("p", vec![]).is_err());
    assert!(Pipeline::new("p", vec![recording("a", calls.clone()), recording("a", calls)]).is_err());
}

#[tokio::test]
async fn test_runs_stages_in_order_over_shared_state() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new(
        "p",
        vec![recording("first", calls.clone()), recording("second", calls.clone())],
    )
    .unwrap();
    assert_eq!(pipeline.stage_names(), vec!["first", "second"]);

    let ctx = Arc::new(TestContext::new("material"));
    let (_, err) = collect(pipeline.run(ctx.clone()).await.unwrap()).await;
    assert!(err.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(ctx.state().contains("first") && ctx.state().contains("second"));
}

#[tokio::test]
async fn test_fails_fast_on_stage_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new(
        "p",
        vec![recording("first", calls.clone()), failing("broken"), recording("third", calls.clone())],
    )
    .unwrap();

    let ctx = Arc::new(TestContext::new("material"));
    let (_, err) = collect(pipeline.run(ctx.clone()).await.unwrap()).await;
    assert_eq!(err.unwrap().stage_name(), Some("broken"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!ctx.state().contains("third"));
}

#[tokio::test]
async fn test_cancellation_between_stages() {
    let token = CancellationToken::new();
    let cancel = token.clone();
    let canceller: Arc<dyn Agent> = Arc::new(
        CustomAgent::builder("canceller")
            .handler(move |_ctx| {
                cancel.cancel();
                async { Ok(Box::pin(futures::stream::empty()) as EventStream) }
            })
            .build()
            .unwrap(),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new("p", vec![canceller, recording("after", calls.clone())]).unwrap();

    let ctx = Arc::new(TestContext::new("material").with_token(token));
    let (_, err) = collect(pipeline.run(ctx).await.unwrap()).await;
    assert!(matches!(err, Some(GuideError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_study_guide_end_to_end() {
    let model = Arc::new(MockLlm::new("mock").with_handler(study_guide_handler(3)));
    let pipeline = StudyGuidePipeline::build(
        &PipelineConfig::default(),
        StageModels::uniform(model.clone()),
        research_tools(FirecrawlConfig::disabled()),
    )
    .unwrap();
    assert!(!pipeline.research_enabled());

    let agent = pipeline.agent();
    let names: Vec<&str> = agent.sub_agents().iter().map(|a| a.name()).collect();
    assert_eq!(names, vec![OVERVIEW_STAGE, ELABORATION_LOOP, ASSEMBLER_STAGE, JUDGE_STAGE]);

    let ctx = Arc::new(TestContext::new("Photosynthesis converts light into chemical energy."));
    let (events, err) = collect(agent.run(ctx.clone()).await.unwrap()).await;
    assert!(err.is_none(), "{:?}", err);

    let overview = Overview::from_value(&ctx.state().get(keys::OVERVIEW).unwrap()).unwrap();
    assert_eq!(overview.objective_count(), 3);

    let outcome = events.iter().find_map(|e| e.actions.loop_outcome.clone()).unwrap();
    assert_eq!(outcome.state, LoopState::Completed);
    assert_eq!(outcome.sections, 3);

    assert_eq!(
        ctx.state().get(keys::TABLE_OF_CONTENTS),
        Some(json!("1. Section 1\n2. Section 2\n3. Section 3"))
    );

    let last = events.last().unwrap();
    assert_eq!(last.author, JUDGE_STAGE);
    assert!(last.text().ends_with(COMPLETION_MARKER));
    let guide = ctx.state().get(keys::STUDY_GUIDE).unwrap();
    assert!(guide.as_str().unwrap().contains("Study tips"));

    // no research tools were advertised to the overview stage
    let requests = model.requests();
    let first = &requests[0];
    assert!(first.tools.is_empty());
    assert!(!system_instruction(first).contains("firecrawl"));
}

#[tokio::test]
async fn test_exhausted_loop_still_produces_document() {
    let model = Arc::new(MockLlm::new("mock").with_handler(study_guide_handler(5)));
    let config = PipelineConfig::default().with_max_iterations(2);
    let pipeline =
        StudyGuidePipeline::build(&config, StageModels::uniform(model.clone()), research_tools(FirecrawlConfig::disabled()))
            .unwrap();

    let ctx = Arc::new(TestContext::new("A long chapter on photosynthesis."));
    let (events, err) = collect(pipeline.agent().run(ctx.clone()).await.unwrap()).await;
    assert!(err.is_none(), "{:?}", err);

    let outcome = events.iter().find_map(|e| e.actions.loop_outcome.clone()).unwrap();
    assert_eq!(outcome.state, LoopState::Exhausted);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(ctx.state().sections(keys::SECTION_CONTENT).len(), 2);

    // the table of contents lists only the sections that exist
    let assembler_prompt = model
        .requests()
        .iter()
        .map(|r| system_instruction(r).to_string())
        .find(|p| p.starts_with("You are assembling"))
        .unwrap();
    assert!(assembler_prompt.contains("1. Section 1\n2. Section 2"));
    assert!(!assembler_prompt.contains("3. Section 3"));

    assert!(ctx.state().contains(keys::ELABORATED_GUIDE));
    assert!(ctx.state().get(keys::STUDY_GUIDE).unwrap().as_str().unwrap().contains(COMPLETION_MARKER));
}

#[tokio::test]
async fn test_missing_research_credential_still_yields_overview() {
    let model = Arc::new(MockLlm::new("mock").with_handler(study_guide_handler(2)));
    let research = research_tools(FirecrawlConfig::disabled());
    assert!(matches!(research, Err(GuideError::ToolUnavailable { .. })));

    let pipeline =
        StudyGuidePipeline::build(&PipelineConfig::default(), StageModels::uniform(model), research).unwrap();
    let overview_stage = pipeline.agent().sub_agents()[0].clone();

    let ctx = Arc::new(TestContext::new("Photosynthesis"));
    let (_, err) = collect(overview_stage.run(ctx.clone()).await.unwrap()).await;
    assert!(err.is_none());
    let overview = Overview::from_value(&ctx.state().get(keys::OVERVIEW).unwrap()).unwrap();
    assert!(!overview.main_topic.is_empty());
    assert_eq!(overview.objective_count(), 2);
}

#[tokio::test]
async fn test_research_tools_offered_to_overview_when_available() {
    let search = FunctionTool::new("firecrawl_search", "Search the web", |_ctx, _args| async {
        Ok(json!({"content": "1. Photosynthesis\n   URL: https://example.org\n   Content: ...\n"}))
    });
    let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(search)];
    let model = Arc::new(
        MockLlm::new("mock")
            .with_function_call("firecrawl_search", json!({"query": "photosynthesis"}))
            .with_handler(study_guide_handler(2)),
    );
    let pipeline = StudyGuidePipeline::build(
        &PipelineConfig::default(),
        StageModels::uniform(model.clone()),
        Ok(tools),
    )
    .unwrap();
    assert!(pipeline.research_enabled());

    let overview_stage = pipeline.agent().sub_agents()[0].clone();
    let ctx = Arc::new(TestContext::new("Photosynthesis"));
    let (_, err) = collect(overview_stage.run(ctx.clone()).await.unwrap()).await;
    assert!(err.is_none(), "{:?}", err);

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].tools.contains_key("firecrawl_search"));
    assert!(system_instruction(&requests[0]).contains("firecrawl_search"));
    assert!(ctx.state().contains(keys::OVERVIEW));
}

#[tokio::test]
async fn test_fatal_research_error_fails_build() {
    let model = Arc::new(MockLlm::new("mock"));
    let result = StudyGuidePipeline::build(
        &PipelineConfig::default(),
        StageModels::uniform(model),
        Err(GuideError::Config("bad proxy".into())),
    );
    assert!(matches!(result, Err(GuideError::Config(_))));
}
