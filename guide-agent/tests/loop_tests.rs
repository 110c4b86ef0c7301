mod common;

use async_stream::stream;
use common::{TestContext, collect, overview_json, sections_in, study_guide_handler, system_instruction};
use guide_agent::{CustomAgent, ElaborationLoop, PipelineConfig, StageModels, StudyGuidePipeline};
use guide_core::{
    Agent, Content, Event, EventStream, GuideError, InvocationContext, LoopOutcome, LoopState, Part,
    keys,
};
use guide_model::MockLlm;
use guide_tool::{FirecrawlConfig, research_tools};
use proptest::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Appends one numbered section per call until `objectives` exist.
fn accurate_processor(objectives: usize, calls: Arc<AtomicUsize>) -> Arc<dyn Agent> {
    Arc::new(
        CustomAgent::builder("Processor")
            .handler(move |ctx: Arc<dyn InvocationContext>| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let done = ctx.state().sections(keys::SECTION_CONTENT).len();
                    if done < objectives {
                        ctx.state().append(keys::SECTION_CONTENT, json!(format!("## Section {}", done + 1)));
                    }
                    Ok(Box::pin(futures::stream::empty()) as EventStream)
                }
            })
            .build()
            .unwrap(),
    )
}

/// Emits the termination signal once `threshold` sections exist, otherwise `chatter`.
fn counting_controller(threshold: usize, chatter: &'static str, calls: Arc<AtomicUsize>) -> Arc<dyn Agent> {
    Arc::new(
        CustomAgent::builder("Controller")
            .handler(move |ctx: Arc<dyn InvocationContext>| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let done = ctx.state().sections(keys::SECTION_CONTENT).len();
                    let invocation_id = ctx.invocation_id().to_string();
                    let s = stream! {
                        let mut event = Event::new(&invocation_id).with_author("Controller");
                        if done >= threshold {
                            event.actions.escalate = true;
                            event.set_content(Content {
                                role: "function".to_string(),
                                parts: vec![Part::FunctionResponse {
                                    name: "exit_loop".to_string(),
                                    response: json!({"status": "done", "message": "all covered"}),
                                }],
                            });
                        } else {
                            event.set_content(Content::new("model").with_text(chatter));
                        }
                        yield Ok::<_, GuideError>(event);
                    };
                    Ok(Box::pin(s) as EventStream)
                }
            })
            .build()
            .unwrap(),
    )
}

fn outcome(events: &[Event]) -> LoopOutcome {
    events.last().and_then(|e| e.actions.loop_outcome.clone()).expect("terminal loop event")
}

#[tokio::test]
async fn test_completes_when_all_objectives_covered() {
    let processor_calls = Arc::new(AtomicUsize::new(0));
    let controller_calls = Arc::new(AtomicUsize::new(0));
    let elaboration = ElaborationLoop::new(
        "ElaborationLoop",
        accurate_processor(3, processor_calls.clone()),
        counting_controller(3, "", controller_calls.clone()),
        5,
    )
    .unwrap();

    let ctx = Arc::new(TestContext::new("material"));
    let (events, err) = collect(elaboration.run(ctx.clone()).await.unwrap()).await;
    assert!(err.is_none());

    let outcome = outcome(&events);
    assert_eq!(outcome.state, LoopState::Completed);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.sections, 3);
    assert_eq!(processor_calls.load(Ordering::SeqCst), 3);
    assert_eq!(controller_calls.load(Ordering::SeqCst), 3);
    assert_eq!(ctx.state().get(keys::LOOP_STATUS).unwrap()["status"], "done");
}

#[tokio::test]
async fn test_exhausts_at_cap_with_partial_sections() {
    let elaboration = ElaborationLoop::new(
        "ElaborationLoop",
        accurate_processor(5, Arc::new(AtomicUsize::new(0))),
        counting_controller(5, "", Arc::new(AtomicUsize::new(0))),
        2,
    )
    .unwrap();

    let ctx = Arc::new(TestContext::new("material"));
    let (events, err) = collect(elaboration.run(ctx.clone()).await.unwrap()).await;
    assert!(err.is_none(), "exhaustion is not an error");

    let outcome = outcome(&events);
    assert_eq!(outcome.state, LoopState::Exhausted);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.sections, 2);
    assert_eq!(ctx.state().sections(keys::SECTION_CONTENT), vec!["## Section 1", "## Section 2"]);
    assert_eq!(ctx.state().get(keys::LOOP_STATUS), Some(json!("")));
}

#[tokio::test]
async fn test_signal_stops_further_calls() {
    let processor_calls = Arc::new(AtomicUsize::new(0));
    let controller_calls = Arc::new(AtomicUsize::new(0));
    // the controller misjudges and signals after two of four objectives
    let elaboration = ElaborationLoop::new(
        "ElaborationLoop",
        accurate_processor(4, processor_calls.clone()),
        counting_controller(2, "", controller_calls.clone()),
        5,
    )
    .unwrap();

    let ctx = Arc::new(TestContext::new("material"));
    let (events, _) = collect(elaboration.run(ctx.clone()).await.unwrap()).await;
    assert_eq!(outcome(&events).state, LoopState::Completed);
    assert_eq!(processor_calls.load(Ordering::SeqCst), 2);
    assert_eq!(controller_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_strict_silence_drops_controller_chatter() {
    let elaboration = ElaborationLoop::new(
        "ElaborationLoop",
        accurate_processor(3, Arc::new(AtomicUsize::new(0))),
        counting_controller(3, "Processing should continue.", Arc::new(AtomicUsize::new(0))),
        1,
    )
    .unwrap();

    let ctx = Arc::new(TestContext::new("material"));
    let (events, err) = collect(elaboration.run(ctx.clone()).await.unwrap()).await;
    assert!(err.is_none(), "stray controller text is tolerated");
    assert_eq!(ctx.state().get(keys::LOOP_STATUS), Some(json!("")));
    assert_eq!(events.last().unwrap().actions.state_delta.get(keys::LOOP_STATUS), Some(&json!("")));
}

#[tokio::test]
async fn test_lenient_mode_keeps_acknowledgement() {
    let elaboration = ElaborationLoop::new(
        "ElaborationLoop",
        accurate_processor(3, Arc::new(AtomicUsize::new(0))),
        counting_controller(3, "Processing should continue.", Arc::new(AtomicUsize::new(0))),
        1,
    )
    .unwrap()
    .with_strict_silence(false);

    let ctx = Arc::new(TestContext::new("material"));
    let (_, err) = collect(elaboration.run(ctx.clone()).await.unwrap()).await;
    assert!(err.is_none());
    assert_eq!(ctx.state().get(keys::LOOP_STATUS), Some(json!("Processing should continue.")));
}

#[tokio::test]
async fn test_overwriting_processor_cannot_drop_sections() {
    let clobbering = Arc::new(
        CustomAgent::builder("Processor")
            .handler(|ctx: Arc<dyn InvocationContext>| async move {
                let n = ctx.state().sections(keys::SECTION_CONTENT).len();
                ctx.state().set(keys::SECTION_CONTENT, json!(format!("## Section {}", n + 1)));
                Ok(Box::pin(futures::stream::empty()) as EventStream)
            })
            .build()
            .unwrap(),
    );
    let elaboration = ElaborationLoop::new(
        "ElaborationLoop",
        clobbering,
        counting_controller(3, "", Arc::new(AtomicUsize::new(0))),
        5,
    )
    .unwrap();

    let ctx = Arc::new(TestContext::new("material"));
    let (events, _) = collect(elaboration.run(ctx.clone()).await.unwrap()).await;
    assert_eq!(outcome(&events).state, LoopState::Completed);
    assert_eq!(
        ctx.state().sections(keys::SECTION_CONTENT),
        vec!["## Section 1", "## Section 2", "## Section 3"]
    );
}

#[tokio::test]
async fn test_processor_error_aborts_loop() {
    let failing = Arc::new(
        CustomAgent::builder("Processor")
            .handler(|_ctx| async { Err(GuideError::stage("Processor", "model unavailable")) })
            .build()
            .unwrap(),
    );
    let controller_calls = Arc::new(AtomicUsize::new(0));
    let elaboration = ElaborationLoop::new(
        "ElaborationLoop",
        failing,
        counting_controller(1, "", controller_calls.clone()),
        3,
    )
    .unwrap();

    let ctx = Arc::new(TestContext::new("material"));
    let (events, err) = collect(elaboration.run(ctx).await.unwrap()).await;
    assert_eq!(err.unwrap().stage_name(), Some("Processor"));
    assert!(events.iter().all(|e| e.actions.loop_outcome.is_none()));
    assert_eq!(controller_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_model_backed_loop_terminates_via_exit_loop() {
    let model = Arc::new(MockLlm::new("mock").with_handler(study_guide_handler(3)));
    let config = PipelineConfig::default();
    let pipeline = StudyGuidePipeline::build(
        &config,
        StageModels::uniform(model.clone()),
        research_tools(FirecrawlConfig::disabled()),
    )
    .unwrap();
    // pull the loop out of the assembled pipeline
    let elaboration = pipeline.agent().sub_agents()[1].clone();

    let ctx = Arc::new(TestContext::new("material"));
    ctx.state().set(keys::OVERVIEW, serde_json::from_str::<Value>(&overview_json(3)).unwrap());
    let (events, err) = collect(elaboration.run(ctx.clone()).await.unwrap()).await;
    assert!(err.is_none(), "{:?}", err);

    let outcome = outcome(&events);
    assert_eq!(outcome.state, LoopState::Completed);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(ctx.state().sections(keys::SECTION_CONTENT).len(), 3);

    // every controller call saw the sections written so far
    let seen: Vec<usize> = model
        .requests()
        .iter()
        .map(system_instruction)
        .filter(|p| p.starts_with("You are the loop controller"))
        .map(sections_in)
        .collect();
    assert_eq!(seen, vec![1, 2, 3]);
}

fn run_loop(objectives: usize, max_iterations: u32) -> (LoopOutcome, Vec<usize>, usize) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    runtime.block_on(async move {
        let processor_calls = Arc::new(AtomicUsize::new(0));
        let elaboration = ElaborationLoop::new(
            "ElaborationLoop",
            accurate_processor(objectives, processor_calls.clone()),
            counting_controller(objectives, "", Arc::new(AtomicUsize::new(0))),
            max_iterations,
        )
        .unwrap();

        let ctx = Arc::new(TestContext::new("material"));
        let mut stream = elaboration.run(ctx.clone()).await.unwrap();
        let mut counts = vec![0];
        let mut last = None;
        use futures::StreamExt;
        while let Some(event) = stream.next().await {
            let event = event.unwrap();
            counts.push(ctx.state().sections(keys::SECTION_CONTENT).len());
            last = event.actions.loop_outcome.clone().or(last);
        }
        (last.unwrap(), counts, processor_calls.load(Ordering::SeqCst))
    })
}

proptest! {
    #[test]
    fn prop_loop_is_bounded_and_monotonic(objectives in 0usize..8, max_iterations in 1u32..8) {
        let (outcome, counts, processor_calls) = run_loop(objectives, max_iterations);

        prop_assert!(outcome.iterations <= max_iterations);
        prop_assert!(outcome.iterations >= 1);
        prop_assert_eq!(processor_calls as u32, outcome.iterations);
        prop_assert!(counts.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(outcome.sections <= objectives);

        let needed = objectives.max(1) as u32;
        if needed <= max_iterations {
            prop_assert_eq!(outcome.state, LoopState::Completed);
            prop_assert_eq!(outcome.sections, objectives);
            prop_assert_eq!(outcome.iterations, needed);
        } else {
            prop_assert_eq!(outcome.state, LoopState::Exhausted);
            prop_assert_eq!(outcome.iterations, max_iterations);
            prop_assert_eq!(outcome.sections, max_iterations as usize);
        }
    }
}
