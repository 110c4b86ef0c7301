use guide_core::{GuideError, MissingKeyPolicy, PipelineState, inject_state, keys};
use serde_json::json;

fn seeded_state() -> PipelineState {
    let state = PipelineState::new();
    state.set(
        keys::OVERVIEW,
        json!({
            "main_topic": "Photosynthesis",
            "key_sections": ["Light reactions", "Calvin cycle"],
            "learning_objectives": ["Explain light reactions", "Explain the Calvin cycle"],
            "difficulty_level": "beginner"
        }),
    );
    state.set("main_topic", json!("Photosynthesis"));
    state
}

#[test]
fn test_basic_substitution() {
    let state = seeded_state();
    let result =
        inject_state(&state, "Write a guide on {main_topic}.", MissingKeyPolicy::Error).unwrap();
    assert_eq!(result, "Write a guide on Photosynthesis.");
}

#[test]
fn test_structured_value_rendered_as_json() {
    let state = seeded_state();
    let result = inject_state(&state, "Overview:\n{overview}", MissingKeyPolicy::Error).unwrap();
    assert!(result.contains("\"learning_objectives\""));
    assert!(result.contains("Explain the Calvin cycle"));
}

#[test]
fn test_sections_joined_by_blank_line() {
    let state = PipelineState::new();
    state.append(keys::SECTION_CONTENT, json!("## One"));
    state.append(keys::SECTION_CONTENT, json!("## Two"));
    let result = inject_state(&state, "{section_content}", MissingKeyPolicy::Error).unwrap();
    assert_eq!(result, "## One\n\n## Two");
}

#[test]
fn test_missing_key_error_policy() {
    let state = PipelineState::new();
    let err = inject_state(&state, "Sections: {section_content}", MissingKeyPolicy::Error)
        .unwrap_err();
    match err {
        GuideError::MissingStateKey(key) => assert_eq!(key, "section_content"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_key_blank_policy() {
    let state = PipelineState::new();
    let result =
        inject_state(&state, "Sections: [{section_content}]", MissingKeyPolicy::Blank).unwrap();
    assert_eq!(result, "Sections: []");
}

#[test]
fn test_optional_placeholder_ignores_policy() {
    let state = PipelineState::new();
    let result =
        inject_state(&state, "Status: [{loop_status?}]", MissingKeyPolicy::Error).unwrap();
    assert_eq!(result, "Status: []");
}

#[test]
fn test_json_examples_left_literal() {
    let state = seeded_state();
    let template = r#"Return {"status": "done"} when finished with {main_topic}."#;
    let result = inject_state(&state, template, MissingKeyPolicy::Error).unwrap();
    assert_eq!(result, r#"Return {"status": "done"} when finished with Photosynthesis."#);
}

#[test]
fn test_multiple_placeholders() {
    let state = seeded_state();
    state.set(keys::TABLE_OF_CONTENTS, json!("1. Light reactions"));
    let result = inject_state(
        &state,
        "# {main_topic} Study Guide\n{table_of_contents}\n{main_topic}",
        MissingKeyPolicy::Error,
    )
    .unwrap();
    assert_eq!(result, "# Photosynthesis Study Guide\n1. Light reactions\nPhotosynthesis");
}

#[test]
fn test_template_without_placeholders_unchanged() {
    let state = PipelineState::new();
    let template = "No placeholders here.";
    assert_eq!(inject_state(&state, template, MissingKeyPolicy::Error).unwrap(), template);
}
