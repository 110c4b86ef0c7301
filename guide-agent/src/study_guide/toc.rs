use guide_core::{COMPLETION_MARKER, PipelineState, Result, keys};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const MAX_ENTRY_CHARS: usize = 80;

static HEADING_REGEX: OnceLock<Regex> = OnceLock::new();

fn heading_regex() -> &'static Regex {
    HEADING_REGEX.get_or_init(|| Regex::new(r"^\s{0,3}#{1,6}\s+(.+?)\s*#*\s*$").expect("Invalid regex pattern"))
}

/// Title of a section: its first markdown heading, else its first non-blank line.
pub fn section_title(section: &str) -> Option<String> {
    let heading = section.lines().find_map(|line| heading_regex().captures(line).map(|c| c[1].to_string()));
    let title = heading.or_else(|| {
        section.lines().map(str::trim).find(|l| !l.is_empty()).map(|l| l.trim_start_matches('#').trim().to_string())
    })?;
    let title = title.replace("**", "");
    if title.chars().count() > MAX_ENTRY_CHARS {
        let cut: String = title.chars().take(MAX_ENTRY_CHARS).collect();
        Some(format!("{}...", cut.trim_end()))
    } else {
        Some(title)
    }
}

/// Numbered table of contents with one entry per section present.
pub fn table_of_contents(sections: &[String]) -> String {
    let entries: Vec<String> = sections
        .iter()
        .filter_map(|s| section_title(s))
        .enumerate()
        .map(|(i, title)| format!("{}. {}", i + 1, title))
        .collect();
    if entries.is_empty() {
        "(no sections were completed)".to_string()
    } else {
        entries.join("\n")
    }
}

/// Writes `table_of_contents` from the sections accumulated so far.
pub fn store_table_of_contents(state: &PipelineState) -> Result<()> {
    let sections = state.sections(keys::SECTION_CONTENT);
    guide_telemetry::debug!(sections = sections.len(), "building table of contents");
    state.set(keys::TABLE_OF_CONTENTS, Value::String(table_of_contents(&sections)));
    Ok(())
}

/// Appends the completion marker unless the text already carries it.
///
/// A blank answer stays blank: the marker only ever seals a document.
pub fn ensure_completion_marker(text: String) -> String {
    if text.contains(COMPLETION_MARKER) {
        return text;
    }
    let body = text.trim_end();
    if body.is_empty() {
        guide_telemetry::warn!("judge returned an empty document; leaving it unsealed");
        return String::new();
    }
    format!("{}\n\n{}", body, COMPLETION_MARKER)
}
