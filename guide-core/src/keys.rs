//! Well-known pipeline state keys and the final-artifact marker.

pub const OVERVIEW: &str = "overview";
pub const SECTION_CONTENT: &str = "section_content";
pub const LOOP_STATUS: &str = "loop_status";
pub const TABLE_OF_CONTENTS: &str = "table_of_contents";
pub const ELABORATED_GUIDE: &str = "elaborated_guide";
pub const STUDY_GUIDE: &str = "study_guide";

/// Trailing line of the judged document. Callers treat its presence as the
/// sign that an event carries the final artifact.
pub const COMPLETION_MARKER: &str = "✅ Quality Verified - Ready for Study";
