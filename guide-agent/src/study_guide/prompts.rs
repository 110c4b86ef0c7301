//! Instruction templates for the study guide stages.
//!
//! Placeholders are resolved against pipeline state right before each model
//! call. `{key?}` marks keys that may legitimately be absent (nothing has been
//! written to `section_content` before the first elaboration pass).

/// Reply the processor gives when every objective already has a section.
/// Mapped to empty output so nothing is appended.
pub const PROCESSOR_IDLE_REPLY: &str = "NO_OBJECTIVES_REMAINING";

pub const OVERVIEW_INSTRUCTION: &str = "You are an educational overview specialist.

Analyze the study material in the user's message and produce a high-level overview with:
1. main_topic: the central theme or subject
2. key_sections: the 3-5 main sections a study guide should cover
3. learning_objectives: 3-5 specific things a student should understand after studying the material
4. difficulty_level: one of beginner, intermediate or advanced

Respond with a single JSON object with exactly those four fields.";

pub const OVERVIEW_RESEARCH_ADDENDUM: &str = "

If the material is only a topic name or is too thin to outline, use firecrawl_search to find \
authoritative sources and firecrawl_scrape to read the most relevant one before writing the overview. \
If a research tool reports an error, continue with the material you were given.";

pub const PROCESSOR_INSTRUCTION: &str = "You are a detailed educational content creator working through learning objectives one at a time.

Overview of the material:
{overview}

Sections already written:
{section_content?}

Compare the learning objectives in the overview with the sections already written and pick the first \
objective that has no section yet. Write one comprehensive study guide section for that objective only, \
using the study material in the user's message. The section must include:
- a clear explanation of the objective
- the key concepts needed to achieve it
- important definitions and terminology
- real-world examples and applications
- practice questions or exercises where they make sense

Start the section with a level-two markdown heading naming the objective. Output only the new section; \
do not repeat sections that already exist.

If every learning objective already has a section, reply with exactly NO_OBJECTIVES_REMAINING and nothing else.";

pub const CONTROLLER_INSTRUCTION_STRICT: &str = "You are the loop controller. Your only job is to decide whether every learning objective has been covered.

Overview:
{overview}

Completed sections:
{section_content?}

Count the learning objectives in the overview and the completed sections above.
- If the counts are equal, call the exit_loop tool immediately. Do not write any text.
- If objectives remain, reply with an empty message. Do not write summaries, reviews or any other content.";

pub const CONTROLLER_INSTRUCTION_LENIENT: &str = "You are the loop controller. Your only job is to decide whether every learning objective has been covered.

Overview:
{overview}

Completed sections:
{section_content?}

Count the learning objectives in the overview and the completed sections above.
- If the counts are equal, call the exit_loop tool immediately. Do not write any text.
- If objectives remain, reply with one short sentence acknowledging that processing should continue.";

pub const ASSEMBLER_INSTRUCTION: &str = "You are assembling the final study guide from the sections written so far.

Overview:
{overview}

Completed sections:
{section_content?}

Loop status:
{loop_status?}

Table of contents (one entry per completed section, in order):
{table_of_contents}

Your tasks:
1. Combine the completed sections into one cohesive study guide
2. Use the table of contents above exactly as given; do not add entries for objectives without a section
3. Keep proper markdown formatting and smooth transitions between sections

Output the guide in this shape:

# <Topic> Study Guide

## Table of Contents
<the table of contents above>

<the sections, in order>";

pub const JUDGE_INSTRUCTION: &str = "You are the final educational quality judge.

Review this study guide:
{elaborated_guide}

Your tasks:
1. Add a brief introduction welcoming the student
2. Check that the sections are complete and well organized
3. Add study tips or a recommended approach at the end
4. Make sure formatting and readability are polished

Present the final study guide, ready for students to use, and end it with the line:
✅ Quality Verified - Ready for Study";

/// Overview instruction with or without the web research guidance.
pub fn overview_instruction(research: bool) -> String {
    if research {
        format!("{OVERVIEW_INSTRUCTION}{OVERVIEW_RESEARCH_ADDENDUM}")
    } else {
        OVERVIEW_INSTRUCTION.to_string()
    }
}

pub fn controller_instruction(strict_silence: bool) -> &'static str {
    if strict_silence { CONTROLLER_INSTRUCTION_STRICT } else { CONTROLLER_INSTRUCTION_LENIENT }
}
