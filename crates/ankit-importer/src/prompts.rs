//! Factory profiles: names, prompts and default field maps.

use crate::format::{Format, Slot};

/// Factory profile names, one per format.
pub const DEFAULT_MCQ: &str = "Default MCQ";
pub const DEFAULT_CLOZE: &str = "Default Cloze";
pub const DEFAULT_BASIC: &str = "Default Basic";

const MCQ_PROMPT: &str = r#"*** SYSTEM INSTRUCTION: SUBDECK ROUTING ***
You are an Anki CSV generator. Output 5 columns separated by pipes (|).
Format: Subtopic Name|Question|Multiple Choice|Correct Answers|Extra

1. Subtopic: Analyze header. If continuation, use previous topic.
2. Follow USER PROMPT below exactly.

*** USER PROMPT ***
**Objective:** Create high-yield MCQs.
**Priorities:** Classification, Drug Names, MoA, Uses, Side Effects.
**Distractors:** Must be contextually relevant and of similar length/structure.
**Format:**
- HTML <br> for line breaks in choices.
- No Markdown headers.
- Mnemonics in Extra column only.

**Output Rules:**
- One question per line
- Exactly 5 pipe-separated columns
- No extra formatting or commentary
- Include 3-5 questions per image minimum
"#;

const CLOZE_PROMPT: &str = r#"*** SYSTEM INSTRUCTION: SUBDECK ROUTING ***
You are an Anki CSV generator. Output 3 columns separated by pipes (|).
Format: Subtopic Name|Text|Extra

1. Subtopic: Analyze header. If continuation, use previous topic.
2. Follow USER PROMPT below exactly.

*** USER PROMPT ***
**Objective:** Create high-yield cloze deletions.
**Cloze syntax:** Wrap each hidden fact as {{c1::answer}}; use c2, c3 for independent facts in one sentence.
**Priorities:** Definitions, Numbers, Drug Names, Mechanisms.
**Format:**
- HTML <br> for line breaks.
- No Markdown headers.
- Mnemonics and explanations in Extra column only.

**Output Rules:**
- One card per line
- Exactly 3 pipe-separated columns
- Every Text cell contains at least one {{c1::...}} deletion
- No extra formatting or commentary
"#;

const BASIC_PROMPT: &str = r#"*** SYSTEM INSTRUCTION: SUBDECK ROUTING ***
You are an Anki CSV generator. Output 4 columns separated by pipes (|).
Format: Subtopic Name|Front|Back|Extra

1. Subtopic: Analyze header. If continuation, use previous topic.
2. Follow USER PROMPT below exactly.

*** USER PROMPT ***
**Objective:** Create concise question/answer flashcards.
**Priorities:** Key concepts, Definitions, Cause and effect.
**Format:**
- Front is a single focused question.
- Back is the shortest complete answer.
- HTML <br> for line breaks.
- No Markdown headers.

**Output Rules:**
- One card per line
- Exactly 4 pipe-separated columns
- No extra formatting or commentary
"#;

/// Name of the factory profile for a format.
pub fn builtin_name(format: Format) -> &'static str {
    match format {
        Format::Mcq => DEFAULT_MCQ,
        Format::Cloze => DEFAULT_CLOZE,
        Format::Basic => DEFAULT_BASIC,
    }
}

/// The format a factory profile name belongs to, if it is one.
pub fn builtin_format(name: &str) -> Option<Format> {
    Format::ALL.into_iter().find(|f| builtin_name(*f) == name)
}

/// Factory prompt text for a format.
pub fn factory_prompt(format: Format) -> &'static str {
    match format {
        Format::Mcq => MCQ_PROMPT,
        Format::Cloze => CLOZE_PROMPT,
        Format::Basic => BASIC_PROMPT,
    }
}

/// One default field-map entry and the config version that introduced it.
#[derive(Debug, Clone, Copy)]
pub struct DefaultMapping {
    pub slot: Slot,
    pub field: &'static str,
    pub since: u32,
}

const fn mapping(slot: Slot, field: &'static str, since: u32) -> DefaultMapping {
    DefaultMapping { slot, field, since }
}

const MCQ_MAP: &[DefaultMapping] = &[
    mapping(Slot::Question, "Question", 2),
    mapping(Slot::Choices, "Multiple Choice", 2),
    mapping(Slot::CorrectAnswers, "Correct Answers", 2),
    mapping(Slot::Extra, "Extra", 3),
];

const CLOZE_MAP: &[DefaultMapping] = &[
    mapping(Slot::Text, "Text", 2),
    mapping(Slot::Extra, "Back Extra", 3),
];

const BASIC_MAP: &[DefaultMapping] = &[
    mapping(Slot::Front, "Front", 2),
    mapping(Slot::Back, "Back", 2),
];

/// Default field map of a format's factory profile.
pub fn default_mappings(format: Format) -> &'static [DefaultMapping] {
    match format {
        Format::Mcq => MCQ_MAP,
        Format::Cloze => CLOZE_MAP,
        Format::Basic => BASIC_MAP,
    }
}

/// Stock Anki note type a format falls back to when none is configured.
pub fn default_note_type(format: Format) -> Option<&'static str> {
    match format {
        Format::Mcq => None,
        Format::Cloze => Some("Cloze"),
        Format::Basic => Some("Basic"),
    }
}
