//! The three card formats and their fixed column schemas.
//!
//! | Format | Output columns | Slots |
//! |---|---|---|
//! | MCQ | Subtopic, Question, Multiple Choice, Correct Answers, Extra | subtopic, question, choices, correct_answers, extra |
//! | Cloze | Subtopic, Text, Extra | subtopic, text, extra |
//! | Basic | Subtopic, Front, Back, Extra | subtopic, front, back, extra |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A card format. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Multiple-choice question.
    Mcq,
    /// Cloze deletion.
    Cloze,
    /// Front/back.
    Basic,
}

impl Format {
    /// All formats, in display order.
    pub const ALL: [Format; 3] = [Format::Mcq, Format::Cloze, Format::Basic];

    /// Lowercase identifier used in config files and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Mcq => "mcq",
            Format::Cloze => "cloze",
            Format::Basic => "basic",
        }
    }

    /// The column schema of this format.
    pub fn schema(self) -> &'static Schema {
        match self {
            Format::Mcq => &MCQ_SCHEMA,
            Format::Cloze => &CLOZE_SCHEMA,
            Format::Basic => &BASIC_SCHEMA,
        }
    }

    /// Look up one of this format's slots by name.
    pub fn slot(self, name: &str) -> Result<Slot, Error> {
        let name = name.trim();
        self.schema()
            .slots
            .iter()
            .copied()
            .find(|s| s.as_str() == name)
            .ok_or_else(|| Error::UnknownSlot {
                format: self,
                slot: name.to_string(),
            })
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mcq" => Ok(Format::Mcq),
            "cloze" => Ok(Format::Cloze),
            "basic" => Ok(Format::Basic),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// A logical field of a parsed row, independent of any note type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Subtopic,
    Question,
    Choices,
    CorrectAnswers,
    Extra,
    Text,
    Front,
    Back,
}

impl Slot {
    /// Slot name as used in field maps.
    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Subtopic => "subtopic",
            Slot::Question => "question",
            Slot::Choices => "choices",
            Slot::CorrectAnswers => "correct_answers",
            Slot::Extra => "extra",
            Slot::Text => "text",
            Slot::Front => "front",
            Slot::Back => "back",
        }
    }

    /// Whether the slot carries card content. Subtopic only routes the card
    /// to a subdeck and extra is supplementary.
    pub fn is_content(self) -> bool {
        !matches!(self, Slot::Subtopic | Slot::Extra)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column layout of one format. `columns[i]` is read into `slots[i]`.
#[derive(Debug)]
pub struct Schema {
    /// Column headings as the model is told to emit them.
    pub columns: &'static [&'static str],
    /// Logical slots, positionally aligned with `columns`.
    pub slots: &'static [Slot],
}

impl Schema {
    /// Position of a slot in the row, if this schema has it.
    pub fn index_of(&self, slot: Slot) -> Option<usize> {
        self.slots.iter().position(|s| *s == slot)
    }
}

static MCQ_SCHEMA: Schema = Schema {
    columns: &["Subtopic", "Question", "Multiple Choice", "Correct Answers", "Extra"],
    slots: &[
        Slot::Subtopic,
        Slot::Question,
        Slot::Choices,
        Slot::CorrectAnswers,
        Slot::Extra,
    ],
};

static CLOZE_SCHEMA: Schema = Schema {
    columns: &["Subtopic", "Text", "Extra"],
    slots: &[Slot::Subtopic, Slot::Text, Slot::Extra],
};

static BASIC_SCHEMA: Schema = Schema {
    columns: &["Subtopic", "Front", "Back", "Extra"],
    slots: &[Slot::Subtopic, Slot::Front, Slot::Back, Slot::Extra],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schemas_align() {
        for format in Format::ALL {
            let schema = format.schema();
            assert_eq!(schema.columns.len(), schema.slots.len());
            assert_eq!(schema.slots[0], Slot::Subtopic);
            assert!(schema.slots.iter().any(|s| s.is_content()));
        }
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("MCQ".parse::<Format>().unwrap(), Format::Mcq);
        assert_eq!(" cloze ".parse::<Format>().unwrap(), Format::Cloze);
        assert!(matches!("essay".parse::<Format>(), Err(Error::UnknownFormat(_))));
    }

    #[test]
    fn test_slot_lookup() {
        assert_eq!(Format::Mcq.slot("correct_answers").unwrap(), Slot::CorrectAnswers);
        assert!(matches!(
            Format::Cloze.slot("question"),
            Err(Error::UnknownSlot { format: Format::Cloze, .. })
        ));
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Format::Basic).unwrap(), "\"basic\"");
        let f: Format = serde_json::from_str("\"cloze\"").unwrap();
        assert_eq!(f, Format::Cloze);
    }
}
