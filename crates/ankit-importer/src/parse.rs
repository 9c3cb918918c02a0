//! Parsers for the model's pipe-delimited output.
//!
//! One output line is one card. Columns map positionally onto the format's
//! [`Schema`](crate::format::Schema). Parsing is lenient: noise lines (blank,
//! markdown headings, code fences, table separators, a repeated column header)
//! are skipped silently, and a line that cannot be a card becomes a
//! [`ParseWarning`] in the row sequence instead of failing the response.
//!
//! Cells are trimmed but otherwise kept verbatim, so `<br>` stays in the text.
//! A line with more cells than the schema keeps the surplus in its last slot.
//!
//! # Example
//!
//! ```
//! use ankit_importer::format::Slot;
//! use ankit_importer::parse;
//!
//! let text = "Subtopic | Question | Multiple Choice | Correct Answers | Extra\n\
//!             Cells | Powerhouse? | Mitochondria<br>Nucleus | Mitochondria | ATP";
//! let rows: Vec<_> = parse::mcq(text).rows().filter_map(Result::ok).collect();
//!
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].get(Slot::Choices), Some("Mitochondria<br>Nucleus"));
//! ```

use std::fmt;
use std::iter::Enumerate;
use std::str::Lines;

use crate::cloze;
use crate::format::{Format, Slot};

/// Column delimiter of the response protocol.
pub const DELIMITER: char = '|';

/// Why a line produced no card, or produced a questionable one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// Fewer cells than subtopic plus one content column.
    TooFewColumns { found: usize },
    /// Every content cell is empty.
    MissingContent,
    /// A cloze row whose text has no `{{c<N>::...}}` marker. The row is kept.
    NoClozeDeletion,
}

/// A non-fatal problem found on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line number in the response.
    pub line: usize,
    pub kind: WarningKind,
    /// The offending line, trimmed.
    pub text: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::TooFewColumns { found } => write!(
                f,
                "line {}: only {} column(s), skipped: {}",
                self.line, found, self.text
            ),
            WarningKind::MissingContent => {
                write!(f, "line {}: no card content, skipped: {}", self.line, self.text)
            }
            WarningKind::NoClozeDeletion => write!(
                f,
                "line {}: cloze text has no {{{{c1::...}}}} deletion: {}",
                self.line, self.text
            ),
        }
    }
}

/// One parsed card line.
///
/// The slot set is exactly the format's schema; absent trailing cells are
/// empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    pub format: Format,
    values: Vec<String>,
    /// 1-based line number in the response.
    pub line: usize,
    /// Source image filename, set by the importer.
    pub source: Option<String>,
    /// Position of the source image in the batch, set by the importer.
    pub position: Option<usize>,
    /// Set when the row was accepted with a problem.
    pub warning: Option<ParseWarning>,
}

impl RowRecord {
    /// Value of a slot, or `None` if the format has no such slot.
    pub fn get(&self, slot: Slot) -> Option<&str> {
        let index = self.format.schema().index_of(slot)?;
        self.values.get(index).map(String::as_str)
    }

    /// The subtopic cell.
    pub fn subtopic(&self) -> &str {
        self.get(Slot::Subtopic).unwrap_or_default()
    }

    /// Slots and values in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &str)> {
        self.format
            .schema()
            .slots
            .iter()
            .copied()
            .zip(self.values.iter().map(String::as_str))
    }

    /// The first non-empty content value, used to summarise the row.
    pub fn primary_content(&self) -> &str {
        self.iter()
            .find(|(slot, value)| slot.is_content() && !value.is_empty())
            .map(|(_, value)| value)
            .unwrap_or_default()
    }

    /// Tag the row with the image it came from.
    pub fn with_source(mut self, filename: impl Into<String>, position: usize) -> Self {
        self.source = Some(filename.into());
        self.position = Some(position);
        self
    }
}

/// A model response bound to the format it should be read as.
///
/// Parsing is lazy; [`rows`](Self::rows) can be called any number of times.
#[derive(Debug, Clone, Copy)]
pub struct ParsedResponse<'a> {
    format: Format,
    text: &'a str,
}

/// Accepted rows and all warnings of a response.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub rows: Vec<RowRecord>,
    /// Rejected lines plus warnings attached to accepted rows, in line order.
    pub warnings: Vec<ParseWarning>,
}

impl<'a> ParsedResponse<'a> {
    pub fn format(&self) -> Format {
        self.format
    }

    /// Iterate over card lines. Noise lines are skipped; rejected lines are
    /// `Err` entries.
    pub fn rows(&self) -> Rows<'a> {
        Rows {
            format: self.format,
            lines: self.text.lines().enumerate(),
        }
    }

    /// Collect rows and warnings.
    pub fn partition(&self) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();
        for item in self.rows() {
            match item {
                Ok(row) => {
                    if let Some(w) = &row.warning {
                        outcome.warnings.push(w.clone());
                    }
                    outcome.rows.push(row);
                }
                Err(w) => outcome.warnings.push(w),
            }
        }
        outcome
    }
}

/// Iterator over the rows of a [`ParsedResponse`].
#[derive(Debug, Clone)]
pub struct Rows<'a> {
    format: Format,
    lines: Enumerate<Lines<'a>>,
}

impl Iterator for Rows<'_> {
    type Item = Result<RowRecord, ParseWarning>;

    fn next(&mut self) -> Option<Self::Item> {
        for (index, raw) in self.lines.by_ref() {
            let line = raw.trim();
            if is_noise(line) {
                continue;
            }
            let cells = split_cells(line);
            if is_header(self.format, &cells) {
                continue;
            }
            return Some(build_row(self.format, index + 1, line, cells));
        }
        None
    }
}

/// Read `text` as a response in `format`.
pub fn parse(format: Format, text: &str) -> ParsedResponse<'_> {
    ParsedResponse { format, text }
}

/// Read `text` as MCQ output.
pub fn mcq(text: &str) -> ParsedResponse<'_> {
    parse(Format::Mcq, text)
}

/// Read `text` as cloze output.
pub fn cloze(text: &str) -> ParsedResponse<'_> {
    parse(Format::Cloze, text)
}

/// Read `text` as basic front/back output.
pub fn basic(text: &str) -> ParsedResponse<'_> {
    parse(Format::Basic, text)
}

fn is_noise(line: &str) -> bool {
    if line.is_empty() || line.starts_with('#') || line.starts_with("```") {
        return true;
    }
    // Markdown table separator such as |---|:---:|
    line.contains('-')
        && line
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

fn split_cells(line: &str) -> Vec<&str> {
    let mut inner = line;
    if let Some(rest) = inner.strip_prefix(DELIMITER) {
        inner = rest.strip_suffix(DELIMITER).unwrap_or(rest);
    }
    inner.split(DELIMITER).map(str::trim).collect()
}

fn is_header(format: Format, cells: &[&str]) -> bool {
    let columns = format.schema().columns;
    let Some(first) = cells.first() else {
        return false;
    };
    let first = first.trim_matches('*').to_ascii_lowercase();
    if !first.starts_with("subtopic") {
        return false;
    }
    match cells.get(1) {
        Some(second) => second.trim_matches('*').eq_ignore_ascii_case(columns[1]),
        None => true,
    }
}

fn build_row(
    format: Format,
    line_number: usize,
    line: &str,
    cells: Vec<&str>,
) -> Result<RowRecord, ParseWarning> {
    let warning = |kind| ParseWarning {
        line: line_number,
        kind,
        text: line.to_string(),
    };

    if cells.len() < 2 {
        return Err(warning(WarningKind::TooFewColumns { found: cells.len() }));
    }

    let slots = format.schema().slots;
    let mut values: Vec<String> = Vec::with_capacity(slots.len());
    for i in 0..slots.len() {
        let value = if i + 1 == slots.len() && cells.len() > slots.len() {
            cells[i..].join(" | ")
        } else {
            cells.get(i).copied().unwrap_or_default().to_string()
        };
        values.push(value);
    }

    let has_content = slots
        .iter()
        .zip(&values)
        .any(|(slot, value)| slot.is_content() && !value.is_empty());
    if !has_content {
        return Err(warning(WarningKind::MissingContent));
    }

    let mut row = RowRecord {
        format,
        values,
        line: line_number,
        source: None,
        position: None,
        warning: None,
    };
    if format == Format::Cloze && !cloze::has_deletion(row.get(Slot::Text).unwrap_or_default()) {
        row.warning = Some(warning(WarningKind::NoClozeDeletion));
    }
    Ok(row)
}
