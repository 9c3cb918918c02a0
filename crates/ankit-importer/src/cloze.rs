//! Cloze deletion markers.
//!
//! Anki hides text written as `{{c1::answer}}` or `{{c1::answer::hint}}`.
//! A cloze note without any marker is valid but produces no card.

use std::sync::LazyLock;

use regex_lite::Regex;

static DELETION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{c\d+::").expect("cloze pattern is valid"));

/// Whether the text contains at least one `{{c<N>::...}}` deletion.
///
/// # Example
///
/// ```
/// use ankit_importer::cloze::has_deletion;
///
/// assert!(has_deletion("The {{c1::mitochondria}} makes ATP"));
/// assert!(!has_deletion("The mitochondria makes ATP"));
/// ```
pub fn has_deletion(text: &str) -> bool {
    DELETION.is_match(text)
}
