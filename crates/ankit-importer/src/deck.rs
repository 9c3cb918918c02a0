//! Deck name sanitising.
//!
//! Cards land in `<root>::<subtopic>`. The root may itself be a path such as
//! `Medical::Pharmacology`; a subtopic is always a single level.

const INVALID: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Root deck used when the requested name sanitises to nothing.
pub const DEFAULT_ROOT: &str = "Imported";

/// Subdeck used for rows without a subtopic.
pub const DEFAULT_SUBTOPIC: &str = "General";

fn clean(component: &str) -> String {
    component
        .chars()
        .filter(|c| !INVALID.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sanitise a root deck path, keeping its `::` levels.
///
/// ```
/// use ankit_importer::deck::sanitize_root;
///
/// assert_eq!(sanitize_root(" Medical :: Pharm*acology "), "Medical::Pharmacology");
/// assert_eq!(sanitize_root("::"), "Imported");
/// ```
pub fn sanitize_root(name: &str) -> String {
    let parts: Vec<String> = name
        .split("::")
        .map(clean)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        DEFAULT_ROOT.to_string()
    } else {
        parts.join("::")
    }
}

/// Sanitise a subtopic into one deck level.
pub fn sanitize_subtopic(subtopic: &str) -> String {
    let cleaned = clean(subtopic);
    if cleaned.is_empty() {
        DEFAULT_SUBTOPIC.to_string()
    } else {
        cleaned
    }
}

/// Full subdeck path for a subtopic under a sanitised root.
pub fn subdeck(root: &str, subtopic: &str) -> String {
    format!("{}::{}", root, sanitize_subtopic(subtopic))
}
