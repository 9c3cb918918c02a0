//! Routing of parsed slots into note fields.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::parse::RowRecord;
use crate::profile::FieldMap;

/// Separator used when two slots are mapped to the same note field.
pub const JOIN_SEPARATOR: &str = "<br>";

/// Map a row's slots to note fields.
///
/// Slots without a mapping are dropped. When several slots target the same
/// field their non-empty values are joined with `<br>` in schema order. Fails
/// with [`Error::NoUsableFields`] unless some mapped content slot has a value,
/// so an empty map and a row whose mapped cells are all blank both fail.
///
/// # Example
///
/// ```
/// use ankit_importer::format::Slot;
/// use ankit_importer::{FieldMap, mapper, parse};
///
/// # fn example() -> ankit_importer::Result<()> {
/// let row = parse::basic("Heart | Chambers? | Four | mnemonic")
///     .rows()
///     .next()
///     .unwrap()
///     .unwrap();
/// let map: FieldMap = [(Slot::Front, "Front".to_string()), (Slot::Back, "Back".to_string())]
///     .into_iter()
///     .collect();
///
/// let fields = mapper::map_row(&row, &map)?;
/// assert_eq!(fields["Front"], "Chambers?");
/// assert!(!fields.contains_key("mnemonic"));
/// # Ok(())
/// # }
/// ```
pub fn map_row(row: &RowRecord, field_map: &FieldMap) -> Result<HashMap<String, String>> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut has_content = false;

    for (slot, value) in row.iter() {
        let Some(target) = field_map.get(slot) else {
            continue;
        };
        has_content |= slot.is_content() && !value.is_empty();
        match fields.get_mut(target) {
            Some(existing) => {
                if !value.is_empty() {
                    if !existing.is_empty() {
                        existing.push_str(JOIN_SEPARATOR);
                    }
                    existing.push_str(value);
                }
            }
            None => {
                fields.insert(target.to_string(), value.to_string());
            }
        }
    }

    if !has_content {
        return Err(Error::NoUsableFields { format: row.format });
    }
    Ok(fields)
}
