//! Soup entries: JSON objects with engine-managed system fields.

use serde_json::{Map, Value};

/// Field holding the entry's id within its soup.
pub const SOUP_ENTRY_ID: &str = "_soupEntryId";

/// Field holding the entry's last modification time (Unix ms).
pub const SOUP_LAST_MODIFIED_DATE: &str = "_soupLastModifiedDate";

/// Identifier of an entry within a soup.
pub type SoupEntryId = i64;

/// The entry id of a stored entry, if present.
pub fn entry_id(entry: &Value) -> Option<SoupEntryId> {
    entry.get(SOUP_ENTRY_ID).and_then(Value::as_i64)
}

/// The value at a dotted field path, e.g. `"address.city"`.
///
/// Only objects are descended into.
pub fn project<'a>(entry: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(entry, |value, key| value.as_object()?.get(key))
}

/// Stamp the system fields onto an entry object.
pub fn stamp(entry: &mut Map<String, Value>, id: SoupEntryId, modified_at: i64) {
    entry.insert(SOUP_ENTRY_ID.to_string(), Value::from(id));
    entry.insert(SOUP_LAST_MODIFIED_DATE.to_string(), Value::from(modified_at));
}
