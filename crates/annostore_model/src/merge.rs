//! Key-based merge of partial record batches into a document.

use crate::record::Record;
use std::collections::HashMap;

/// Collapses records that share a key, keeping the last one.
///
/// The surviving record takes the position of the key's first occurrence.
/// Records without a key are kept as they are.
#[must_use]
pub fn coalesce_by_key(records: Vec<Record>) -> Vec<Record> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<Record> = Vec::with_capacity(records.len());

    for record in records {
        match record.key().map(str::to_owned) {
            Some(key) => match positions.get(&key) {
                Some(&index) => out[index] = record,
                None => {
                    positions.insert(key, out.len());
                    out.push(record);
                }
            },
            None => out.push(record),
        }
    }

    out
}

/// Upserts `incoming` into `existing` by record key.
///
/// - a record whose key already exists replaces it in place
/// - records with new keys are appended in their relative incoming order
/// - untouched records keep their relative order
/// - [`crate::POSITION_FIELD`] is rewritten as the 1-based index of every
///   record in the result
///
/// Duplicate keys inside `incoming` are coalesced first (last one wins).
/// Keyless incoming records cannot match anything and are appended.
///
/// # Example
///
/// ```rust
/// use annostore_model::{merge_by_key, Record};
///
/// let existing = vec![Record::with_key("a").with("v", 1), Record::with_key("b").with("v", 2)];
/// let incoming = vec![Record::with_key("b").with("v", 9), Record::with_key("c").with("v", 3)];
///
/// let merged = merge_by_key(existing, incoming);
/// let keys: Vec<_> = merged.iter().filter_map(|r| r.key()).collect();
/// assert_eq!(keys, ["a", "b", "c"]);
/// assert_eq!(merged[1].get("v"), Some(&serde_json::json!(9)));
/// assert_eq!(merged[2].position(), Some(3));
/// ```
#[must_use]
pub fn merge_by_key(existing: Vec<Record>, incoming: Vec<Record>) -> Vec<Record> {
    let mut slots: Vec<Option<Record>> = coalesce_by_key(incoming).into_iter().map(Some).collect();
    let mut lookup: HashMap<String, usize> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| {
            slot.as_ref()
                .and_then(Record::key)
                .map(|key| (key.to_owned(), i))
        })
        .collect();

    let mut merged = Vec::with_capacity(existing.len() + slots.len());
    for record in existing {
        let replacement = record
            .key()
            .and_then(|key| lookup.remove(key))
            .and_then(|i| slots[i].take());
        merged.push(replacement.unwrap_or(record));
    }
    merged.extend(slots.into_iter().flatten());

    renumber(&mut merged);
    merged
}

/// Rewrites the position field of every record as its 1-based index.
pub fn renumber(records: &mut [Record]) {
    for (index, record) in records.iter_mut().enumerate() {
        record.set_position(index + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rec(key: &str, v: i64) -> Record {
        Record::with_key(key).with("v", v)
    }

    fn as_json(records: &[Record]) -> Value {
        serde_json::to_value(records).unwrap()
    }

    #[test]
    fn worked_example() {
        let existing = vec![
            rec("a", 1).with("S.No", 1),
            rec("b", 2).with("S.No", 2),
        ];
        let incoming = vec![rec("b", 9), rec("c", 3)];

        let merged = merge_by_key(existing, incoming);
        assert_eq!(
            as_json(&merged),
            json!([
                {"key": "a", "v": 1, "S.No": 1},
                {"key": "b", "v": 9, "S.No": 2},
                {"key": "c", "v": 3, "S.No": 3},
            ])
        );
    }

    #[test]
    fn merge_into_empty() {
        let merged = merge_by_key(Vec::new(), vec![rec("x", 1), rec("y", 2)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].position(), Some(1));
        assert_eq!(merged[1].position(), Some(2));
    }

    #[test]
    fn updated_record_keeps_existing_position() {
        let existing = vec![rec("a", 1), rec("b", 2), rec("c", 3)];
        let incoming = vec![rec("new", 0), rec("a", 10)];

        let merged = merge_by_key(existing, incoming);
        let keys: Vec<_> = merged.iter().filter_map(Record::key).collect();
        assert_eq!(keys, ["a", "b", "c", "new"]);
        assert_eq!(merged[0].get("v"), Some(&json!(10)));
    }

    #[test]
    fn incoming_position_field_is_ignored() {
        let existing = vec![rec("a", 1), rec("b", 2)];
        // A stale S.No of 1 on "b" must not move it or make it match "a".
        let incoming = vec![rec("b", 5).with("S.No", 1)];

        let merged = merge_by_key(existing, incoming);
        assert_eq!(merged[0].key(), Some("a"));
        assert_eq!(merged[0].get("v"), Some(&json!(1)));
        assert_eq!(merged[1].position(), Some(2));
    }

    #[test]
    fn duplicate_incoming_keys_last_wins() {
        let incoming = vec![rec("a", 1), rec("b", 2), rec("a", 3)];
        let merged = merge_by_key(Vec::new(), incoming);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].key(), Some("a"));
        assert_eq!(merged[0].get("v"), Some(&json!(3)));
    }

    #[test]
    fn coalesce_keeps_keyless_records() {
        let out = coalesce_by_key(vec![Record::new(), rec("a", 1), Record::new(), rec("a", 2)]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].get("v"), Some(&json!(2)));
    }
}
