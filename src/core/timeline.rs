// iocsweep - core/timeline.rs
//
// Canonicalisation, de-duplication, and ordering of timeline entries.
//
// Results gathered from different raw sources often describe the same event,
// so every module timeline is collapsed to a set before it is reported.
// Entries are compared through a canonical JSON encoding with sorted keys,
// which makes equality independent of the field order an entry was read with.

use crate::core::model::TimelineEntry;
use std::collections::BTreeMap;

/// Canonical, field-order-independent encoding of one entry.
///
/// serde_json's default map is ordered by key, so going through `Value`
/// yields sorted keys regardless of struct or input order.
pub fn canonical_key(entry: &TimelineEntry) -> String {
    match serde_json::to_value(entry) {
        Ok(value) => value.to_string(),
        Err(_) => format!("{entry:?}"),
    }
}

/// Collapse structurally identical entries to one.
///
/// Output is ordered by canonical key; callers must not rely on the input
/// order surviving.
pub fn deduplicate(entries: Vec<TimelineEntry>) -> Vec<TimelineEntry> {
    let before = entries.len();
    let unique: BTreeMap<String, TimelineEntry> = entries
        .into_iter()
        .map(|e| (canonical_key(&e), e))
        .collect();

    if unique.len() < before {
        tracing::debug!(
            before,
            after = unique.len(),
            "Removed duplicate timeline entries"
        );
    }
    unique.into_values().collect()
}

/// Stable sort by timestamp, with a missing timestamp ordered first.
pub fn sort_by_timestamp(entries: &mut [TimelineEntry]) {
    entries.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ts: Option<&str>, desc: &str) -> TimelineEntry {
        TimelineEntry::new(ts.map(String::from), "file_listing", "file_modified", desc)
    }

    #[test]
    fn test_identical_entries_collapse() {
        let out = deduplicate(vec![
            entry(Some("2023-01-01"), "a"),
            entry(Some("2023-01-01"), "a"),
            entry(Some("2023-01-01"), "b"),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_timestamp_participates_in_equality() {
        let out = deduplicate(vec![
            entry(Some("2023-01-01"), "a"),
            entry(Some("2023-01-02"), "a"),
            entry(None, "a"),
        ]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let a: TimelineEntry = serde_json::from_str(
            r#"{"timestamp": "2023-01-01", "module": "m", "event": "e", "data": "d"}"#,
        )
        .unwrap();
        let b: TimelineEntry = serde_json::from_str(
            r#"{"data": "d", "event": "e", "module": "m", "timestamp": "2023-01-01"}"#,
        )
        .unwrap();
        assert_eq!(canonical_key(&a), canonical_key(&b));
        assert_eq!(deduplicate(vec![a, b]).len(), 1);
    }

    #[test]
    fn test_deduplicate_is_idempotent_and_never_grows() {
        let input = vec![
            entry(Some("2023-01-03"), "x"),
            entry(None, "y"),
            entry(Some("2023-01-03"), "x"),
            entry(Some("2023-01-01"), "z"),
            entry(None, "y"),
        ];
        let once = deduplicate(input.clone());
        let twice = deduplicate(once.clone());
        assert!(once.len() <= input.len());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_input() {
        assert!(deduplicate(Vec::new()).is_empty());
    }

    #[test]
    fn test_sort_puts_missing_timestamp_first() {
        let mut entries = vec![
            entry(Some("2023-01-02"), "two"),
            entry(None, "none"),
            entry(Some("2023-01-01"), "one"),
        ];
        sort_by_timestamp(&mut entries);
        let order: Vec<_> = entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(order, ["none", "one", "two"]);
    }
}
