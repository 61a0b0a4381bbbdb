//! Change detection between the stored snapshot and an incoming batch.
//!
//! Pure function over two snapshots: no store access, no side effects.
//! Comparison is structural over every source-visible field — vectors and
//! store internals are not part of [`DocumentRecord`], so they can never
//! leak into the comparison.

use std::collections::HashMap;

use crate::models::{ChangeKind, ChangeRecord, DocumentRecord};

/// Classify each incoming record against the stored snapshot.
///
/// - key absent from the store → `New`, emitted as-is;
/// - key present, any field differs → `Updated`, emitted as the stored
///   record merged with the incoming one (incoming wins per field);
/// - key present, all fields equal → unchanged, not emitted.
///
/// The comparison runs against the merged record, not the raw incoming
/// one: a field the feed omits keeps its stored value through the merge,
/// so an omission alone never produces an update and repeated runs over
/// the same feed converge to zero changes.
pub fn detect(
    existing: &HashMap<String, DocumentRecord>,
    incoming: &[DocumentRecord],
) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();

    for record in incoming {
        match existing.get(&record.key) {
            None => changes.push(ChangeRecord {
                record: record.clone(),
                kind: ChangeKind::New,
            }),
            Some(old) => {
                let merged = old.merged_into(record);
                if &merged != old {
                    changes.push(ChangeRecord {
                        record: merged,
                        kind: ChangeKind::Updated,
                    });
                }
            }
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, body: &str) -> DocumentRecord {
        DocumentRecord {
            key: key.to_string(),
            author: Some("ana".to_string()),
            body: Some(body.to_string()),
            summary: None,
            url: Some(format!("https://x/{}", key)),
            created_time: Some("2024-01-01 10:00:00".to_string()),
            inserted_time: None,
            likes: Some(3),
            comments: Some(1),
            shares: None,
            tags: Some(vec!["news".to_string()]),
        }
    }

    fn snapshot(records: &[DocumentRecord]) -> HashMap<String, DocumentRecord> {
        records
            .iter()
            .map(|r| (r.key.clone(), r.clone()))
            .collect()
    }

    #[test]
    fn test_identical_record_emits_nothing() {
        let stored = record("p1", "hello");
        let existing = snapshot(&[stored.clone()]);

        let changes = detect(&existing, &[stored]);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_unknown_key_is_new() {
        let existing = snapshot(&[record("p1", "hello")]);

        let changes = detect(&existing, &[record("p2", "other")]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::New);
        assert_eq!(changes[0].record.key, "p2");
    }

    #[test]
    fn test_changed_field_is_updated() {
        let existing = snapshot(&[record("p1", "hello")]);

        let mut incoming = record("p1", "hello");
        incoming.likes = Some(4);

        let changes = detect(&existing, &[incoming]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Updated);
        assert_eq!(changes[0].record.likes, Some(4));
    }

    #[test]
    fn test_list_field_compared_by_content() {
        let existing = snapshot(&[record("p1", "hello")]);

        // Same tag content, separately allocated — must compare equal.
        let mut same = record("p1", "hello");
        same.tags = Some(vec!["news".to_string()]);
        assert!(detect(&existing, &[same]).is_empty());

        let mut changed = record("p1", "hello");
        changed.tags = Some(vec!["news".to_string(), "tech".to_string()]);
        let changes = detect(&existing, &[changed]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Updated);
    }

    #[test]
    fn test_merge_keeps_fields_missing_from_incoming() {
        let existing = snapshot(&[record("p1", "hello")]);

        let incoming = DocumentRecord {
            key: "p1".to_string(),
            author: None,
            body: Some("edited".to_string()),
            summary: None,
            url: None,
            created_time: None,
            inserted_time: None,
            likes: None,
            comments: None,
            shares: None,
            tags: None,
        };

        let changes = detect(&existing, &[incoming]);
        assert_eq!(changes.len(), 1);
        let merged = &changes[0].record;
        assert_eq!(merged.body.as_deref(), Some("edited"));
        // Absent incoming fields keep their stored values.
        assert_eq!(merged.author.as_deref(), Some("ana"));
        assert_eq!(merged.likes, Some(3));
        assert_eq!(merged.url.as_deref(), Some("https://x/p1"));
    }

    #[test]
    fn test_dropped_field_alone_is_unchanged() {
        let existing = snapshot(&[record("p1", "hello")]);

        // The feed omits a field the store has. The merge restores the
        // stored value, so the merged record equals the stored one and
        // nothing is emitted — the run stays convergent.
        let mut incoming = record("p1", "hello");
        incoming.author = None;
        assert!(detect(&existing, &[incoming]).is_empty());

        // Omission combined with a real change still updates, and the
        // omitted field survives the merge.
        let mut incoming = record("p1", "hello");
        incoming.author = None;
        incoming.likes = Some(99);
        let changes = detect(&existing, &[incoming]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Updated);
        assert_eq!(changes[0].record.author.as_deref(), Some("ana"));
    }

    #[test]
    fn test_incoming_field_missing_everywhere_stays_missing() {
        let existing = snapshot(&[record("p1", "hello")]);

        let mut incoming = record("p1", "edited");
        incoming.shares = None; // missing in both

        let changes = detect(&existing, &[incoming]);
        assert_eq!(changes[0].record.shares, None);
    }

    #[test]
    fn test_mixed_batch_classification() {
        let existing = snapshot(&[record("p1", "hello"), record("p2", "world")]);

        let mut updated = record("p1", "hello");
        updated.comments = Some(9);
        let unchanged = record("p2", "world");
        let fresh = record("p3", "brand new");

        let changes = detect(&existing, &[updated, unchanged, fresh]);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ChangeKind::Updated);
        assert_eq!(changes[0].record.key, "p1");
        assert_eq!(changes[1].kind, ChangeKind::New);
        assert_eq!(changes[1].record.key, "p3");
    }
}
