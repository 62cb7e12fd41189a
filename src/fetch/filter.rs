use crate::model::element_set::ElementSet;
use crate::model::record::StructureRecord;
use std::collections::HashSet;

/// A record removed by the element allow-list.
#[derive(Debug, Clone, PartialEq)]
pub struct Dropped {
    pub task_id: String,
    /// Elements of the record outside the allow-list; never empty.
    pub disallowed: ElementSet,
}

/// Splits `records` into those whose elements are all in `allowed` and those
/// that are not. Query order is preserved in both halves.
pub fn partition_allowed(
    records: Vec<StructureRecord>,
    allowed: &ElementSet,
) -> (Vec<StructureRecord>, Vec<Dropped>) {
    let mut kept = Vec::with_capacity(records.len());
    let mut dropped = Vec::new();

    for record in records {
        let disallowed = record.disallowed(allowed);
        if disallowed.is_empty() {
            kept.push(record);
        } else {
            dropped.push(Dropped {
                task_id: record.task_id,
                disallowed,
            });
        }
    }

    (kept, dropped)
}

/// Keeps the first record of every `task_id`, in query order, and returns the
/// identifiers of the later repeats.
pub fn dedup_task_ids(records: Vec<StructureRecord>) -> (Vec<StructureRecord>, Vec<String>) {
    let mut seen = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    let mut repeated = Vec::new();

    for record in records {
        if seen.contains(record.task_id.as_str()) {
            repeated.push(record.task_id);
        } else {
            seen.insert(record.task_id.clone());
            unique.push(record);
        }
    }

    (unique, repeated)
}
