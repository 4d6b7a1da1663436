//! Change aggregation.
//!
//! Concatenates detector outputs in registration order, drops no-op changes
//! and merges observations of the same field path emitted by several
//! detectors into one change.

use serde_json::Value;
use std::collections::HashMap;

use crate::model::metadata as meta;
use crate::model::{Change, Diagnostics};

const AGGREGATOR: &str = "aggregator";

/// Metadata key listing every detector that observed a merged change
pub const MERGED_DETECTORS: &str = "merged_detectors";

/// Aggregate per-detector batches, given in registration order.
///
/// Merging keeps the position of the first occurrence. The entry carrying
/// `caused_by` becomes the merge base; otherwise the first occurrence is the
/// base. Metadata is the union of both entries with the base winning on
/// conflicts, and priority is the higher of the two.
pub fn aggregate(batches: Vec<Vec<Change>>, diag: &mut Diagnostics) -> Vec<Change> {
    let mut out: Vec<Change> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for change in batches.into_iter().flatten() {
        if change.is_noop() {
            diag.record(
                change.meta_str(meta::DETECTOR).unwrap_or(AGGREGATOR),
                &change.field_path,
                format!("{} change without a difference dropped", change.change_type.as_str()),
            );
            continue;
        }
        match index.get(&change.field_path) {
            Some(&pos) => merge_into(&mut out[pos], change),
            None => {
                index.insert(change.field_path.clone(), out.len());
                out.push(change);
            }
        }
    }
    out
}

fn merge_into(slot: &mut Change, mut incoming: Change) {
    if incoming.metadata.contains_key(meta::CAUSED_BY) && !slot.metadata.contains_key(meta::CAUSED_BY)
    {
        std::mem::swap(slot, &mut incoming);
    }
    let (base, other) = (slot, incoming);

    let mut detectors = detector_list(base);
    for name in detector_list(&other) {
        if !detectors.contains(&name) {
            detectors.push(name);
        }
    }

    base.priority = base.priority.max(other.priority);
    for (key, value) in other.metadata {
        base.metadata.entry(key).or_insert(value);
    }
    base.metadata.insert(
        MERGED_DETECTORS.to_string(),
        Value::Array(detectors.into_iter().map(Value::String).collect()),
    );
}

fn detector_list(change: &Change) -> Vec<String> {
    if let Some(Value::Array(list)) = change.metadata.get(MERGED_DETECTORS) {
        return list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    change
        .meta_str(meta::DETECTOR)
        .map(|d| vec![d.to_string()])
        .unwrap_or_default()
}
