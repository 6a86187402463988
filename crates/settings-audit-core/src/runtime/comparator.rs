// crates/settings-audit-core/src/runtime/comparator.rs
// ============================================================================
// Module: Record Set Comparison
// Description: Symmetric difference of two record sets by id and content.
// Purpose: Detect drift between the stages of a signed collection.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Server-managed fields (`last_modified`, `schema`) legitimately differ
//! between stages and are ignored. The diff lists records of the first set
//! that are missing or changed in the second, in input order, followed by
//! records only present in the second set, in id order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::model::LAST_MODIFIED_FIELD;
use crate::core::model::Record;
use crate::core::model::SCHEMA_FIELD;

// ============================================================================
// SECTION: Comparison
// ============================================================================

/// Fields excluded from record equality.
const VOLATILE_FIELDS: [&str; 2] = [LAST_MODIFIED_FIELD, SCHEMA_FIELD];

/// Returns true for fields the hub rewrites on every stage.
fn is_volatile(field: &str) -> bool {
    VOLATILE_FIELDS.contains(&field)
}

/// Returns true when both records carry the same non-volatile attributes.
#[must_use]
pub fn records_equal(a: &Record, b: &Record) -> bool {
    let mut compared = 0_usize;
    for (field, value) in a.fields().iter().filter(|(field, _)| !is_volatile(field)) {
        if b.get(field) != Some(value) {
            return false;
        }
        compared += 1;
    }
    compared == b.fields().keys().filter(|field| !is_volatile(field)).count()
}

/// Returns every record not identically present in both sets.
#[must_use]
pub fn compare_collections(a: &[Record], b: &[Record]) -> Vec<Record> {
    let mut remaining: BTreeMap<&str, &Record> = b.iter().map(|record| (record.id(), record)).collect();
    let mut diff = Vec::new();
    for record in a {
        match remaining.remove(record.id()) {
            Some(other) if records_equal(record, other) => {}
            _ => diff.push(record.clone()),
        }
    }
    diff.extend(remaining.into_values().cloned());
    diff
}
