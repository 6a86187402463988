// crates/settings-audit-core/tests/registry_maintenance.rs
// ============================================================================
// Module: Registry Maintenance Tests
// Description: Registry timestamp validation and signature refresh.
// ============================================================================
//! ## Overview
//! Covers the two maintenance commands built on the registry: detecting stale
//! entries and requesting re-signatures.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use common::InMemoryHub;
use serde_json::json;
use settings_audit_core::AuditError;
use settings_audit_core::AuditSettings;
use settings_audit_core::ChangesFailure;
use settings_audit_core::CollectionStatus;
use settings_audit_core::SignatureRefresher;
use settings_audit_core::run_changes_validation;
use settings_audit_core::run_signature_refresh;

// ============================================================================
// SECTION: Registry Timestamps
// ============================================================================

/// Tests that matching timestamps pass.
#[test]
fn up_to_date_registry_passes() {
    let hub = InMemoryHub::new()
        .with_collection("main", "a", json!({"last_modified": 11}), Vec::new(), 10)
        .with_collection("main", "b", json!({"last_modified": 21}), Vec::new(), 20)
        .with_registry(&[("main", "a", 10), ("main", "b", 20)]);
    let report = run_changes_validation(&hub, &AuditSettings::default()).unwrap();
    assert_eq!(report.checked, 2);
    assert!(report.failures.is_empty());
}

/// Tests that stale and unreadable entries are both reported.
#[test]
fn stale_entries_are_reported() {
    let hub = InMemoryHub::new()
        .with_collection("main", "a", json!({"last_modified": 11}), Vec::new(), 10)
        .with_collection("main", "b", json!({"last_modified": 25}), Vec::new(), 25)
        .with_registry(&[("main", "a", 10), ("main", "b", 20), ("main", "gone", 30)]);
    let err = run_changes_validation(&hub, &AuditSettings::default()).unwrap_err();
    let AuditError::Changes(aggregate) = err else {
        panic!("expected a changes error");
    };
    assert_eq!(aggregate.failures.len(), 2);
    assert_eq!(
        aggregate.failures[0],
        ChangesFailure::Mismatch {
            identifier: "main/b".to_string(),
            announced: 20,
            actual: 25,
        }
    );
    assert!(matches!(&aggregate.failures[1], ChangesFailure::Fetch { identifier, .. } if identifier == "main/gone"));
}

// ============================================================================
// SECTION: Signature Refresh
// ============================================================================

fn refresh_hub() -> InMemoryHub {
    InMemoryHub::new()
        .with_signer(json!([
            {"source": {"bucket": "main-workspace", "collection": null},
             "preview": {"bucket": "main-preview", "collection": null},
             "destination": {"bucket": "main", "collection": null}},
            {"source": {"bucket": "security-state-staging", "collection": "onecrl"},
             "destination": {"bucket": "security-state", "collection": "onecrl"}}
        ]))
        .with_collection(
            "main-workspace",
            "cfr",
            json!({"last_modified": 1, "status": "signed"}),
            Vec::new(),
            1,
        )
        .with_collection(
            "security-state-staging",
            "onecrl",
            json!({"last_modified": 2, "status": "signed"}),
            Vec::new(),
            2,
        )
}

/// Tests that every published source collection is switched to `to-resign`.
#[test]
fn refresh_patches_every_source() {
    let hub = refresh_hub().with_registry(&[
        ("main", "cfr", 1),
        ("main-preview", "cfr", 1),
        ("security-state", "onecrl", 2),
        ("security-state", "intermediates", 3),
    ]);
    let report = run_signature_refresh(&hub, &AuditSettings::default()).unwrap();
    let refreshed: Vec<String> = report.refreshed.iter().map(ToString::to_string).collect();
    assert_eq!(refreshed, vec!["main-workspace/cfr", "security-state-staging/onecrl"]);
    assert_eq!(report.skipped, vec!["main-preview/cfr", "security-state/intermediates"]);
    assert_eq!(
        hub.patches(),
        vec![
            ("main-workspace".to_string(), "cfr".to_string(), CollectionStatus::ToResign),
            ("security-state-staging".to_string(), "onecrl".to_string(), CollectionStatus::ToResign),
        ]
    );
}

/// Tests that a rejected refresh is reported without stopping the run.
#[test]
fn failed_refresh_is_aggregated() {
    let hub = refresh_hub().with_registry(&[("main", "missing", 1), ("main", "cfr", 1)]);
    let report = SignatureRefresher::new(&hub, &AuditSettings::default()).run().unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source_collection.to_string(), "main-workspace/missing");
    assert_eq!(report.refreshed.len(), 1);
    assert!(matches!(report.ensure_ok(), Err(aggregate) if aggregate.failures.len() == 1));
}
