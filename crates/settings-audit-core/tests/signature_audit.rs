// crates/settings-audit-core/tests/signature_audit.rs
// ============================================================================
// Module: Signature Audit Tests
// Description: Registry-wide signature audit against an in-memory hub.
// ============================================================================
//! ## Overview
//! Exercises the full audit: registry listing, parallel fetch, verification,
//! skip rules, and aggregate error reporting.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use common::InMemoryHub;
use common::SigningFixture;
use common::StaticCertificates;
use common::X5U;
use common::records;
use serde_json::json;
use settings_audit_core::AuditError;
use settings_audit_core::AuditSettings;
use settings_audit_core::SignatureAuditor;
use settings_audit_core::SignatureFailureKind;
use settings_audit_core::SignatureOutcome;
use settings_audit_core::VerificationError;
use settings_audit_core::run_signature_audit;

fn signed_collection(
    hub: InMemoryHub,
    fixture: &SigningFixture,
    collection: &str,
    timestamp: u64,
) -> InMemoryHub {
    let live = records(json!([
        {"id": format!("{collection}-1"), "last_modified": timestamp - 1, "value": 1},
        {"id": format!("{collection}-2"), "last_modified": timestamp, "value": "two"},
    ]));
    let signature = fixture.signature_for(&live, timestamp);
    hub.with_collection(
        "main",
        collection,
        json!({"last_modified": timestamp + 5, "signature": signature}),
        live,
        timestamp,
    )
}

// ============================================================================
// SECTION: Verdicts
// ============================================================================

/// Tests that only the tampered collection is reported.
#[test]
fn tampered_collection_is_the_only_failure() {
    let fixture = SigningFixture::valid();
    let certificates = StaticCertificates::with(X5U, &fixture.certificate_pem);
    let hub = signed_collection(InMemoryHub::new(), &fixture, "cfr", 1_000);
    let signature = fixture.signature_for(&records(json!([{"id": "x", "v": 1}])), 2_000);
    let hub = hub
        .with_collection(
            "main",
            "tampered",
            json!({"last_modified": 2_000, "signature": signature}),
            records(json!([{"id": "x", "v": 2}])),
            2_000,
        )
        .with_registry(&[("main", "cfr", 1_000), ("main", "tampered", 2_000)]);

    let err = run_signature_audit(&hub, &certificates, &AuditSettings::default()).unwrap_err();
    let AuditError::Verification(aggregate) = err else {
        panic!("expected a verification error");
    };
    assert_eq!(aggregate.failures.len(), 1);
    let failure = &aggregate.failures[0];
    assert!(failure.endpoint.ends_with("/buckets/main/collections/tampered"));
    assert_eq!(failure.kind, SignatureFailureKind::Verification(VerificationError::BadSignature));
    let message = aggregate.to_string();
    assert!(message.contains("Signature verification failed on"));
    assert!(message.contains(" - Signed on: 2000 (1970-01-01 00:00:02 UTC)"));
    assert!(message.contains(" - Records timestamp: 2000"));
    assert!(!message.contains("collections/cfr"));
}

/// Tests that a key not bound to the certificate fails only its collection.
#[test]
fn foreign_public_key_fails_only_its_collection() {
    let fixture = SigningFixture::valid();
    let impostor = SigningFixture::valid();
    let certificates = StaticCertificates::with(X5U, &fixture.certificate_pem);
    let hub = signed_collection(InMemoryHub::new(), &fixture, "first", 100);
    let hub = signed_collection(hub, &impostor, "second", 200);
    let hub = signed_collection(hub, &fixture, "third", 300)
        .with_registry(&[("main", "first", 100), ("main", "second", 200), ("main", "third", 300)]);

    let err = run_signature_audit(&hub, &certificates, &AuditSettings::default()).unwrap_err();
    let AuditError::Verification(aggregate) = err else {
        panic!("expected a verification error");
    };
    assert_eq!(aggregate.failures.len(), 1);
    assert!(aggregate.failures[0].endpoint.ends_with("/collections/second"));
    assert_eq!(
        aggregate.failures[0].kind,
        SignatureFailureKind::Verification(VerificationError::PublicKeyMismatch)
    );
}

/// Tests that a clean registry yields a report of verified collections.
#[test]
fn clean_registry_passes_and_downloads_certificate_once() {
    let fixture = SigningFixture::valid();
    let certificates = StaticCertificates::with(X5U, &fixture.certificate_pem);
    let hub = signed_collection(InMemoryHub::new(), &fixture, "a", 10);
    let hub = signed_collection(hub, &fixture, "b", 20);
    let hub = signed_collection(hub, &fixture, "c", 30)
        .with_registry(&[("main", "a", 10), ("main", "b", 20), ("main", "c", 30)]);

    let report = run_signature_audit(&hub, &certificates, &AuditSettings::default()).unwrap();
    assert_eq!(report.outcomes.len(), 3);
    assert!(report.outcomes.iter().all(|entry| entry.outcome == SignatureOutcome::Verified));
    assert_eq!(certificates.downloads(), 1);
}

/// Tests that an unsigned collection that never held a record is skipped.
#[test]
fn never_populated_unsigned_collection_is_skipped() {
    let certificates = StaticCertificates::default();
    let hub = InMemoryHub::new()
        .with_collection("main", "empty", json!({"last_modified": 5}), Vec::new(), 5)
        .with_registry(&[("main", "empty", 5)]);

    let report = run_signature_audit(&hub, &certificates, &AuditSettings::default()).unwrap();
    assert_eq!(report.outcomes[0].outcome, SignatureOutcome::Skipped);
    let history_queries: Vec<_> = hub
        .queries()
        .into_iter()
        .filter(|(_, collection, query)| collection == "empty" && query.since == Some(1))
        .collect();
    assert_eq!(history_queries.len(), 1);
}

/// Tests that an unsigned collection with only tombstones still fails.
#[test]
fn unsigned_collection_with_history_is_missing_signature() {
    let certificates = StaticCertificates::default();
    let hub = InMemoryHub::new()
        .with_collection("main", "emptied", json!({"last_modified": 5}), Vec::new(), 5)
        .with_tombstones("main", "emptied", records(json!([{"id": "gone", "deleted": true}])))
        .with_registry(&[("main", "emptied", 5)]);

    let settings = AuditSettings::default();
    let auditor = SignatureAuditor::new(&hub, &certificates, &settings).unwrap();
    let report = auditor.run().unwrap();
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].kind,
        SignatureFailureKind::Verification(VerificationError::MissingSignature)
    );
}

/// Tests that an unreadable collection is recorded without stopping the run.
#[test]
fn unreadable_collection_is_a_failure_not_an_abort() {
    let fixture = SigningFixture::valid();
    let certificates = StaticCertificates::with(X5U, &fixture.certificate_pem);
    let hub = signed_collection(InMemoryHub::new(), &fixture, "ok", 10)
        .with_registry(&[("main", "missing", 3), ("main", "ok", 10)]);

    let settings = AuditSettings::default();
    let auditor = SignatureAuditor::new(&hub, &certificates, &settings).unwrap();
    let report = auditor.run().unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert!(matches!(
        &report.outcomes[0].outcome,
        SignatureOutcome::Failed(failure) if matches!(failure.kind, SignatureFailureKind::Fetch(_))
    ));
    assert_eq!(report.outcomes[1].outcome, SignatureOutcome::Verified);
}

/// Tests that outcomes follow registry order.
#[test]
fn outcomes_follow_registry_order() {
    let fixture = SigningFixture::valid();
    let certificates = StaticCertificates::with(X5U, &fixture.certificate_pem);
    let mut hub = InMemoryHub::new();
    let mut registry = Vec::new();
    let names: Vec<String> = (0..12).map(|index| format!("c{index:02}")).collect();
    for (index, name) in names.iter().enumerate().rev() {
        hub = signed_collection(hub, &fixture, name, 100 + index as u64);
    }
    for (index, name) in names.iter().enumerate().rev() {
        registry.push(("main", name.as_str(), 100 + index as u64));
    }
    let hub = hub.with_registry(&registry);

    let report = run_signature_audit(&hub, &certificates, &AuditSettings::default()).unwrap();
    let endpoints: Vec<String> = report.outcomes.iter().map(|entry| entry.endpoint.clone()).collect();
    let expected: Vec<String> = names
        .iter()
        .rev()
        .map(|name| format!("memory://hub/buckets/main/collections/{name}"))
        .collect();
    assert_eq!(endpoints, expected);
}

/// Tests that an unreadable registry aborts the run.
#[test]
fn missing_registry_is_fatal() {
    let certificates = StaticCertificates::default();
    let hub = InMemoryHub::new();
    let err = run_signature_audit(&hub, &certificates, &AuditSettings::default()).unwrap_err();
    assert!(matches!(err, AuditError::Registry { .. }));
}

/// Tests that a zero-width pool is rejected up front.
#[test]
fn zero_parallelism_is_rejected() {
    let certificates = StaticCertificates::default();
    let hub = InMemoryHub::new();
    let settings = AuditSettings {
        parallel_requests: 0,
        ..AuditSettings::default()
    };
    assert!(SignatureAuditor::new(&hub, &certificates, &settings).is_err());
}
