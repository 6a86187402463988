// crates/settings-audit-core/src/lib.rs
// ============================================================================
// Module: Settings Audit Core Library
// Description: Public API surface for the Remote Settings audit core.
// Purpose: Expose the data model, hub interfaces, and audit runtimes.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Settings Audit core verifies content signatures over published Remote
//! Settings collections and checks that the source -> preview -> destination
//! replication pipeline is consistent. It talks to the hub only through the
//! [`HubClient`] and [`CertificateSource`] interfaces, so the HTTP transport
//! lives in a separate crate and tests can run against in-memory hubs.
//!
//! Every audit is a single read-then-report pass: per-collection failures are
//! accumulated and surfaced as one aggregate error at the end of the run.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::*;

pub use interfaces::CertificateSource;
pub use interfaces::FetchError;
pub use interfaces::HubClient;
pub use interfaces::RecordQuery;
pub use runtime::AggregateChangesError;
pub use runtime::AggregateConsistencyError;
pub use runtime::AggregateRefreshError;
pub use runtime::AggregateVerificationError;
pub use runtime::AuditError;
pub use runtime::Certificate;
pub use runtime::CertificateCache;
pub use runtime::ChangesFailure;
pub use runtime::ChangesReport;
pub use runtime::ChangesValidator;
pub use runtime::CollectionCheck;
pub use runtime::CollectionFetcher;
pub use runtime::CollectionOutcome;
pub use runtime::ConfigurationError;
pub use runtime::ConsistencyAuditor;
pub use runtime::ConsistencyOutcome;
pub use runtime::ConsistencyReport;
pub use runtime::FetchedCollection;
pub use runtime::RefreshFailure;
pub use runtime::RefreshReport;
pub use runtime::RoutingTable;
pub use runtime::SignatureAuditReport;
pub use runtime::SignatureAuditor;
pub use runtime::SignatureFailure;
pub use runtime::SignatureFailureKind;
pub use runtime::SignatureOutcome;
pub use runtime::SignatureRefresher;
pub use runtime::SignatureVerifier;
pub use runtime::VerificationError;
pub use runtime::WorkerPool;
pub use runtime::compare_collections;
pub use runtime::records_equal;
pub use runtime::run_changes_validation;
pub use runtime::run_consistency_audit;
pub use runtime::run_signature_audit;
pub use runtime::run_signature_refresh;
