// crates/settings-audit-core/src/runtime/mod.rs
// ============================================================================
// Module: Settings Audit Runtime
// Description: Signature verification, consistency checks, and audit runners.
// Purpose: Group the components that read hub state and compute verdicts.
// Dependencies: crate::{core, interfaces}, rayon, p384, x509-parser, tracing
// ============================================================================

//! ## Overview
//! The runtime hosts one module per component: the worker pool, the
//! collection fetcher, the signature verifier, the record-set comparator, and
//! the four auditors (signatures, consistency, registry timestamps, and
//! signature refresh). Each auditor is a single pass that accumulates
//! per-collection failures and raises one aggregate error at the end.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod changes;
pub mod comparator;
pub mod consistency;
pub mod errors;
pub mod fetcher;
pub mod pool;
pub mod refresh;
pub mod registry;
pub mod signature;
pub mod signature_audit;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use changes::AggregateChangesError;
pub use changes::ChangesFailure;
pub use changes::ChangesReport;
pub use changes::ChangesValidator;
pub use changes::run_changes_validation;
pub use comparator::compare_collections;
pub use comparator::records_equal;
pub use consistency::AggregateConsistencyError;
pub use consistency::CollectionCheck;
pub use consistency::ConsistencyAuditor;
pub use consistency::ConsistencyOutcome;
pub use consistency::ConsistencyReport;
pub use consistency::RoutingTable;
pub use consistency::run_consistency_audit;
pub use errors::AuditError;
pub use errors::ConfigurationError;
pub use fetcher::CollectionFetcher;
pub use fetcher::FetchedCollection;
pub use pool::WorkerPool;
pub use refresh::AggregateRefreshError;
pub use refresh::RefreshFailure;
pub use refresh::RefreshReport;
pub use refresh::SignatureRefresher;
pub use refresh::run_signature_refresh;
pub use signature::Certificate;
pub use signature::CertificateCache;
pub use signature::SignatureVerifier;
pub use signature::VerificationError;
pub use signature_audit::AggregateVerificationError;
pub use signature_audit::CollectionOutcome;
pub use signature_audit::SignatureAuditReport;
pub use signature_audit::SignatureAuditor;
pub use signature_audit::SignatureFailure;
pub use signature_audit::SignatureFailureKind;
pub use signature_audit::SignatureOutcome;
pub use signature_audit::run_signature_audit;
