// crates/settings-audit-core/src/runtime/errors.rs
// ============================================================================
// Module: Audit Errors
// Description: Fatal configuration errors and the unified audit error.
// Purpose: Separate "cannot run at all" from "ran and found problems".
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`ConfigurationError`] aborts a run immediately: without a valid registry
//! or signer capability there is no meaningful partial result.
//! [`AuditError`] wraps those together with each auditor's aggregate error so
//! callers can map any outcome to an exit code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::model::RecordError;
use crate::interfaces::FetchError;
use crate::runtime::changes::AggregateChangesError;
use crate::runtime::consistency::AggregateConsistencyError;
use crate::runtime::refresh::AggregateRefreshError;
use crate::runtime::signature_audit::AggregateVerificationError;

// ============================================================================
// SECTION: Configuration Errors
// ============================================================================

/// Fatal errors raised before any collection is audited.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The hub does not advertise signer resources.
    #[error("no signer capability found; run against the writer hub")]
    NoSignerCapability,
    /// The signer capability could not be decoded.
    #[error("invalid signer capability: {0}")]
    InvalidSignerCapability(String),
    /// A registry entry matches no signer resource.
    #[error("unknown signed collection {bucket}/{collection}")]
    UnknownCollection {
        /// Registry bucket.
        bucket: String,
        /// Registry collection.
        collection: String,
    },
    /// A registry entry could not be decoded.
    #[error(transparent)]
    InvalidRegistryEntry(#[from] RecordError),
    /// The worker pool could not be created.
    #[error("invalid worker pool: {0}")]
    InvalidWorkerPool(String),
}

// ============================================================================
// SECTION: Audit Errors
// ============================================================================

/// Any reason an audit run did not complete cleanly.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The run could not start.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// The hub self-description could not be read.
    #[error("failed to read server info: {0}")]
    ServerInfo(FetchError),
    /// The registry collection could not be read.
    #[error("failed to read collection list from {endpoint}: {source}")]
    Registry {
        /// Registry endpoint.
        endpoint: String,
        /// Underlying fetch failure.
        source: FetchError,
    },
    /// One or more collections failed signature verification.
    #[error(transparent)]
    Verification(#[from] AggregateVerificationError),
    /// One or more collections are inconsistent across stages.
    #[error(transparent)]
    Consistency(#[from] AggregateConsistencyError),
    /// One or more registry entries disagree with their collection.
    #[error(transparent)]
    Changes(#[from] AggregateChangesError),
    /// One or more signature refreshes failed.
    #[error(transparent)]
    Refresh(#[from] AggregateRefreshError),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Joins failure descriptions with blank lines, preserving order.
pub(crate) fn join_failures<T: ToString>(failures: &[T]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n\n")
}
