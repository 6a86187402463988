// crates/settings-audit-core/src/core/canonical.rs
// ============================================================================
// Module: Canonical Collection Serialization
// Description: Byte-exact reconstruction of the content-signature payload.
// Purpose: Reproduce what the signer signed so signatures can be verified.
// Dependencies: serde, serde_jcs, thiserror
// ============================================================================

//! ## Overview
//! A collection is signed over `Content-Signature:\x00` followed by the RFC
//! 8785 (JCS) canonical JSON of `{"data": [...], "last_modified": "<ts>"}`,
//! where `data` holds the live records sorted by `id` and the timestamp is
//! rendered as a decimal string. Any deviation in key order, spacing, number
//! formatting, or tombstone filtering yields different bytes and a failed
//! verification even though the data is equivalent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use thiserror::Error;

use crate::core::model::Record;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Literal prefix of every content-signature payload.
pub const SIGNATURE_PREFIX: &[u8] = b"Content-Signature:\x00";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while serializing a collection.
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Serialization
// ============================================================================

/// Document covered by the signature.
#[derive(Serialize)]
struct SignedDocument<'a> {
    /// Live records sorted by id.
    data: Vec<&'a Record>,
    /// Collection timestamp as a decimal string.
    last_modified: String,
}

/// Returns the canonical JSON bytes of `records` at `timestamp`.
///
/// Tombstones are dropped and the remaining records are sorted by `id`, so
/// the output does not depend on the input order.
///
/// # Errors
///
/// Returns [`CanonicalError::Canonicalization`] when serialization fails.
pub fn canonical_json(records: &[Record], timestamp: u64) -> Result<Vec<u8>, CanonicalError> {
    let mut data: Vec<&Record> = records.iter().filter(|record| !record.is_tombstone()).collect();
    data.sort_by(|a, b| a.id().cmp(b.id()));
    let document = SignedDocument {
        data,
        last_modified: timestamp.to_string(),
    };
    serde_jcs::to_vec(&document).map_err(|err| CanonicalError::Canonicalization(err.to_string()))
}

/// Returns the exact signed payload: prefix plus canonical JSON.
///
/// # Errors
///
/// Returns [`CanonicalError::Canonicalization`] when serialization fails.
pub fn signed_payload(records: &[Record], timestamp: u64) -> Result<Vec<u8>, CanonicalError> {
    let body = canonical_json(records, timestamp)?;
    let mut payload = Vec::with_capacity(SIGNATURE_PREFIX.len() + body.len());
    payload.extend_from_slice(SIGNATURE_PREFIX);
    payload.extend_from_slice(&body);
    Ok(payload)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
