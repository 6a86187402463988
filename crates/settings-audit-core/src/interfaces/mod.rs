// crates/settings-audit-core/src/interfaces/mod.rs
// ============================================================================
// Module: Settings Audit Interfaces
// Description: Transport-agnostic hub and certificate interfaces.
// Purpose: Define the contract surfaces the auditors read remote state through.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The auditors never speak HTTP directly. They read the hub through
//! [`HubClient`] and download signing certificates through
//! [`CertificateSource`]. Implementations must be safe to share across the
//! worker pool, hence the `Send + Sync` bounds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::model::CollectionMetadata;
use crate::core::model::CollectionStatus;
use crate::core::model::Record;
use crate::core::model::ServerInfo;

// ============================================================================
// SECTION: Fetch Errors
// ============================================================================

/// Failures while reading from (or writing to) the hub.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// Requested URL.
        url: String,
    },
    /// The connection could not be established or was reset.
    #[error("connection to {url} failed: {message}")]
    Connection {
        /// Requested URL.
        url: String,
        /// Transport error detail.
        message: String,
    },
    /// The hub answered with a non-success HTTP status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The response could not be decoded.
    #[error("invalid response from {url}: {message}")]
    InvalidResponse {
        /// Requested URL.
        url: String,
        /// Decoding failure detail.
        message: String,
    },
    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Returns true for failures worth retrying (timeouts and connection errors).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection { .. })
    }
}

// ============================================================================
// SECTION: Record Queries
// ============================================================================

/// Query parameters for record listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// Sort expression (`_sort`), e.g. `-last_modified`.
    pub sort: Option<String>,
    /// Cache-busting timestamp (`_expected`).
    pub expected: Option<u64>,
    /// Only changes after this timestamp (`_since`); includes tombstones.
    pub since: Option<u64>,
}

impl RecordQuery {
    /// Query returning live records in server order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sort expression.
    #[must_use]
    pub fn sorted_by(mut self, sort: &str) -> Self {
        self.sort = Some(sort.to_string());
        self
    }

    /// Sets the cache-busting timestamp.
    #[must_use]
    pub const fn expecting(mut self, timestamp: u64) -> Self {
        self.expected = Some(timestamp);
        self
    }

    /// Query returning every record ever created, tombstones included.
    #[must_use]
    pub fn with_tombstones() -> Self {
        Self {
            since: Some(1),
            ..Self::default()
        }
    }
}

// ============================================================================
// SECTION: Hub Client
// ============================================================================

/// Read (and minimal write) access to the hub record/collection API.
pub trait HubClient: Send + Sync {
    /// Returns the human-readable endpoint of a collection, used in reports.
    fn collection_endpoint(&self, bucket: &str, collection: &str) -> String;

    /// Fetches the hub self-description document.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the document cannot be read.
    fn server_info(&self) -> Result<ServerInfo, FetchError>;

    /// Fetches collection metadata.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the collection cannot be read.
    fn get_collection_metadata(
        &self,
        bucket: &str,
        collection: &str,
        expected: Option<u64>,
    ) -> Result<CollectionMetadata, FetchError>;

    /// Lists every record matching `query`, across all pages.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when any page cannot be read.
    fn get_records(
        &self,
        bucket: &str,
        collection: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Record>, FetchError>;

    /// Returns the record-set timestamp (`ETag`) of a collection.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the timestamp cannot be read.
    fn get_record_set_timestamp(
        &self,
        bucket: &str,
        collection: &str,
        expected: Option<u64>,
    ) -> Result<u64, FetchError>;

    /// Updates the review status of a collection and returns the new metadata.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the update is rejected.
    fn patch_collection_status(
        &self,
        bucket: &str,
        collection: &str,
        status: CollectionStatus,
    ) -> Result<CollectionMetadata, FetchError>;
}

// ============================================================================
// SECTION: Certificate Source
// ============================================================================

/// Downloads PEM certificate chains referenced by `x5u` URLs.
pub trait CertificateSource: Send + Sync {
    /// Fetches the raw PEM bytes at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the chain cannot be downloaded.
    fn fetch_certificate(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
