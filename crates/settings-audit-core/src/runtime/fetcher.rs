// crates/settings-audit-core/src/runtime/fetcher.rs
// ============================================================================
// Module: Collection Fetcher
// Description: Reads the three pieces of state a signature check needs.
// Purpose: Fetch metadata, records, and record-set timestamp of a collection.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! Every read carries the registry timestamp as `_expected` so intermediary
//! caches serve the exact version the registry announced.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::model::CollectionMetadata;
use crate::core::model::Record;
use crate::interfaces::FetchError;
use crate::interfaces::HubClient;
use crate::interfaces::RecordQuery;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Record ordering requested from the hub.
pub const RECORDS_SORT: &str = "-last_modified";

// ============================================================================
// SECTION: Fetched Collection
// ============================================================================

/// State of one collection as read from the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedCollection {
    /// Human-readable collection endpoint.
    pub endpoint: String,
    /// Collection metadata (signature, status, timestamp).
    pub metadata: CollectionMetadata,
    /// Live records, newest first.
    pub records: Vec<Record>,
    /// Record-set timestamp.
    pub records_timestamp: u64,
}

// ============================================================================
// SECTION: Fetcher
// ============================================================================

/// Reads collections through a [`HubClient`].
pub struct CollectionFetcher<'a> {
    /// Hub access.
    hub: &'a dyn HubClient,
}

impl<'a> CollectionFetcher<'a> {
    /// Creates a fetcher over `hub`.
    #[must_use]
    pub const fn new(hub: &'a dyn HubClient) -> Self {
        Self {
            hub,
        }
    }

    /// Fetches metadata, records, and record-set timestamp of a collection.
    ///
    /// # Errors
    ///
    /// Returns the first [`FetchError`] of the three reads.
    pub fn fetch(
        &self,
        bucket: &str,
        collection: &str,
        expected: u64,
    ) -> Result<FetchedCollection, FetchError> {
        let metadata = self.hub.get_collection_metadata(bucket, collection, Some(expected))?;
        let query = RecordQuery::new().sorted_by(RECORDS_SORT).expecting(expected);
        let records = self.hub.get_records(bucket, collection, &query)?;
        let records_timestamp =
            self.hub.get_record_set_timestamp(bucket, collection, Some(expected))?;
        Ok(FetchedCollection {
            endpoint: self.hub.collection_endpoint(bucket, collection),
            metadata,
            records,
            records_timestamp,
        })
    }
}
