// crates/settings-audit-core/src/runtime/registry.rs
// ============================================================================
// Module: Registry Listing
// Description: Reads the registry collection enumerating published collections.
// Purpose: Share registry decoding between the auditors.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! The registry collection lists every published collection with the
//! timestamp of its latest change. Entries are decoded strictly; one bad
//! entry aborts the run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing::info;

use crate::core::model::ChangeEntry;
use crate::core::settings::AuditSettings;
use crate::interfaces::HubClient;
use crate::interfaces::RecordQuery;
use crate::runtime::errors::AuditError;
use crate::runtime::errors::ConfigurationError;

/// Lists and decodes every registry entry, optionally sorted by the hub.
///
/// # Errors
///
/// Returns [`AuditError::Registry`] when the registry cannot be read and
/// [`AuditError::Configuration`] when an entry is malformed.
pub fn list_registry(
    hub: &dyn HubClient,
    settings: &AuditSettings,
    sort: Option<&str>,
) -> Result<Vec<ChangeEntry>, AuditError> {
    let endpoint = hub.collection_endpoint(&settings.registry_bucket, &settings.registry_collection);
    info!(endpoint = %endpoint, "reading collection list");
    let query = match sort {
        Some(sort) => RecordQuery::new().sorted_by(sort),
        None => RecordQuery::new(),
    };
    let records = hub
        .get_records(&settings.registry_bucket, &settings.registry_collection, &query)
        .map_err(|source| AuditError::Registry {
            endpoint,
            source,
        })?;
    let entries = records
        .iter()
        .map(ChangeEntry::from_record)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ConfigurationError::from)?;
    Ok(entries)
}
