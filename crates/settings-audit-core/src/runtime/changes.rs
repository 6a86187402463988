// crates/settings-audit-core/src/runtime/changes.rs
// ============================================================================
// Module: Registry Timestamp Validation
// Description: Checks registry entries against live collection timestamps.
// Purpose: Detect registry entries that announce a stale collection version.
// Dependencies: crate::runtime::pool, tracing
// ============================================================================

//! ## Overview
//! Clients poll the registry to learn which collections changed. An entry
//! whose `last_modified` differs from the collection record-set timestamp
//! makes clients miss (or endlessly refetch) an update.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::core::dates::timestamp_to_date;
use crate::core::model::ChangeEntry;
use crate::core::settings::AuditSettings;
use crate::interfaces::FetchError;
use crate::interfaces::HubClient;
use crate::runtime::errors::AuditError;
use crate::runtime::errors::ConfigurationError;
use crate::runtime::errors::join_failures;
use crate::runtime::pool::WorkerPool;
use crate::runtime::registry::list_registry;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// A registry entry that disagrees with its collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangesFailure {
    /// The announced timestamp differs from the collection timestamp.
    Mismatch {
        /// Collection identifier.
        identifier: String,
        /// Timestamp announced by the registry.
        announced: u64,
        /// Record-set timestamp of the collection.
        actual: u64,
    },
    /// The collection timestamp could not be read.
    Fetch {
        /// Collection identifier.
        identifier: String,
        /// Underlying fetch failure.
        error: FetchError,
    },
}

impl fmt::Display for ChangesFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch {
                identifier,
                announced,
                actual,
            } => write!(
                f,
                "{identifier}: registry announces {announced} ({}) but collection is at {actual} \
                 ({})",
                timestamp_to_date(*announced),
                timestamp_to_date(*actual)
            ),
            Self::Fetch {
                identifier,
                error,
            } => write!(f, "{identifier}: {error}"),
        }
    }
}

/// Result of a registry timestamp validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangesReport {
    /// Number of registry entries checked.
    pub checked: usize,
    /// Entries that disagree with their collection, in registry order.
    pub failures: Vec<ChangesFailure>,
}

impl ChangesReport {
    /// Returns an aggregate error when any entry is stale.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateChangesError`] listing every failure.
    pub fn ensure_ok(&self) -> Result<(), AggregateChangesError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateChangesError {
                failures: self.failures.clone(),
            })
        }
    }
}

/// One or more registry entries disagree with their collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Registry entries out of date:\n\n{}", join_failures(.failures))]
pub struct AggregateChangesError {
    /// Stale entries in registry order.
    pub failures: Vec<ChangesFailure>,
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Compares registry timestamps with collection record-set timestamps.
pub struct ChangesValidator<'a> {
    /// Hub access.
    hub: &'a dyn HubClient,
    /// Run settings.
    settings: &'a AuditSettings,
    /// Fan-out pool for timestamp reads.
    pool: WorkerPool,
}

impl<'a> ChangesValidator<'a> {
    /// Creates a validator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidWorkerPool`] when the pool cannot
    /// be created.
    pub fn new(hub: &'a dyn HubClient, settings: &'a AuditSettings) -> Result<Self, ConfigurationError> {
        Ok(Self {
            hub,
            settings,
            pool: WorkerPool::new(settings.parallel_requests)?,
        })
    }

    /// Checks every registry entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the registry cannot be read or decoded.
    pub fn run(&self) -> Result<ChangesReport, AuditError> {
        let entries = list_registry(self.hub, self.settings, None)?;
        let hub = self.hub;
        let timestamps = self.pool.map_ordered(&entries, |entry| {
            hub.get_record_set_timestamp(&entry.bucket, &entry.collection, None)
        });
        let failures: Vec<ChangesFailure> = entries
            .iter()
            .zip(timestamps)
            .filter_map(|(entry, timestamp)| check_entry(entry, timestamp))
            .collect();
        info!(checked = entries.len(), stale = failures.len(), "validated collection list");
        Ok(ChangesReport {
            checked: entries.len(),
            failures,
        })
    }
}

/// Compares one registry entry with the collection timestamp it announces.
fn check_entry(entry: &ChangeEntry, timestamp: Result<u64, FetchError>) -> Option<ChangesFailure> {
    let identifier = entry.identifier();
    match timestamp {
        Ok(actual) if actual == entry.last_modified => None,
        Ok(actual) => {
            warn!(collection = %identifier, announced = entry.last_modified, actual, "stale entry");
            Some(ChangesFailure::Mismatch {
                identifier,
                announced: entry.last_modified,
                actual,
            })
        }
        Err(error) => {
            warn!(collection = %identifier, error = %error, "unreadable collection");
            Some(ChangesFailure::Fetch {
                identifier,
                error,
            })
        }
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Validates the registry and fails when any entry is stale.
///
/// # Errors
///
/// Returns [`AuditError::Changes`] listing every stale entry, or the fatal
/// error that prevented the run.
pub fn run_changes_validation(
    hub: &dyn HubClient,
    settings: &AuditSettings,
) -> Result<ChangesReport, AuditError> {
    let report = ChangesValidator::new(hub, settings)?.run()?;
    report.ensure_ok()?;
    Ok(report)
}
