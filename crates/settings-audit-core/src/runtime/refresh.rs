// crates/settings-audit-core/src/runtime/refresh.rs
// ============================================================================
// Module: Signature Refresh
// Description: Requests a fresh signature for every published collection.
// Purpose: Re-sign collections before their signing certificate expires.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! For each registry entry, the signer resource publishing to it is looked up
//! and its source collection is switched to `to-resign`. Requests are issued
//! sequentially so the signer is never flooded. Entries with no matching
//! resource (preview collections, unsigned collections) are skipped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::dates::timestamp_to_date;
use crate::core::model::ChangeEntry;
use crate::core::model::CollectionRef;
use crate::core::model::CollectionStatus;
use crate::core::model::SignedResource;
use crate::core::settings::AuditSettings;
use crate::interfaces::FetchError;
use crate::interfaces::HubClient;
use crate::runtime::errors::AuditError;
use crate::runtime::errors::ConfigurationError;
use crate::runtime::errors::join_failures;
use crate::runtime::registry::list_registry;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// A collection whose signature refresh failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source_collection}: {error}")]
pub struct RefreshFailure {
    /// Source collection whose status could not be updated.
    pub source_collection: CollectionRef,
    /// Underlying hub failure.
    pub error: FetchError,
}

/// Result of a refresh run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Source collections switched to `to-resign`.
    pub refreshed: Vec<CollectionRef>,
    /// Registry entries with no signer resource.
    pub skipped: Vec<String>,
    /// Failed refreshes.
    pub failures: Vec<RefreshFailure>,
}

impl RefreshReport {
    /// Returns an aggregate error when any refresh failed.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateRefreshError`] listing every failure.
    pub fn ensure_ok(&self) -> Result<(), AggregateRefreshError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateRefreshError {
                failures: self.failures.clone(),
            })
        }
    }
}

/// One or more signature refreshes failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Signature refresh failed:\n\n{}", join_failures(.failures))]
pub struct AggregateRefreshError {
    /// Failures in registry order.
    pub failures: Vec<RefreshFailure>,
}

// ============================================================================
// SECTION: Refresher
// ============================================================================

/// Switches every signed source collection to `to-resign`.
pub struct SignatureRefresher<'a> {
    /// Hub access.
    hub: &'a dyn HubClient,
    /// Run settings.
    settings: &'a AuditSettings,
}

impl<'a> SignatureRefresher<'a> {
    /// Creates a refresher.
    #[must_use]
    pub const fn new(hub: &'a dyn HubClient, settings: &'a AuditSettings) -> Self {
        Self {
            hub,
            settings,
        }
    }

    /// Requests a new signature for every registry entry with a signer resource.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the signer capability or registry is
    /// unusable. Per-collection failures are reported in the returned report.
    pub fn run(&self) -> Result<RefreshReport, AuditError> {
        let info = self.hub.server_info().map_err(AuditError::ServerInfo)?;
        let resources = info
            .signer_resources()
            .ok_or(ConfigurationError::NoSignerCapability)?
            .map_err(|err| ConfigurationError::InvalidSignerCapability(err.to_string()))?;
        let entries = list_registry(self.hub, self.settings, None)?;

        let mut report = RefreshReport::default();
        for entry in &entries {
            let Some(source) = signed_source(&resources, entry) else {
                debug!(collection = %entry.identifier(), "no signer resource, skipping");
                report.skipped.push(entry.identifier());
                continue;
            };
            match self.refresh(&source) {
                Ok(()) => report.refreshed.push(source),
                Err(error) => {
                    warn!(collection = %source, error = %error, "refresh failed");
                    report.failures.push(RefreshFailure {
                        source_collection: source,
                        error,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Requests a re-signature of one source collection.
    fn refresh(&self, source: &CollectionRef) -> Result<(), FetchError> {
        let before = self.hub.get_collection_metadata(&source.bucket, &source.collection, None)?;
        let after = self.hub.patch_collection_status(
            &source.bucket,
            &source.collection,
            CollectionStatus::ToResign,
        )?;
        info!(
            collection = %source,
            previous_status = before.status.map_or("none", CollectionStatus::as_str),
            last_modified = after.last_modified,
            date = %timestamp_to_date(after.last_modified),
            "requested signature refresh"
        );
        Ok(())
    }
}

/// Returns the source collection of the first resource publishing to `entry`.
fn signed_source(resources: &[SignedResource], entry: &ChangeEntry) -> Option<CollectionRef> {
    resources
        .iter()
        .find(|resource| resource.matches_destination(&entry.bucket, &entry.collection))
        .map(|resource| resource.specialize(&entry.collection).source)
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Refreshes every signature and fails when any refresh failed.
///
/// # Errors
///
/// Returns [`AuditError::Refresh`] listing every failure, or the fatal error
/// that prevented the run.
pub fn run_signature_refresh(
    hub: &dyn HubClient,
    settings: &AuditSettings,
) -> Result<RefreshReport, AuditError> {
    let report = SignatureRefresher::new(hub, settings).run()?;
    report.ensure_ok()?;
    Ok(report)
}
