// crates/settings-audit-core/src/runtime/consistency.rs
// ============================================================================
// Module: Consistency Audit
// Description: Compares the stages of every signed collection.
// Purpose: Detect drift between source, preview, and destination collections.
// Dependencies: crate::runtime::{comparator, pool}, tracing
// ============================================================================

//! ## Overview
//! The signer capability of the hub lists resource templates. A template
//! either names a collection or applies to a whole bucket; collection-level
//! templates win. Templates are specialized per monitored collection and never
//! mutated.
//!
//! What is compared depends on the source status:
//! - `to-review`: source against preview,
//! - `signed` (or no status): source against preview, then preview against
//!   destination; source against destination when review is disabled,
//! - anything else: skipped, edits are legitimately in flight.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::model::CollectionRef;
use crate::core::model::CollectionStatus;
use crate::core::model::Record;
use crate::core::model::ResolvedResource;
use crate::core::model::ServerInfo;
use crate::core::model::SignedResource;
use crate::core::settings::AuditSettings;
use crate::interfaces::FetchError;
use crate::interfaces::HubClient;
use crate::interfaces::RecordQuery;
use crate::runtime::comparator::compare_collections;
use crate::runtime::errors::AuditError;
use crate::runtime::errors::ConfigurationError;
use crate::runtime::errors::join_failures;
use crate::runtime::pool::WorkerPool;
use crate::runtime::registry::list_registry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Registry ordering used by the consistency audit.
const REGISTRY_SORT: &str = "bucket,collection";

// ============================================================================
// SECTION: Routing Table
// ============================================================================

/// Signer resource templates indexed for lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    /// Templates naming a destination collection, keyed by (bucket, collection).
    by_collection: BTreeMap<(String, String), SignedResource>,
    /// Bucket-wide templates, keyed by destination bucket.
    by_bucket: BTreeMap<String, SignedResource>,
    /// Buckets used as preview stages.
    preview_buckets: BTreeSet<String>,
}

impl RoutingTable {
    /// Indexes `resources`; later duplicates replace earlier ones.
    #[must_use]
    pub fn new(resources: Vec<SignedResource>) -> Self {
        let mut table = Self::default();
        for resource in resources {
            if let Some(preview) = &resource.preview {
                table.preview_buckets.insert(preview.bucket.clone());
            }
            match &resource.destination.collection {
                Some(collection) => {
                    let key = (resource.destination.bucket.clone(), collection.clone());
                    table.by_collection.insert(key, resource);
                }
                None => {
                    table.by_bucket.insert(resource.destination.bucket.clone(), resource);
                }
            }
        }
        table
    }

    /// Builds the table from the hub signer capability.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NoSignerCapability`] when the hub does
    /// not advertise signer resources.
    pub fn from_server_info(info: &ServerInfo) -> Result<Self, ConfigurationError> {
        let resources = info
            .signer_resources()
            .ok_or(ConfigurationError::NoSignerCapability)?
            .map_err(|err| ConfigurationError::InvalidSignerCapability(err.to_string()))?;
        Ok(Self::new(resources))
    }

    /// Returns true when `bucket` is a preview stage.
    #[must_use]
    pub fn is_preview_bucket(&self, bucket: &str) -> bool {
        self.preview_buckets.contains(bucket)
    }

    /// Returns the template governing `bucket/collection`.
    #[must_use]
    pub fn template(&self, bucket: &str, collection: &str) -> Option<&SignedResource> {
        self.by_collection
            .get(&(bucket.to_string(), collection.to_string()))
            .or_else(|| self.by_bucket.get(bucket))
    }

    /// Specializes the governing template for `bucket/collection`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownCollection`] when no template
    /// applies.
    pub fn resolve(
        &self,
        bucket: &str,
        collection: &str,
    ) -> Result<ResolvedResource, ConfigurationError> {
        self.template(bucket, collection).map(|template| template.specialize(collection)).ok_or_else(
            || ConfigurationError::UnknownCollection {
                bucket: bucket.to_string(),
                collection: collection.to_string(),
            },
        )
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of comparing the stages of one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionCheck {
    /// Every compared stage holds the same records.
    Consistent,
    /// The collection was not compared because of its status.
    Skipped {
        /// Source status at check time.
        status: CollectionStatus,
    },
    /// Records differ between stages.
    Inconsistent {
        /// Records not identically present in every compared stage.
        diff: Vec<Record>,
    },
}

/// Result for one monitored collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyOutcome {
    /// Destination identifier (`bucket/collection`).
    pub identifier: String,
    /// Check result, or the read that failed.
    pub check: Result<CollectionCheck, FetchError>,
}

impl ConsistencyOutcome {
    /// True for inconsistent or unreadable collections.
    fn is_failure(&self) -> bool {
        matches!(self.check, Ok(CollectionCheck::Inconsistent { .. }) | Err(_))
    }
}

impl fmt::Display for ConsistencyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.check {
            Ok(CollectionCheck::Consistent) => write!(f, "{}: consistent", self.identifier),
            Ok(CollectionCheck::Skipped {
                status,
            }) => write!(f, "{}: skipped ({status})", self.identifier),
            Ok(CollectionCheck::Inconsistent {
                diff,
            }) => {
                write!(f, "{}: {} inconsistent record(s)", self.identifier, diff.len())?;
                for record in diff {
                    write!(f, "\n - {record}")?;
                }
                Ok(())
            }
            Err(err) => write!(f, "{}: {err}", self.identifier),
        }
    }
}

/// Results for every monitored collection, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Per-collection results.
    pub outcomes: Vec<ConsistencyOutcome>,
}

impl ConsistencyReport {
    /// Returns an aggregate error when any collection is inconsistent or
    /// could not be read.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateConsistencyError`] listing every failure.
    pub fn ensure_ok(&self) -> Result<(), AggregateConsistencyError> {
        let failures: Vec<ConsistencyOutcome> =
            self.outcomes.iter().filter(|outcome| outcome.is_failure()).cloned().collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateConsistencyError {
                failures,
            })
        }
    }
}

/// One or more collections are inconsistent across stages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Inconsistencies detected on {}\n\n{}", identifiers(.failures), join_failures(.failures))]
pub struct AggregateConsistencyError {
    /// Failed collections in registry order.
    pub failures: Vec<ConsistencyOutcome>,
}

/// Comma-separated identifiers of the failed collections.
fn identifiers(failures: &[ConsistencyOutcome]) -> String {
    failures.iter().map(|outcome| outcome.identifier.as_str()).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Reads the live records of one stage.
fn records(hub: &dyn HubClient, stage: &CollectionRef) -> Result<Vec<Record>, FetchError> {
    hub.get_records(&stage.bucket, &stage.collection, &RecordQuery::new())
}

/// Compares the stages of one resolved resource.
///
/// # Errors
///
/// Returns [`FetchError`] when any stage cannot be read.
pub fn check_resource(
    hub: &dyn HubClient,
    resource: &ResolvedResource,
) -> Result<CollectionCheck, FetchError> {
    let metadata =
        hub.get_collection_metadata(&resource.source.bucket, &resource.source.collection, None)?;
    let diff = match (metadata.status, &resource.preview) {
        (Some(CollectionStatus::ToReview), Some(preview)) => {
            compare_collections(&records(hub, &resource.source)?, &records(hub, preview)?)
        }
        (Some(CollectionStatus::Signed) | None, Some(preview)) => {
            let source = records(hub, &resource.source)?;
            let preview = records(hub, preview)?;
            let destination = records(hub, &resource.destination)?;
            let mut diff = compare_collections(&source, &preview);
            diff.extend(compare_collections(&preview, &destination));
            diff
        }
        (Some(CollectionStatus::Signed) | None, None) => {
            compare_collections(&records(hub, &resource.source)?, &records(hub, &resource.destination)?)
        }
        (Some(status), _) => {
            return Ok(CollectionCheck::Skipped {
                status,
            });
        }
    };
    if diff.is_empty() {
        Ok(CollectionCheck::Consistent)
    } else {
        Ok(CollectionCheck::Inconsistent {
            diff,
        })
    }
}

// ============================================================================
// SECTION: Auditor
// ============================================================================

/// Checks every monitored collection for cross-stage drift.
pub struct ConsistencyAuditor<'a> {
    /// Hub access.
    hub: &'a dyn HubClient,
    /// Run settings.
    settings: &'a AuditSettings,
    /// Fan-out pool for per-collection checks.
    pool: WorkerPool,
}

impl<'a> ConsistencyAuditor<'a> {
    /// Creates an auditor.
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

    /// Runs the audit and returns per-collection results.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the signer capability or registry is
    /// unusable. Per-collection failures are reported in the returned report.
    pub fn run(&self) -> Result<ConsistencyReport, AuditError> {
        let info = self.hub.server_info().map_err(AuditError::ServerInfo)?;
        let routing = RoutingTable::from_server_info(&info)?;
        let entries = list_registry(self.hub, self.settings, Some(REGISTRY_SORT))?;
        let mut resources = Vec::with_capacity(entries.len());
        for entry in &entries {
            if routing.is_preview_bucket(&entry.bucket) {
                debug!(collection = %entry.identifier(), "skipping preview collection");
                continue;
            }
            resources.push(routing.resolve(&entry.bucket, &entry.collection)?);
        }

        let checks = self.pool.map_ordered(&resources, |resource| check_resource(self.hub, resource));
        let outcomes: Vec<ConsistencyOutcome> = resources
            .iter()
            .zip(checks)
            .map(|(resource, check)| ConsistencyOutcome {
                identifier: resource.identifier(),
                check,
            })
            .collect();
        for outcome in &outcomes {
            match &outcome.check {
                Ok(CollectionCheck::Consistent) => {
                    info!(collection = %outcome.identifier, "consistent");
                }
                Ok(CollectionCheck::Skipped {
                    status,
                }) => info!(collection = %outcome.identifier, status = %status, "skipped"),
                Ok(CollectionCheck::Inconsistent {
                    diff,
                }) => warn!(collection = %outcome.identifier, records = diff.len(), "inconsistent"),
                Err(err) => warn!(collection = %outcome.identifier, error = %err, "unreadable"),
            }
        }
        Ok(ConsistencyReport {
            outcomes,
        })
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Runs the consistency audit and fails when any collection drifted.
///
/// # Errors
///
/// Returns [`AuditError::Consistency`] listing every failed collection, or
/// the fatal error that prevented the run.
pub fn run_consistency_audit(
    hub: &dyn HubClient,
    settings: &AuditSettings,
) -> Result<ConsistencyReport, AuditError> {
    let report = ConsistencyAuditor::new(hub, settings)?.run()?;
    report.ensure_ok()?;
    Ok(report)
}
