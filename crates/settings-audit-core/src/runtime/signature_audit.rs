// crates/settings-audit-core/src/runtime/signature_audit.rs
// ============================================================================
// Module: Signature Audit
// Description: Verifies the content signature of every published collection.
// Purpose: Report every collection whose signature cannot be trusted.
// Dependencies: crate::runtime::{fetcher, pool, signature}, tracing
// ============================================================================

//! ## Overview
//! The audit lists the registry, fetches every collection in parallel, then
//! verifies signatures one by one in registry order. A collection that was
//! never signed is skipped only when it never held a record, tombstones
//! included; otherwise the missing signature is a failure. Failures never
//! stop the run; they are accumulated and raised as one aggregate error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Instant;

use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::core::canonical::signed_payload;
use crate::core::dates::timestamp_to_date;
use crate::core::model::ChangeEntry;
use crate::core::settings::AuditSettings;
use crate::interfaces::CertificateSource;
use crate::interfaces::FetchError;
use crate::interfaces::HubClient;
use crate::interfaces::RecordQuery;
use crate::runtime::errors::AuditError;
use crate::runtime::errors::ConfigurationError;
use crate::runtime::errors::join_failures;
use crate::runtime::fetcher::CollectionFetcher;
use crate::runtime::fetcher::FetchedCollection;
use crate::runtime::pool::WorkerPool;
use crate::runtime::registry::list_registry;
use crate::runtime::signature::CertificateCache;
use crate::runtime::signature::SignatureVerifier;
use crate::runtime::signature::VerificationError;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Why a collection failed the audit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureFailureKind {
    /// The collection could not be read.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The records could not be serialized.
    #[error("failed to serialize records: {0}")]
    Serialization(String),
    /// The signature was rejected.
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

/// Failure description for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureFailure {
    /// Collection endpoint.
    pub endpoint: String,
    /// Collection metadata timestamp, when the collection was read.
    pub signed_on: Option<u64>,
    /// Record-set timestamp, when the collection was read.
    pub records_timestamp: Option<u64>,
    /// Failure reason.
    pub kind: SignatureFailureKind,
}

impl fmt::Display for SignatureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature verification failed on {}", self.endpoint)?;
        if let Some(signed_on) = self.signed_on {
            write!(f, "\n - Signed on: {signed_on} ({})", timestamp_to_date(signed_on))?;
        }
        if let Some(timestamp) = self.records_timestamp {
            write!(f, "\n - Records timestamp: {timestamp} ({})", timestamp_to_date(timestamp))?;
        }
        write!(f, "\n - Reason: {}", self.kind)
    }
}

/// Verdict for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureOutcome {
    /// The signature is valid and trusted.
    Verified,
    /// The collection was never signed and never held a record.
    Skipped,
    /// The collection failed the audit.
    Failed(SignatureFailure),
}

/// Verdict for one collection, with its endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOutcome {
    /// Collection endpoint.
    pub endpoint: String,
    /// Verdict.
    pub outcome: SignatureOutcome,
}

/// Verdicts for every registry entry, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureAuditReport {
    /// Per-collection verdicts.
    pub outcomes: Vec<CollectionOutcome>,
}

impl SignatureAuditReport {
    /// Returns the failed collections, in registry order.
    #[must_use]
    pub fn failures(&self) -> Vec<&SignatureFailure> {
        self.outcomes
            .iter()
            .filter_map(|entry| match &entry.outcome {
                SignatureOutcome::Failed(failure) => Some(failure),
                SignatureOutcome::Verified | SignatureOutcome::Skipped => None,
            })
            .collect()
    }

    /// Returns an aggregate error when any collection failed.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateVerificationError`] listing every failure.
    pub fn ensure_ok(&self) -> Result<(), AggregateVerificationError> {
        let failures: Vec<SignatureFailure> = self.failures().into_iter().cloned().collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateVerificationError {
                failures,
            })
        }
    }
}

/// One or more collections failed signature verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("\n{}", join_failures(.failures))]
pub struct AggregateVerificationError {
    /// Failures in registry order.
    pub failures: Vec<SignatureFailure>,
}

// ============================================================================
// SECTION: Auditor
// ============================================================================

/// Verifies signatures of every collection listed in the registry.
pub struct SignatureAuditor<'a> {
    /// Hub access.
    hub: &'a dyn HubClient,
    /// Certificate downloader.
    certificates: &'a dyn CertificateSource,
    /// Run settings.
    settings: &'a AuditSettings,
    /// Fan-out pool for collection reads.
    pool: WorkerPool,
}

impl<'a> SignatureAuditor<'a> {
    /// Creates an auditor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidWorkerPool`] when the pool cannot
    /// be created.
    pub fn new(
        hub: &'a dyn HubClient,
        certificates: &'a dyn CertificateSource,
        settings: &'a AuditSettings,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            hub,
            certificates,
            settings,
            pool: WorkerPool::new(settings.parallel_requests)?,
        })
    }

    /// Runs the audit and returns per-collection verdicts.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the registry cannot be read or decoded.
    /// Per-collection failures are reported in the returned report.
    pub fn run(&self) -> Result<SignatureAuditReport, AuditError> {
        let entries = list_registry(self.hub, self.settings, None)?;
        let fetcher = CollectionFetcher::new(self.hub);
        let started = Instant::now();
        let fetched = self.pool.map_ordered(&entries, |entry| {
            fetcher.fetch(&entry.bucket, &entry.collection, entry.last_modified)
        });
        info!(
            collections = entries.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "downloaded collections"
        );

        let cache = CertificateCache::new();
        let verifier = SignatureVerifier::new(self.certificates, self.settings.trust_suffix.as_str());
        let total = entries.len();
        let mut outcomes = Vec::with_capacity(total);
        for (index, (entry, result)) in entries.iter().zip(fetched).enumerate() {
            let endpoint = self.hub.collection_endpoint(&entry.bucket, &entry.collection);
            let outcome = match result {
                Ok(collection) => self.check(&verifier, &cache, entry, &collection),
                Err(err) => SignatureOutcome::Failed(SignatureFailure {
                    endpoint: endpoint.clone(),
                    signed_on: None,
                    records_timestamp: None,
                    kind: err.into(),
                }),
            };
            log_outcome(index + 1, total, &endpoint, &outcome);
            outcomes.push(CollectionOutcome {
                endpoint,
                outcome,
            });
        }
        Ok(SignatureAuditReport {
            outcomes,
        })
    }

    /// Verifies one fetched collection.
    fn check(
        &self,
        verifier: &SignatureVerifier<'_>,
        cache: &CertificateCache,
        entry: &ChangeEntry,
        collection: &FetchedCollection,
    ) -> SignatureOutcome {
        let failed = |kind: SignatureFailureKind| {
            SignatureOutcome::Failed(SignatureFailure {
                endpoint: collection.endpoint.clone(),
                signed_on: Some(collection.metadata.last_modified),
                records_timestamp: Some(collection.records_timestamp),
                kind,
            })
        };
        let signature = match collection.metadata.parsed_signature() {
            Some(Ok(signature)) => signature,
            Some(Err(err)) => {
                return failed(VerificationError::MalformedSignature(err.to_string()).into());
            }
            None => {
                // Never signed: fine only if the collection never held a record.
                let query = RecordQuery::with_tombstones().expecting(entry.last_modified);
                return match self.hub.get_records(&entry.bucket, &entry.collection, &query) {
                    Ok(history) if history.is_empty() => SignatureOutcome::Skipped,
                    Ok(_) => failed(VerificationError::MissingSignature.into()),
                    Err(err) => failed(err.into()),
                };
            }
        };
        let payload = match signed_payload(&collection.records, collection.records_timestamp) {
            Ok(payload) => payload,
            Err(err) => return failed(SignatureFailureKind::Serialization(err.to_string())),
        };
        match verifier.verify(&payload, &signature, cache) {
            Ok(()) => SignatureOutcome::Verified,
            Err(err) => failed(err.into()),
        }
    }
}

/// Logs one verdict with its position in the run.
fn log_outcome(position: usize, total: usize, endpoint: &str, outcome: &SignatureOutcome) {
    let progress = format!("{position:02}/{total:02}");
    match outcome {
        SignatureOutcome::Verified => info!(progress = %progress, endpoint, "OK"),
        SignatureOutcome::Skipped => info!(progress = %progress, endpoint, "SKIP"),
        SignatureOutcome::Failed(failure) => {
            warn!(progress = %progress, endpoint, reason = %failure.kind, "BAD signature");
        }
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Runs the signature audit and fails when any collection fails.
///
/// # Errors
///
/// Returns [`AuditError::Verification`] listing every failed collection, or
/// the fatal error that prevented the run.
pub fn run_signature_audit(
    hub: &dyn HubClient,
    certificates: &dyn CertificateSource,
    settings: &AuditSettings,
) -> Result<SignatureAuditReport, AuditError> {
    let report = SignatureAuditor::new(hub, certificates, settings)?.run()?;
    report.ensure_ok()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_lists_timestamps_and_reason() {
        let failure = SignatureFailure {
            endpoint: "https://hub/v1/buckets/main/collections/cfr".to_string(),
            signed_on: Some(1_589_366_400_999),
            records_timestamp: Some(0),
            kind: VerificationError::BadSignature.into(),
        };
        assert_eq!(
            failure.to_string(),
            "Signature verification failed on https://hub/v1/buckets/main/collections/cfr\n - \
             Signed on: 1589366400999 (2020-05-13 10:40:00 UTC)\n - Records timestamp: 0 \
             (1970-01-01 00:00:00 UTC)\n - Reason: signature does not match the collection \
             content"
        );
    }

    #[test]
    fn aggregate_joins_failures_with_blank_lines() {
        let failure = |endpoint: &str| SignatureFailure {
            endpoint: endpoint.to_string(),
            signed_on: None,
            records_timestamp: None,
            kind: VerificationError::MissingSignature.into(),
        };
        let error = AggregateVerificationError {
            failures: vec![failure("a"), failure("b")],
        };
        let rendered = error.to_string();
        assert!(rendered.starts_with("\nSignature verification failed on a"));
        assert!(rendered.contains("\n\nSignature verification failed on b"));
    }
}
