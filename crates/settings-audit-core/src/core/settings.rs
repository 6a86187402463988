// crates/settings-audit-core/src/core/settings.rs
// ============================================================================
// Module: Audit Settings
// Description: Run-wide settings shared by every auditor.
// Purpose: Keep registry location, fan-out width, and trust anchor explicit.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`AuditSettings`] is resolved once by the caller (config file, environment,
//! CLI flags) and passed by reference to each auditor. Defaults match the
//! production Remote Settings deployment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Bucket of the registry collection enumerating published collections.
pub const DEFAULT_REGISTRY_BUCKET: &str = "monitor";
/// Registry collection enumerating published collections.
pub const DEFAULT_REGISTRY_COLLECTION: &str = "changes";
/// Default worker pool size for parallel hub reads.
pub const DEFAULT_PARALLEL_REQUESTS: usize = 4;
/// Suffix every signing certificate common name must carry.
pub const DEFAULT_TRUST_SUFFIX: &str = ".content-signature.mozilla.org";

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Settings shared by every audit run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Registry bucket.
    pub registry_bucket: String,
    /// Registry collection.
    pub registry_collection: String,
    /// Number of worker threads used for parallel hub reads.
    pub parallel_requests: usize,
    /// Required certificate common-name suffix.
    pub trust_suffix: String,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            registry_bucket: DEFAULT_REGISTRY_BUCKET.to_string(),
            registry_collection: DEFAULT_REGISTRY_COLLECTION.to_string(),
            parallel_requests: DEFAULT_PARALLEL_REQUESTS,
            trust_suffix: DEFAULT_TRUST_SUFFIX.to_string(),
        }
    }
}
