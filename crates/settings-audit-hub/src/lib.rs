// crates/settings-audit-hub/src/lib.rs
// ============================================================================
// Module: Settings Audit Hub Client
// Description: HTTP implementation of the hub and certificate interfaces.
// Purpose: Connect the audit core to a live hub over HTTPS.
// Dependencies: settings-audit-core, reqwest
// ============================================================================

//! ## Overview
//! This crate provides [`HttpHubClient`], a blocking, retrying client for the
//! hub record/collection API that also downloads signing certificates.

pub mod auth;
pub mod http;
pub mod retry;

pub use auth::AuthError;
pub use auth::HubAuth;
pub use http::DEFAULT_SERVER_URL;
pub use http::HttpHubClient;
pub use http::HttpHubConfig;
pub use http::HubClientError;
pub use retry::RetryPolicy;
