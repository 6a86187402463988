// crates/settings-audit-config/src/lib.rs
// ============================================================================
// Module: Settings Audit Config Library
// Description: Canonical config model, validation, and environment overrides.
// Purpose: Single source of truth for settings-audit.toml semantics.
// Dependencies: settings-audit-core, settings-audit-hub, serde, toml
// ============================================================================

//! ## Overview
//! `settings-audit-config` loads the audit configuration from an optional TOML
//! file, layers the scheduler environment variables on top, and validates the
//! result before handing typed settings to the hub client and audit runtimes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
