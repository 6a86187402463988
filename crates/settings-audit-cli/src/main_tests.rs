// crates/settings-audit-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and config overrides.
// Purpose: Ensure flags map onto subcommands and override loaded config.
// Dependencies: settings-audit-cli main helpers
// ============================================================================

//! ## Overview
//! Validates subcommand names, global flag placement, and that
//! command-line overrides are revalidated before any request is made.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use clap::CommandFactory;
use clap::Parser;
use settings_audit_config::AuditConfig;

use super::Cli;
use super::CliError;
use super::Commands;
use super::resolve_config;

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn subcommands_use_kebab_case_names() {
    let cases = [
        ("validate-signature", Commands::ValidateSignature),
        ("consistency-checks", Commands::ConsistencyChecks),
        ("validate-changes", Commands::ValidateChanges),
        ("refresh-signature", Commands::RefreshSignature),
    ];
    for (name, expected) in cases {
        let cli = Cli::try_parse_from(["settings-audit", name]).unwrap();
        assert_eq!(cli.command, expected);
    }
}

#[test]
fn global_flags_follow_the_subcommand() {
    let cli = Cli::try_parse_from([
        "settings-audit",
        "validate-changes",
        "--server",
        "https://settings.example/v1",
        "--parallel",
        "8",
    ])
    .unwrap();
    assert_eq!(cli.server.as_deref(), Some("https://settings.example/v1"));
    assert_eq!(cli.parallel, Some(8));
}

#[test]
fn missing_subcommand_is_an_error() {
    assert!(Cli::try_parse_from(["settings-audit"]).is_err());
}

// ============================================================================
// SECTION: Overrides
// ============================================================================

#[test]
fn flags_override_loaded_config() {
    let cli = Cli::try_parse_from([
        "settings-audit",
        "--server",
        "https://flag.example/v1",
        "--auth",
        "token",
        "--parallel",
        "2",
        "consistency-checks",
    ])
    .unwrap();
    let config = resolve_config(&cli, AuditConfig::default()).unwrap();
    assert_eq!(config.hub.server_url, "https://flag.example/v1");
    assert_eq!(config.hub.auth.as_deref(), Some("token"));
    assert_eq!(config.audit.parallel_requests, 2);
}

#[test]
fn refresh_credentials_are_used_only_for_refresh() {
    let cli = Cli::try_parse_from([
        "settings-audit",
        "refresh-signature",
        "--auth",
        "reader:pass",
        "--refresh-auth",
        "signer:secret",
    ])
    .unwrap();
    let config = resolve_config(&cli, AuditConfig::default()).unwrap();
    assert_eq!(config.hub.auth.as_deref(), Some("reader:pass"));
    assert_eq!(config.hub.refresh_auth.as_deref(), Some("signer:secret"));
    assert_ne!(config.refresh_hub_config().unwrap().auth, config.hub_config().unwrap().auth);
}

#[test]
fn absent_flags_keep_loaded_values() {
    let cli = Cli::try_parse_from(["settings-audit", "validate-signature"]).unwrap();
    let loaded = AuditConfig::default();
    let config = resolve_config(&cli, loaded.clone()).unwrap();
    assert_eq!(config, loaded);
}

#[test]
fn invalid_override_is_rejected() {
    let cli = Cli::try_parse_from(["settings-audit", "--parallel", "0", "refresh-signature"]).unwrap();
    let err = resolve_config(&cli, AuditConfig::default()).unwrap_err();
    assert!(matches!(err, CliError::Config(_)));
}
