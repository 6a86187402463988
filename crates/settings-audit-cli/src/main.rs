// crates/settings-audit-cli/src/main.rs
// ============================================================================
// Module: Settings Audit CLI Entry Point
// Description: Command dispatcher for the scheduled audit jobs.
// Purpose: Load configuration, connect to the hub, and run one audit.
// Dependencies: clap, settings-audit-config, settings-audit-core,
//               settings-audit-hub, thiserror, tracing, tracing-subscriber.
// ============================================================================

//! ## Overview
//! Each subcommand runs one audit against the configured hub and exits with
//! status 0 when everything checked out, 1 otherwise. Progress is logged to
//! stderr through `tracing`; the aggregate failure message is written to
//! stderr last so schedulers can surface it verbatim.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use settings_audit_config::AuditConfig;
use settings_audit_config::ConfigError;
use settings_audit_core::AuditError;
use settings_audit_core::run_changes_validation;
use settings_audit_core::run_consistency_audit;
use settings_audit_core::run_signature_audit;
use settings_audit_core::run_signature_refresh;
use settings_audit_hub::HttpHubClient;
use settings_audit_hub::HubClientError;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "settings-audit", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (overrides `SETTINGS_AUDIT_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Hub root URL (overrides `SERVER`).
    #[arg(long, value_name = "URL", global = true)]
    server: Option<String>,
    /// `user:password` or bearer token (overrides `AUTH`).
    #[arg(long, value_name = "CREDENTIALS", global = true)]
    auth: Option<String>,
    /// Credentials for `refresh-signature` (overrides `REFRESH_SIGNATURE_AUTH`).
    #[arg(long, value_name = "CREDENTIALS", global = true)]
    refresh_auth: Option<String>,
    /// Worker threads for parallel reads (overrides `PARALLEL_REQUESTS`).
    #[arg(long, value_name = "N", global = true)]
    parallel: Option<usize>,
    /// Audit to run.
    #[command(subcommand)]
    command: Commands,
}

/// Supported audits.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Verify the content signature of every published collection.
    ValidateSignature,
    /// Compare source, preview, and destination collections.
    ConsistencyChecks,
    /// Check registry timestamps against each collection.
    ValidateChanges,
    /// Ask the signer to re-sign every source collection.
    RefreshSignature,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors that end a CLI run.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The hub client could not be built.
    #[error(transparent)]
    Client(#[from] HubClientError),
    /// The audit ran and reported failures, or could not start.
    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Loads configuration and dispatches the selected audit.
fn run(cli: &Cli) -> CliResult<()> {
    let config = resolve_config(cli, AuditConfig::load(cli.config.as_deref())?)?;
    let hub_config = match cli.command {
        Commands::RefreshSignature => config.refresh_hub_config()?,
        Commands::ValidateSignature | Commands::ConsistencyChecks | Commands::ValidateChanges => {
            config.hub_config()?
        }
    };
    let hub = HttpHubClient::new(hub_config)?;
    let settings = config.audit_settings();
    info!(
        command = ?cli.command,
        server = %config.hub.server_url,
        parallel_requests = settings.parallel_requests,
        "starting audit"
    );
    match cli.command {
        Commands::ValidateSignature => {
            let report = run_signature_audit(&hub, &hub, &settings)?;
            info!(collections = report.outcomes.len(), "all signatures verified");
        }
        Commands::ConsistencyChecks => {
            let report = run_consistency_audit(&hub, &settings)?;
            info!(collections = report.outcomes.len(), "all collections consistent");
        }
        Commands::ValidateChanges => {
            let report = run_changes_validation(&hub, &settings)?;
            info!(entries = report.checked, "registry timestamps up to date");
        }
        Commands::RefreshSignature => {
            let report = run_signature_refresh(&hub, &settings)?;
            info!(
                refreshed = report.refreshed.len(),
                skipped = report.skipped.len(),
                "signature refresh requested"
            );
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Applies command-line overrides over loaded configuration and revalidates.
fn resolve_config(cli: &Cli, mut config: AuditConfig) -> CliResult<AuditConfig> {
    if let Some(server) = &cli.server {
        config.hub.server_url.clone_from(server);
    }
    if let Some(auth) = &cli.auth {
        config.hub.auth = Some(auth.clone()).filter(|auth| !auth.trim().is_empty());
    }
    if let Some(auth) = &cli.refresh_auth {
        config.hub.refresh_auth = Some(auth.clone()).filter(|auth| !auth.trim().is_empty());
    }
    if let Some(parallel) = cli.parallel {
        config.audit.parallel_requests = parallel;
    }
    config.validate()?;
    Ok(config)
}

/// Installs the stderr log subscriber; `RUST_LOG` overrides the `info` default.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
