// crates/settings-audit-config/src/config.rs
// ============================================================================
// Module: Settings Audit Configuration
// Description: Configuration loading, environment overrides, and validation.
// Purpose: Provide strict, fail-closed config parsing for the audit CLI.
// Dependencies: settings-audit-core, settings-audit-hub, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then the scheduler environment variables (`SERVER`, `AUTH`,
//! `REFRESH_SIGNATURE_AUTH`, `PARALLEL_REQUESTS`, `REQUESTS_TIMEOUT_SECONDS`,
//! `REQUESTS_NB_RETRIES`).
//! CLI flags are applied last by the caller. Every layer is validated once
//! the merge is complete.
//!
//! The file is looked up from an explicit path, then `SETTINGS_AUDIT_CONFIG`,
//! then `settings-audit.toml` in the working directory. Only the implicit
//! default may be absent.
//!
//! Security posture: config inputs are untrusted; reads are size-limited and
//! credentials never appear in `Debug` output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use settings_audit_core::AuditSettings;
use settings_audit_core::core::settings::DEFAULT_PARALLEL_REQUESTS;
use settings_audit_core::core::settings::DEFAULT_REGISTRY_BUCKET;
use settings_audit_core::core::settings::DEFAULT_REGISTRY_COLLECTION;
use settings_audit_core::core::settings::DEFAULT_TRUST_SUFFIX;
use settings_audit_hub::DEFAULT_SERVER_URL;
use settings_audit_hub::HttpHubConfig;
use settings_audit_hub::HubAuth;
use settings_audit_hub::RetryPolicy;
use settings_audit_hub::http::DEFAULT_MAX_RESPONSE_BYTES;
use settings_audit_hub::http::DEFAULT_TIMEOUT_MS;
use settings_audit_hub::retry::DEFAULT_MAX_ATTEMPTS;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Limits and Defaults
// ============================================================================

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_NAME: &str = "settings-audit.toml";
/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "SETTINGS_AUDIT_CONFIG";
/// Maximum size of a config file in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total length of a config path.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound on the request timeout in milliseconds.
pub const MAX_TIMEOUT_MS: u64 = 300_000;
/// Upper bound on total attempts per request.
pub const MAX_ATTEMPTS_LIMIT: u32 = 16;
/// Upper bound on worker threads.
pub const MAX_PARALLEL_REQUESTS: usize = 64;
/// Lower bound on the response size limit in bytes.
const MIN_RESPONSE_BYTES: usize = 1024;

/// Environment variable overriding the hub URL.
pub const ENV_SERVER: &str = "SERVER";
/// Environment variable carrying hub credentials.
pub const ENV_AUTH: &str = "AUTH";
/// Environment variable carrying the credentials used to request re-signing.
pub const ENV_REFRESH_SIGNATURE_AUTH: &str = "REFRESH_SIGNATURE_AUTH";
/// Environment variable overriding the worker count.
pub const ENV_PARALLEL_REQUESTS: &str = "PARALLEL_REQUESTS";
/// Environment variable overriding the request timeout, in seconds.
pub const ENV_REQUESTS_TIMEOUT_SECONDS: &str = "REQUESTS_TIMEOUT_SECONDS";
/// Environment variable overriding total attempts per request.
pub const ENV_REQUESTS_NB_RETRIES: &str = "REQUESTS_NB_RETRIES";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// The config file is not valid TOML for this model.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A value failed validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Model
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Hub connection settings.
    pub hub: HubSection,
    /// Audit behavior settings.
    pub audit: AuditSection,
}

/// `[hub]` section.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubSection {
    /// Hub root URL including the API version prefix.
    pub server_url: String,
    /// `user:password` or bearer token.
    pub auth: Option<String>,
    /// Credentials for signature refresh; falls back to `auth` when unset.
    pub refresh_auth: Option<String>,
    /// Allow cleartext HTTP.
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Total attempts per request, first try included.
    pub max_attempts: u32,
    /// Maximum response body size in bytes.
    pub max_response_bytes: usize,
    /// Optional user agent override.
    pub user_agent: Option<String>,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            auth: None,
            refresh_auth: None,
            allow_http: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: None,
        }
    }
}

impl fmt::Debug for HubSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubSection")
            .field("server_url", &self.server_url)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .field("refresh_auth", &self.refresh_auth.as_ref().map(|_| "<redacted>"))
            .field("allow_http", &self.allow_http)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_attempts", &self.max_attempts)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// `[audit]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditSection {
    /// Bucket holding the registry collection.
    pub registry_bucket: String,
    /// Registry collection id.
    pub registry_collection: String,
    /// Worker threads for parallel hub reads.
    pub parallel_requests: usize,
    /// Required certificate common-name suffix.
    pub trust_suffix: String,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            registry_bucket: DEFAULT_REGISTRY_BUCKET.to_string(),
            registry_collection: DEFAULT_REGISTRY_COLLECTION.to_string(),
            parallel_requests: DEFAULT_PARALLEL_REQUESTS,
            trust_suffix: DEFAULT_TRUST_SUFFIX.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl AuditConfig {
    /// Loads configuration from disk and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or when
    /// the merged configuration fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |name| env::var(name).ok())
    }

    /// Loads configuration using `lookup` in place of the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or when
    /// the merged configuration fails validation.
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match resolve_path(path, &lookup)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a config file without applying overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for unreadable or oversized files and
    /// [`ConfigError::Parse`] for malformed content.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Io("config file exceeds size limit".to_string()));
        }
        let content =
            std::str::from_utf8(&bytes).map_err(|_| ConfigError::Parse("config must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text does not match the model.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies the scheduler environment variables over the current values.
    ///
    /// An empty `AUTH` or `REFRESH_SIGNATURE_AUTH` clears the matching
    /// credentials; other empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a numeric variable does not parse.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server) = non_empty(lookup(ENV_SERVER)) {
            self.hub.server_url = server;
        }
        if let Some(auth) = lookup(ENV_AUTH) {
            self.hub.auth = non_empty(Some(auth));
        }
        if let Some(auth) = lookup(ENV_REFRESH_SIGNATURE_AUTH) {
            self.hub.refresh_auth = non_empty(Some(auth));
        }
        if let Some(value) = non_empty(lookup(ENV_PARALLEL_REQUESTS)) {
            self.audit.parallel_requests = parse_env(ENV_PARALLEL_REQUESTS, &value)?;
        }
        if let Some(value) = non_empty(lookup(ENV_REQUESTS_TIMEOUT_SECONDS)) {
            self.hub.timeout_ms = parse_timeout_seconds(&value)?;
        }
        if let Some(value) = non_empty(lookup(ENV_REQUESTS_NB_RETRIES)) {
            self.hub.max_attempts = parse_env(ENV_REQUESTS_NB_RETRIES, &value)?;
        }
        Ok(())
    }

    /// Validates the merged configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hub.validate()?;
        self.audit.validate()
    }

    /// Builds the HTTP hub client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the credentials cannot be parsed.
    pub fn hub_config(&self) -> Result<HttpHubConfig, ConfigError> {
        self.client_config("hub.auth", self.hub.auth.as_deref())
    }

    /// Builds the HTTP hub client configuration for signature refresh.
    ///
    /// Uses `hub.refresh_auth` when set and `hub.auth` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the credentials cannot be parsed.
    pub fn refresh_hub_config(&self) -> Result<HttpHubConfig, ConfigError> {
        match self.hub.refresh_auth.as_deref() {
            Some(auth) => self.client_config("hub.refresh_auth", Some(auth)),
            None => self.hub_config(),
        }
    }

    /// Builds a client configuration carrying `credentials`.
    fn client_config(&self, field: &str, credentials: Option<&str>) -> Result<HttpHubConfig, ConfigError> {
        let auth = credentials
            .map(str::parse::<HubAuth>)
            .transpose()
            .map_err(|err| ConfigError::Invalid(format!("{field}: {err}")))?;
        let defaults = HttpHubConfig::default();
        Ok(HttpHubConfig {
            server_url: self.hub.server_url.clone(),
            allow_http: self.hub.allow_http,
            timeout_ms: self.hub.timeout_ms,
            max_response_bytes: self.hub.max_response_bytes,
            user_agent: self.hub.user_agent.clone().unwrap_or(defaults.user_agent),
            retry: RetryPolicy::with_attempts(self.hub.max_attempts),
            auth,
        })
    }

    /// Returns the settings consumed by the audit runtimes.
    #[must_use]
    pub fn audit_settings(&self) -> AuditSettings {
        AuditSettings {
            registry_bucket: self.audit.registry_bucket.clone(),
            registry_collection: self.audit.registry_collection.clone(),
            parallel_requests: self.audit.parallel_requests,
            trust_suffix: self.audit.trust_suffix.clone(),
        }
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

impl HubSection {
    /// Validates hub connection settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.server_url)
            .map_err(|err| ConfigError::Invalid(format!("hub.server_url: {err}")))?;
        match url.scheme() {
            "https" => {}
            "http" if self.allow_http => {}
            "http" => {
                return Err(ConfigError::Invalid(
                    "hub.server_url uses http but hub.allow_http is false".to_string(),
                ));
            }
            other => {
                return Err(ConfigError::Invalid(format!("hub.server_url scheme {other} is not supported")));
            }
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(ConfigError::Invalid("hub.server_url must not embed credentials".to_string()));
        }
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "hub.timeout_ms must be between 1 and {MAX_TIMEOUT_MS}"
            )));
        }
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "hub.max_attempts must be between 1 and {MAX_ATTEMPTS_LIMIT}"
            )));
        }
        if self.max_response_bytes < MIN_RESPONSE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "hub.max_response_bytes must be at least {MIN_RESPONSE_BYTES}"
            )));
        }
        if let Some(auth) = &self.auth {
            auth.parse::<HubAuth>().map_err(|err| ConfigError::Invalid(format!("hub.auth: {err}")))?;
        }
        if let Some(auth) = &self.refresh_auth {
            auth.parse::<HubAuth>()
                .map_err(|err| ConfigError::Invalid(format!("hub.refresh_auth: {err}")))?;
        }
        if self.user_agent.as_deref().is_some_and(|agent| agent.trim().is_empty()) {
            return Err(ConfigError::Invalid("hub.user_agent must be non-empty".to_string()));
        }
        Ok(())
    }
}

impl AuditSection {
    /// Validates audit behavior settings.
    fn validate(&self) -> Result<(), ConfigError> {
        require_identifier("audit.registry_bucket", &self.registry_bucket)?;
        require_identifier("audit.registry_collection", &self.registry_collection)?;
        if self.parallel_requests == 0 || self.parallel_requests > MAX_PARALLEL_REQUESTS {
            return Err(ConfigError::Invalid(format!(
                "audit.parallel_requests must be between 1 and {MAX_PARALLEL_REQUESTS}"
            )));
        }
        if self.trust_suffix.trim().is_empty() {
            return Err(ConfigError::Invalid("audit.trust_suffix must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Rejects empty ids and ids that would break URL path segments.
fn require_identifier(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.contains('/') {
        return Err(ConfigError::Invalid(format!("{field} must not contain '/'")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path; `None` means run on defaults.
fn resolve_path<F>(path: Option<&Path>, lookup: &F) -> Result<Option<PathBuf>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = path {
        return Ok(Some(path.to_path_buf()));
    }
    if let Some(env_path) = non_empty(lookup(CONFIG_ENV_VAR)) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(Some(PathBuf::from(env_path)));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_NAME);
    match fs::metadata(&default) {
        Ok(_) => Ok(Some(default)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ConfigError::Io(err.to_string())),
    }
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Trims a value and drops it when blank.
fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

/// Parses a numeric environment variable.
fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid(format!("{name} must be a non-negative integer, got {value:?}")))
}

/// Converts fractional seconds to whole milliseconds.
fn parse_timeout_seconds(value: &str) -> Result<u64, ConfigError> {
    let invalid =
        || ConfigError::Invalid(format!("{ENV_REQUESTS_TIMEOUT_SECONDS} must be a positive number, got {value:?}"));
    let seconds: f64 = value.parse().map_err(|_| invalid())?;
    let duration = Duration::try_from_secs_f64(seconds).map_err(|_| invalid())?;
    u64::try_from(duration.as_millis()).map_err(|_| invalid())
}
