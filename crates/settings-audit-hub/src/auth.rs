// crates/settings-audit-hub/src/auth.rs
// ============================================================================
// Module: Hub Credentials
// Description: Basic or bearer credentials for hub requests.
// Purpose: Parse the `user:password` / token credential string.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! A credential string containing `:` is split once into user and password
//! for HTTP Basic authentication; anything else is sent as a bearer token.
//! Secrets never appear in `Debug` output.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while parsing credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The credential string is empty.
    #[error("credentials must not be empty")]
    Empty,
}

/// Credentials attached to hub requests.
#[derive(Clone, PartialEq, Eq)]
pub enum HubAuth {
    /// HTTP Basic authentication.
    Basic {
        /// User name.
        user: String,
        /// Password.
        password: String,
    },
    /// Bearer token authentication.
    Bearer(String),
}

impl FromStr for HubAuth {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AuthError::Empty);
        }
        Ok(match value.split_once(':') {
            Some((user, password)) => Self::Basic {
                user: user.to_string(),
                password: password.to_string(),
            },
            None => Self::Bearer(value.to_string()),
        })
    }
}

impl fmt::Debug for HubAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic {
                user, ..
            } => f.debug_struct("Basic").field("user", user).field("password", &"<redacted>").finish(),
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}
