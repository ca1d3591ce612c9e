//! Remote System Credentials
//!
//! Bearer tokens and client secrets used against the ERP and the
//! marketplace.
//!
//! # Security Model
//!
//! - Secrets live in memory only and are never serialized
//! - Secrets are zeroized on drop
//! - `Debug` output is redacted

use chrono::{DateTime, Utc};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

// =============================================================================
// Remote System
// =============================================================================

/// The two systems the engine talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteSystem {
    /// ERP, the system of record
    Source,
    /// Marketplace
    Sink,
}

impl RemoteSystem {
    /// Get the system name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteSystem::Source => "source",
            RemoteSystem::Sink => "sink",
        }
    }
}

impl fmt::Display for RemoteSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Access Token
// =============================================================================

/// Bearer token presented on every remote call.
#[derive(Clone)]
pub struct AccessToken(Zeroizing<String>);

impl AccessToken {
    /// Wrap a raw bearer token.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Expose the secret (for building the Authorization header only).
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Token as handed out by an issuer, with its absolute expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The bearer token
    pub token: AccessToken,
    /// Absolute expiry reported by the issuer
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Check if the token is still usable at `now`, keeping `skew` in reserve.
    pub fn is_valid_at(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        now + skew < self.expires_at
    }
}

// =============================================================================
// Client Credentials
// =============================================================================

/// OAuth client credentials (in-memory only, never persisted).
pub struct ClientCredentials {
    /// Client ID (public identifier)
    pub client_id: String,
    /// Client secret
    pub client_secret: Zeroizing<String>,
}

impl ClientCredentials {
    /// Create new client credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Zeroizing::new(client_secret.into()),
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl Zeroize for ClientCredentials {
    fn zeroize(&mut self) {
        self.client_id.zeroize();
        self.client_secret.zeroize();
    }
}

impl Drop for ClientCredentials {
    fn drop(&mut self) {
        self.zeroize();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("APP_USR-secret");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("secret"));
        assert_eq!(token.expose(), "APP_USR-secret");
    }

    #[test]
    fn test_client_credentials_debug_is_redacted() {
        let creds = ClientCredentials::new("client-1", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("client-1"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_client_credentials_zeroize() {
        let mut creds = ClientCredentials::new("client-1", "hunter2");
        creds.zeroize();
        assert!(creds.client_id.is_empty());
        assert!(creds.client_secret.is_empty());
    }

    #[test]
    fn test_issued_token_validity_with_skew() {
        let now = Utc::now();
        let issued = IssuedToken {
            token: AccessToken::new("t"),
            expires_at: now + chrono::Duration::seconds(120),
        };

        assert!(issued.is_valid_at(now, chrono::Duration::seconds(60)));
        assert!(!issued.is_valid_at(now + chrono::Duration::seconds(61), chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_remote_system_display() {
        assert_eq!(RemoteSystem::Source.to_string(), "source");
        assert_eq!(RemoteSystem::Sink.to_string(), "sink");
    }
}
