//! OAuth token issuers.
//!
//! - [`ErpTokenIssuer`]: client-credentials grant against the ERP
//! - [`MarketplaceTokenIssuer`]: refresh-token grant against the
//!   marketplace; the refresh token rotates on every exchange and the new
//!   one is kept for the next call
//!
//! Both post a form to `{base}/oauth/token` and expect
//! `{"access_token", "expires_in", "refresh_token"?}` back.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::info;
use zeroize::Zeroizing;

use restock_domain::{AccessToken, ClientCredentials, IssuedToken, RemoteSystem};
use restock_exec::{SyncError, SyncResult, TokenIssuer};

use crate::http::RestClient;

/// Token lifetime assumed when the endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

// =============================================================================
// Token Response
// =============================================================================

/// OAuth token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn issued_at(&self, now: DateTime<Utc>) -> IssuedToken {
        let ttl = self.expires_in.filter(|secs| *secs > 0).unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        IssuedToken {
            token: AccessToken::new(self.access_token.clone()),
            expires_at: now + Duration::seconds(ttl),
        }
    }
}

async fn request_token(
    rest: &RestClient,
    form: &[(&str, &str)],
) -> SyncResult<TokenResponse> {
    let url = rest.endpoint(&["oauth", "token"]).map_err(|e| e.classify(rest.system()))?;
    let request = rest.http().post(url).form(form);
    rest.send_json(request).await
}

// =============================================================================
// ERP Issuer
// =============================================================================

/// Client-credentials issuer for the ERP.
pub struct ErpTokenIssuer {
    rest: RestClient,
    credentials: ClientCredentials,
}

impl ErpTokenIssuer {
    /// Create an issuer for the ERP at `base_url`.
    pub fn new(base_url: &str, credentials: ClientCredentials) -> SyncResult<Self> {
        Ok(Self { rest: RestClient::new(RemoteSystem::Source, base_url)?, credentials })
    }
}

#[async_trait]
impl TokenIssuer for ErpTokenIssuer {
    fn system(&self) -> RemoteSystem {
        RemoteSystem::Source
    }

    async fn issue(&self) -> SyncResult<IssuedToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];
        let response = request_token(&self.rest, &form).await?;
        Ok(response.issued_at(Utc::now()))
    }
}

// =============================================================================
// Marketplace Issuer
// =============================================================================

/// Refresh-token issuer for the marketplace.
pub struct MarketplaceTokenIssuer {
    rest: RestClient,
    credentials: ClientCredentials,
    refresh_token: RwLock<Zeroizing<String>>,
}

impl MarketplaceTokenIssuer {
    /// Create an issuer seeded with an initial refresh token.
    pub fn new(
        base_url: &str,
        credentials: ClientCredentials,
        refresh_token: impl Into<String>,
    ) -> SyncResult<Self> {
        let refresh_token = refresh_token.into();
        if refresh_token.trim().is_empty() {
            return Err(SyncError::Config("Marketplace refresh token must not be blank".to_string()));
        }
        Ok(Self {
            rest: RestClient::new(RemoteSystem::Sink, base_url)?,
            credentials,
            refresh_token: RwLock::new(Zeroizing::new(refresh_token)),
        })
    }

    fn current_refresh_token(&self) -> Zeroizing<String> {
        self.refresh_token.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    fn rotate(&self, response: &TokenResponse) {
        if let Some(next) = response.refresh_token.as_deref().filter(|t| !t.trim().is_empty()) {
            *self.refresh_token.write().unwrap_or_else(|poisoned| poisoned.into_inner()) =
                Zeroizing::new(next.to_string());
            info!("Marketplace refresh token rotated");
        }
    }
}

#[async_trait]
impl TokenIssuer for MarketplaceTokenIssuer {
    fn system(&self) -> RemoteSystem {
        RemoteSystem::Sink
    }

    async fn issue(&self) -> SyncResult<IssuedToken> {
        let refresh_token = self.current_refresh_token();
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
        ];
        let response = request_token(&self.rest, &form).await?;
        self.rotate(&response);
        Ok(response.issued_at(Utc::now()))
    }
}

// =============================================================================
// Tests
// =============================================================================
