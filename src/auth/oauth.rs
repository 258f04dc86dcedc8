//! OAuth code/refresh exchange against the vendor's token endpoint

use crate::auth::credentials::{Credential, TokenStore};
use crate::config::{Config, OAuthConfig};
use crate::error::{ProxyError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

/// Token payload returned by the vendor on a successful exchange
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Outcome of an exchange: the minted session id and the credential's expiry
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionGrant {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

/// OAuth client for the vendor's `/oauth2/access_token` endpoint
pub struct OAuthClient {
    config: Arc<Config>,
    store: Arc<dyn TokenStore>,
    client: reqwest::Client,
    /// Overrides the subdomain-derived origin; used by tests
    token_origin: Option<String>,
}

impl OAuthClient {
    pub fn new(config: Arc<Config>, store: Arc<dyn TokenStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.server.timeout))
            .danger_accept_invalid_certs(!config.crm.ssl_verify)
            .build()
            .map_err(|e| ProxyError::config(format!("Failed to create OAuth client: {}", e)))?;
        Ok(Self {
            config,
            store,
            client,
            token_origin: None,
        })
    }

    /// Point the token endpoint at a different origin (test hook)
    pub fn with_token_origin(mut self, origin: String) -> Self {
        self.token_origin = Some(origin);
        self
    }

    fn oauth_config(&self) -> Result<&OAuthConfig> {
        self.config
            .oauth
            .as_ref()
            .ok_or_else(|| ProxyError::config("OAuth configuration missing"))
    }

    fn token_url(&self) -> String {
        let origin = self
            .token_origin
            .clone()
            .unwrap_or_else(|| self.config.crm.api_origin());
        format!("{}/oauth2/access_token", origin)
    }

    /// URL of the vendor's consent page for the configured integration
    pub fn authorize_url(&self, state: &str) -> Result<String> {
        let oauth = self.oauth_config()?;
        Ok(format!(
            "https://www.{}/oauth?client_id={}&state={}&mode=post_message",
            self.config.crm.domain,
            urlencoding::encode(&oauth.client_id),
            urlencoding::encode(state),
        ))
    }

    /// Exchange an authorization code for a credential
    pub async fn exchange_code(&self, code: &str) -> Result<SessionGrant> {
        let oauth = self.oauth_config()?;
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code".to_string());
        params.insert("code", code.to_string());
        params.insert("client_id", oauth.client_id.clone());
        params.insert("client_secret", oauth.client_secret.clone());
        params.insert("redirect_uri", oauth.redirect_uri.clone());
        self.exchange(params).await
    }

    /// Exchange a refresh token for a fresh credential
    pub async fn exchange_refresh(&self, refresh_token: &str) -> Result<SessionGrant> {
        let oauth = self.oauth_config()?;
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token".to_string());
        params.insert("refresh_token", refresh_token.to_string());
        params.insert("client_id", oauth.client_id.clone());
        params.insert("client_secret", oauth.client_secret.clone());
        params.insert("redirect_uri", oauth.redirect_uri.clone());
        self.exchange(params).await
    }

    async fn exchange(&self, params: HashMap<&str, String>) -> Result<SessionGrant> {
        let response = self
            .client
            .post(self.token_url())
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!("Token exchange request failed: {}", e);
                ProxyError::unreachable(format!("Token exchange request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Token exchange failed with status {}: {}", status, body);
            return Err(ProxyError::upstream(status.as_u16(), body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProxyError::auth(format!("Invalid token response: {}", e)))?;

        let credential = Credential::new(token.access_token, token.refresh_token, token.expires_in);
        let expires_at = credential.expires_at;

        // Session ids are opaque and never reused; the caller must hold onto
        // the id, it cannot be recovered from the access token.
        let session_id = Uuid::new_v4().to_string();
        self.store.put(&session_id, credential).await;
        info!("Token exchange succeeded, session {} created", session_id);

        Ok(SessionGrant {
            session_id,
            expires_at,
        })
    }
}
