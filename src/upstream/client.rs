//! HTTP client for the vendor CRM API
//!
//! Builds requests against the subdomain-derived origin, attaches bearer
//! authorization, and normalizes responses into plain JSON values. Failures
//! surface as typed errors; nothing is retried.

use crate::auth::TokenStore;
use crate::config::Config;
use crate::error::{ProxyError, Result};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::query::append_query;

/// HTTP verbs accepted by the upstream client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl UpstreamMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamMethod::Get => "GET",
            UpstreamMethod::Post => "POST",
            UpstreamMethod::Patch => "PATCH",
            UpstreamMethod::Delete => "DELETE",
        }
    }
}

/// Client for the vendor CRM REST API
pub struct UpstreamClient {
    config: Arc<Config>,
    store: Arc<dyn TokenStore>,
    client: reqwest::Client,
    /// Overrides the subdomain-derived origin; used by tests
    origin_override: Option<String>,
}

impl UpstreamClient {
    pub fn new(config: Arc<Config>, store: Arc<dyn TokenStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.server.timeout))
            .danger_accept_invalid_certs(!config.crm.ssl_verify)
            .build()
            .map_err(|e| ProxyError::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            config,
            store,
            client,
            origin_override: None,
        })
    }

    /// Point the client at a different origin (test hook)
    pub fn with_origin(mut self, origin: String) -> Self {
        self.origin_override = Some(origin);
        self
    }

    fn origin(&self) -> String {
        self.origin_override
            .clone()
            .unwrap_or_else(|| self.config.crm.api_origin())
    }

    /// Resolve the bearer token for an upstream call
    ///
    /// Order: explicit override, then the session's stored credential, then
    /// the process-wide configured token.
    pub async fn resolve_token(
        &self,
        explicit: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<String> {
        if let Some(token) = explicit {
            return Ok(token.to_string());
        }
        if let Some(session) = session_id {
            if let Some(credential) = self.store.get(session).await {
                if credential.is_expired() {
                    warn!("Session {} credential is past expiry, using it anyway", session);
                }
                return Ok(credential.access_token);
            }
            return Err(ProxyError::auth(format!("Unknown session: {}", session)));
        }
        self.config
            .crm
            .access_token
            .clone()
            .ok_or_else(|| ProxyError::auth("No access token configured and no session given"))
    }

    /// Issue a request and normalize the response
    pub async fn request(
        &self,
        method: UpstreamMethod,
        path: &str,
        body: Option<&Value>,
        query: Option<&Map<String, Value>>,
        token: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<Value> {
        let token = self.resolve_token(token, session_id).await?;
        let url = append_query(&format!("{}{}", self.origin(), path), query);
        debug!("Upstream {} {}", method.as_str(), url);

        let mut builder = match method {
            UpstreamMethod::Get => self.client.get(&url),
            UpstreamMethod::Post => self.client.post(&url),
            UpstreamMethod::Patch => self.client.patch(&url),
            UpstreamMethod::Delete => self.client.delete(&url),
        };
        builder = builder.header("Authorization", format!("Bearer {}", token));
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProxyError::timeout(format!(
                    "Upstream call exceeded {}s: {} {}",
                    self.config.server.timeout,
                    method.as_str(),
                    path
                ))
            } else if e.is_connect() {
                ProxyError::unreachable(format!("Failed to reach upstream: {}", e))
            } else {
                ProxyError::Http(e)
            }
        })?;

        let status = response.status();
        let code = status.as_u16();

        // A DELETE acknowledged with 200/202/204 has no useful body
        if method == UpstreamMethod::Delete && matches!(code, 200 | 202 | 204) {
            return Ok(json!({"status": "deleted", "code": code}));
        }
        if code == 204 {
            return Ok(json!({"status": "no_content", "code": code}));
        }

        let text = response.text().await.map_err(ProxyError::Http)?;

        if code == 404 {
            return Err(ProxyError::not_found(if text.is_empty() {
                format!("{} {}", method.as_str(), path)
            } else {
                text
            }));
        }
        if code >= 400 {
            return Err(ProxyError::upstream(code, text));
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Ok(value),
            Err(_) => Ok(json!({"code": code, "text": text})),
        }
    }
}
