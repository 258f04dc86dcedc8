//! Session-scoped OAuth credentials and the token store seam
//!
//! Credentials live for the process lifetime only. There is no expiry sweep:
//! an expired credential is detected reactively when the vendor rejects it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// An OAuth-derived credential held under a session identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token sent to the vendor
    pub access_token: String,
    /// Refresh token for the next exchange
    pub refresh_token: String,
    /// Moment the access token stops being valid
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
        }
    }

    /// Whether the access token has passed its expiry moment
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Key-value store for session credentials
///
/// A session id maps to at most one credential; last write wins. Session ids
/// are never reused, so concurrent exchanges cannot lose each other's writes.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Look up the credential for a session id
    async fn get(&self, session_id: &str) -> Option<Credential>;
    /// Store a credential under a session id
    async fn put(&self, session_id: &str, credential: Credential);
}

/// Process-lifetime in-memory token store; contents are lost on restart
#[derive(Default)]
pub struct InMemoryTokenStore {
    sessions: RwLock<HashMap<String, Credential>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self, session_id: &str) -> Option<Credential> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn put(&self, session_id: &str, credential: Credential) {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), credential);
    }
}
