//! Inbound bearer-token guard for non-public routes

use crate::config::Config;
use crate::error::{ProxyError, Result};
use actix_web::HttpRequest;

/// Check the inbound `Authorization: Bearer` header against the configured
/// `api_token`. A missing `api_token` configuration disables the guard.
pub fn require_api_token(req: &HttpRequest, config: &Config) -> Result<()> {
    let Some(expected) = config.api_token.as_deref() else {
        return Ok(());
    };

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ProxyError::auth("Missing Authorization header"))?;

    match header.strip_prefix("Bearer ") {
        Some(token) if token == expected => Ok(()),
        Some(_) => Err(ProxyError::auth("Invalid API token")),
        None => Err(ProxyError::auth("Authorization header must be a Bearer token")),
    }
}

/// Session id extracted from the `X-Session-Id` header, if any
pub fn session_id(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("X-Session-Id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
