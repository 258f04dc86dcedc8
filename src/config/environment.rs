//! Environment variable integration for the CRM proxy configuration

use crate::config::{Config, OAuthConfig};
use crate::error::{ProxyError, Result};
use std::env;
use tracing::debug;

/// Environment variable names recognized by the proxy
pub struct EnvVars;

impl EnvVars {
    pub const SUBDOMAIN: &'static str = "CRM_SUBDOMAIN";
    pub const DOMAIN: &'static str = "CRM_DOMAIN";
    pub const ACCESS_TOKEN: &'static str = "CRM_ACCESS_TOKEN";
    pub const SSL_VERIFY: &'static str = "CRM_SSL_VERIFY";
    pub const CLIENT_ID: &'static str = "CRM_CLIENT_ID";
    pub const CLIENT_SECRET: &'static str = "CRM_CLIENT_SECRET";
    pub const REDIRECT_URI: &'static str = "CRM_REDIRECT_URI";
    pub const API_TOKEN: &'static str = "API_TOKEN";
    pub const DEFAULT_PIPELINE_ID: &'static str = "CRM_DEFAULT_PIPELINE_ID";
    pub const DEFAULT_STATUS_ID: &'static str = "CRM_DEFAULT_STATUS_ID";
    pub const DEFAULT_RESPONSIBLE_USER_ID: &'static str = "CRM_DEFAULT_RESPONSIBLE_USER_ID";
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ProxyError::config(format!(
            "Invalid {}: {} (expected: true/false)",
            name, value
        ))),
    }
}

fn parse_id(name: &str, value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|_| ProxyError::config(format!("Invalid {}: {} (expected an id)", name, value)))
}

/// Apply environment variable overrides on top of the file configuration
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(v) = env::var(EnvVars::SUBDOMAIN) {
        debug!("Environment override: {}", EnvVars::SUBDOMAIN);
        config.crm.subdomain = v;
    }
    if let Ok(v) = env::var(EnvVars::DOMAIN) {
        debug!("Environment override: {}", EnvVars::DOMAIN);
        config.crm.domain = v;
    }
    if let Ok(v) = env::var(EnvVars::ACCESS_TOKEN) {
        debug!("Environment override: {}", EnvVars::ACCESS_TOKEN);
        config.crm.access_token = Some(v);
    }
    if let Ok(v) = env::var(EnvVars::SSL_VERIFY) {
        config.crm.ssl_verify = parse_bool(EnvVars::SSL_VERIFY, &v)?;
    }
    if let Ok(v) = env::var(EnvVars::API_TOKEN) {
        config.api_token = Some(v);
    }

    // OAuth block is created on demand when any of its variables are present
    let client_id = env::var(EnvVars::CLIENT_ID).ok();
    let client_secret = env::var(EnvVars::CLIENT_SECRET).ok();
    let redirect_uri = env::var(EnvVars::REDIRECT_URI).ok();
    if client_id.is_some() || client_secret.is_some() || redirect_uri.is_some() {
        let existing = config.oauth.take();
        let pick = |env_value: Option<String>, current: Option<String>| {
            env_value.or(current).unwrap_or_default()
        };
        config.oauth = Some(OAuthConfig {
            client_id: pick(client_id, existing.as_ref().map(|o| o.client_id.clone())),
            client_secret: pick(
                client_secret,
                existing.as_ref().map(|o| o.client_secret.clone()),
            ),
            redirect_uri: pick(
                redirect_uri,
                existing.as_ref().map(|o| o.redirect_uri.clone()),
            ),
        });
    }

    if let Ok(v) = env::var(EnvVars::DEFAULT_PIPELINE_ID) {
        config.defaults.pipeline_id = Some(parse_id(EnvVars::DEFAULT_PIPELINE_ID, &v)?);
    }
    if let Ok(v) = env::var(EnvVars::DEFAULT_STATUS_ID) {
        config.defaults.status_id = Some(parse_id(EnvVars::DEFAULT_STATUS_ID, &v)?);
    }
    if let Ok(v) = env::var(EnvVars::DEFAULT_RESPONSIBLE_USER_ID) {
        config.defaults.responsible_user_id =
            Some(parse_id(EnvVars::DEFAULT_RESPONSIBLE_USER_ID, &v)?);
    }

    Ok(())
}
