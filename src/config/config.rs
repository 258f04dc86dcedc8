//! Configuration management for the CRM proxy

use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_host() -> String {
    crate::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    crate::DEFAULT_PORT
}

fn default_timeout() -> u64 {
    30
}

fn default_domain() -> String {
    "kommo.com".to_string()
}

fn default_ssl_verify() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Vendor CRM configuration
    pub crm: CrmConfig,
    /// OAuth configuration (optional; long-lived token works without it)
    pub oauth: Option<OAuthConfig>,
    /// Inbound bearer token required on non-public routes (optional)
    pub api_token: Option<String>,
    /// Create-time fallback values
    #[serde(default)]
    pub defaults: EntityDefaults,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upstream request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout: default_timeout(),
        }
    }
}

/// Vendor CRM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// Account subdomain, e.g. "mycompany" for mycompany.kommo.com
    #[serde(default)]
    pub subdomain: String,
    /// Vendor domain the subdomain belongs to
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Long-lived access token configured at process start
    pub access_token: Option<String>,
    /// Verify the vendor's TLS certificate
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,
}

impl CrmConfig {
    /// Origin of the vendor API derived from the configured subdomain
    pub fn api_origin(&self) -> String {
        format!("https://{}.{}", self.subdomain, self.domain)
    }
}

/// OAuth client configuration for the vendor's code/refresh exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// OAuth integration client id
    pub client_id: String,
    /// OAuth integration client secret
    pub client_secret: String,
    /// Redirect URI registered with the vendor
    pub redirect_uri: String,
}

/// Fallback ids injected into lead creation when the caller omits them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityDefaults {
    /// Default pipeline for new leads
    pub pipeline_id: Option<i64>,
    /// Default status for new leads
    pub status_id: Option<i64>,
    /// Default responsible user for new records
    pub responsible_user_id: Option<i64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format ("text" or "json")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file, then apply environment
    /// overrides and CLI host/port overrides, then validate.
    pub fn load(
        path: Option<&Path>,
        host_override: Option<String>,
        port_override: Option<u16>,
    ) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    ProxyError::config(format!(
                        "Failed to read config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                serde_yaml::from_str(&content)?
            }
            _ => Self::empty(),
        };

        super::environment::apply_env_overrides(&mut config)?;

        if let Some(host) = host_override {
            config.server.host = host;
        }
        if let Some(port) = port_override {
            config.server.port = port;
        }

        config.validate()?;
        Ok(config)
    }

    /// A configuration with nothing set; environment variables must fill it in
    pub fn empty() -> Self {
        Self {
            server: ServerConfig::default(),
            crm: CrmConfig {
                subdomain: String::new(),
                domain: default_domain(),
                access_token: None,
                ssl_verify: true,
            },
            oauth: None,
            api_token: None,
            defaults: EntityDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.crm.subdomain.trim().is_empty() {
            return Err(ProxyError::config(
                "crm.subdomain is required (or set CRM_SUBDOMAIN)",
            ));
        }
        if self.server.port == 0 {
            return Err(ProxyError::config("server.port must be non-zero"));
        }
        if self.server.timeout == 0 {
            return Err(ProxyError::config("server.timeout must be non-zero"));
        }
        if let Some(oauth) = &self.oauth {
            if oauth.client_id.is_empty() || oauth.client_secret.is_empty() {
                return Err(ProxyError::config(
                    "oauth.client_id and oauth.client_secret must both be set",
                ));
            }
        }
        Ok(())
    }
}
