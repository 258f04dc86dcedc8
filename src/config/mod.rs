//! Configuration loading and environment integration

pub mod config;
pub mod environment;

pub use config::{Config, CrmConfig, EntityDefaults, LoggingConfig, OAuthConfig, ServerConfig};
pub use environment::EnvVars;
