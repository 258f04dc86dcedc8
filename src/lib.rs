//! crmbridge: HTTP proxy and MCP tool server for a CRM vendor's REST API
//!
//! One upstream client, one entity gateway, and one parameter builder serve
//! three surfaces: a REST API, an OAuth session flow, and an MCP JSON-RPC
//! tool catalog over SSE/POST.

pub mod api;
pub mod auth;
pub mod config;
pub mod crm;
pub mod error;
pub mod mcp;
pub mod upstream;

pub use config::Config;
pub use error::{ProxyError, Result};

/// Crate version reported by `/health` and the MCP `initialize` handshake
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file path
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 8000;
