//! Authentication: session credentials, OAuth exchange, inbound guard

pub mod credentials;
pub mod guard;
pub mod oauth;

pub use credentials::{Credential, InMemoryTokenStore, TokenStore};
pub use guard::{require_api_token, session_id};
pub use oauth::{OAuthClient, SessionGrant, TokenResponse};
