//! Error handling module

pub mod error;

pub use error::{ProxyError, Result};
