//! Upstream vendor API client

pub mod client;
pub mod query;

pub use client::{UpstreamClient, UpstreamMethod};
pub use query::{append_query, encode_key, encode_query};
