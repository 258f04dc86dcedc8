//! HTTP surface: REST handlers and server assembly

pub mod handlers;
pub mod server;

pub use server::{configure, AppState, HttpApiServer};
