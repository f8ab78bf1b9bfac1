//! Transport layer for ea-bridge.
//!
//! Currently provides the HTTP control plane via axum.

pub mod http;

pub use http::{ServerConfig, serve};
