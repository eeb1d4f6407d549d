//! Streamgate — reverse proxy for HLS media delivery.
//!
//! Fetches origin manifests and segments, rewrites every manifest reference
//! to route back through the proxy, carries per-resource upstream headers in
//! an opaque URL-safe token, and strips the disguise prefix some origins
//! prepend to binary segments.

pub mod config;
pub mod error;
pub mod headers;
pub mod metrics;
pub mod proxy;
pub mod server;
