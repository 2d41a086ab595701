//! Origin-routed forwarding proxy library

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::{ForwardError, ProxyError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
