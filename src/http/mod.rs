//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, /health)
//!     → request.rs (request ID, declared origin)
//!     → handler.rs (method check, /version, resolve, cache)
//!     → forwarder.rs (sanitize, send, buffer)
//!     → response.rs (replayable response)
//!     → Send to client
//! ```

pub mod forwarder;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;
pub mod status;

pub use forwarder::{ForwardRequest, RequestForwarder};
pub use handler::ProxyHandler;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::ProxyResponse;
pub use server::HttpServer;
