//! Origin routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Origin / Referer header, path, query)
//!     → resolver.rs (normalize origin, look up backend base URL)
//!     → target.rs (join base URL with path and query)
//!     → Return: absolute target URL for the forwarder
//!
//! Resolver construction (at startup):
//!     RoutingConfig.origin_mapping
//!     → normalize keys to scheme://authority
//!     → Freeze as immutable BackendResolver
//! ```
//!
//! # Design Decisions
//! - Resolution never fails: unknown or missing origins use the default service
//! - Malformed origins are matched verbatim (permissive, logged)
//! - Immutable after construction (thread-safe without locks)

pub mod resolver;
pub mod target;

pub use resolver::{normalize_origin, BackendResolver};
pub use target::build_target_url;
