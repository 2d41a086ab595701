//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP admission check)
//!     → [proxy handler]
//!     → headers.rs (strip Host/Content-Length/hop-by-hop, add X-Forwarded-*)
//!     → Backend
//!
//! Backend response:
//!     → headers.rs (strip framing headers before caching or replying)
//! ```
//!
//! # Design Decisions
//! - Never trust existing X-Forwarded-* from clients; they are replaced
//! - Rate limiter state shares the cache's locking discipline (one mutex)

pub mod headers;
pub mod rate_limit;
