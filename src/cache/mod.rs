//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! GET request with resolved target URL
//!     → key.rs (derive CacheKey from method, target URL, body)
//!     → store.rs (lookup; expired entries are misses)
//!     → on miss, forwarder response (200 only)
//!     → store.rs (insert; evict oldest when full)
//!
//! Background:
//!     sweeper task → store.rs purge_expired()
//! ```
//!
//! # Design Decisions
//! - Single mutex around the map; never held across an await
//! - Homogeneous TTL, so insertion order equals expiry order
//! - Time comes from an injected Clock so tests control expiry

pub mod clock;
pub mod key;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::CacheKey;
pub use store::ResponseCache;
