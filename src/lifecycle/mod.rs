//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Ctrl+C → broadcast → stop accepting → drain in-flight requests → exit
//!
//! Housekeeping (housekeeping.rs):
//!     every cache TTL → purge expired entries + idle rate-limit buckets
//! ```

pub mod housekeeping;
pub mod shutdown;

pub use housekeeping::Sweeper;
pub use shutdown::Shutdown;
