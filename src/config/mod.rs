//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → PROXY_* environment variables (env.rs)
//!     → validation.rs (semantic checks, all errors collected)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload path
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_from, ConfigError};
pub use schema::{
    CacheConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, RateLimitConfig,
    RoutingConfig, SecurityConfig, TimeoutConfig,
};
pub use validation::ValidationError;
