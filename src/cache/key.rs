//! Cache key derivation.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use axum::body::Bytes;
use axum::http::Method;

/// Identity of a cacheable request.
///
/// Equality compares all three fields in full, so distinct requests never
/// share an entry even when their digests collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: Method,
    target: String,
    body: Bytes,
}

impl CacheKey {
    pub fn new(method: &Method, target: impl Into<String>, body: &Bytes) -> Self {
        Self {
            method: method.clone(),
            target: target.into(),
            body: body.clone(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Short stable digest used in log lines.
    pub fn digest(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({} body bytes)", self.method, self.target, self.body.len())
    }
}
