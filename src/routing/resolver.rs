//! Origin to backend resolution.
//!
//! # Responsibilities
//! - Normalize an `Origin`/`Referer` value to `scheme://authority`
//! - Look up the normalized origin in the configured mapping
//! - Fall back to the default service on absence or miss

use std::borrow::Cow;
use std::collections::HashMap;

use url::Url;

use crate::config::RoutingConfig;

/// Reduce an origin-like header value to `scheme://host[:port]`.
///
/// Values without a scheme separator are returned untouched. Values that have
/// one but no usable authority are also returned untouched, with a warning.
pub fn normalize_origin(raw: &str) -> Cow<'_, str> {
    let raw = raw.trim();
    if !raw.contains("://") {
        return Cow::Borrowed(raw);
    }

    match Url::parse(raw) {
        Ok(url) => match url.host_str().filter(|host| !host.is_empty()) {
            Some(host) => {
                let mut origin = format!("{}://{}", url.scheme(), host);
                if let Some(port) = url.port() {
                    origin.push(':');
                    origin.push_str(&port.to_string());
                }
                Cow::Owned(origin)
            }
            None => {
                tracing::warn!(origin = %raw, "Origin has no authority, matching raw value");
                Cow::Borrowed(raw)
            }
        },
        Err(e) => {
            tracing::warn!(origin = %raw, error = %e, "Malformed origin, matching raw value");
            Cow::Borrowed(raw)
        }
    }
}

/// Maps a request's declared origin to a backend base URL.
#[derive(Debug, Clone)]
pub struct BackendResolver {
    mapping: HashMap<String, String>,
    default_service: String,
}

impl BackendResolver {
    /// Build a resolver. Mapping keys are normalized the same way header
    /// values are, so `https://Example.com/` and `https://example.com` collide.
    pub fn new<I>(mapping: I, default_service: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mapping = mapping
            .into_iter()
            .map(|(origin, backend)| (normalize_origin(&origin).into_owned(), backend))
            .collect();

        Self {
            mapping,
            default_service: default_service.into(),
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(
            config
                .origin_mapping
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
            config.default_service.clone(),
        )
    }

    /// Resolve the backend base URL for an optional origin header.
    pub fn resolve(&self, origin: Option<&str>) -> &str {
        let Some(origin) = origin else {
            return &self.default_service;
        };

        let key = normalize_origin(origin);
        match self.mapping.get(key.as_ref()) {
            Some(backend) => backend,
            None => {
                tracing::debug!(origin = %key, "Origin not mapped, using default service");
                &self.default_service
            }
        }
    }

    pub fn default_service(&self) -> &str {
        &self.default_service
    }

    /// Number of mapped origins.
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> BackendResolver {
        BackendResolver::new(
            [
                (
                    "https://residorg3.residorg.eu".to_string(),
                    "http://atf-service3:8000".to_string(),
                ),
                (
                    "http://localhost:3000".to_string(),
                    "http://dev-backend:9000".to_string(),
                ),
                ("null".to_string(), "http://sandboxed:7000".to_string()),
            ],
            "http://default:8000",
        )
    }

    #[test]
    fn test_missing_origin_uses_default() {
        assert_eq!(resolver().resolve(None), "http://default:8000");
    }

    #[test]
    fn test_mapped_origin() {
        let r = resolver();
        assert_eq!(
            r.resolve(Some("https://residorg3.residorg.eu")),
            "http://atf-service3:8000"
        );
        assert_eq!(r.resolve(Some("http://localhost:3000")), "http://dev-backend:9000");
    }

    #[test]
    fn test_referer_path_and_query_are_stripped() {
        let r = resolver();
        assert_eq!(
            r.resolve(Some("https://residorg3.residorg.eu/app/page?x=1#top")),
            "http://atf-service3:8000"
        );
        assert_eq!(r.resolve(Some("https://RESIDORG3.residorg.eu/")), "http://atf-service3:8000");
    }

    #[test]
    fn test_unmapped_origin_uses_default() {
        let r = resolver();
        assert_eq!(r.resolve(Some("https://evil.example.com")), "http://default:8000");
        // Port is part of the authority.
        assert_eq!(r.resolve(Some("http://localhost:3001")), "http://default:8000");
    }

    #[test]
    fn test_value_without_scheme_matches_raw() {
        assert_eq!(resolver().resolve(Some("null")), "http://sandboxed:7000");
    }

    #[test]
    fn test_malformed_origin_falls_back_to_raw() {
        assert_eq!(normalize_origin("https://"), "https://");
        assert_eq!(normalize_origin("file:///etc/passwd"), "file:///etc/passwd");
        assert_eq!(resolver().resolve(Some("https://")), "http://default:8000");

        let r = BackendResolver::new(
            [("https://".to_string(), "http://odd:1".to_string())],
            "http://default:8000",
        );
        assert_eq!(r.resolve(Some("https://")), "http://odd:1");
    }

    #[test]
    fn test_normalize_keeps_explicit_port() {
        assert_eq!(normalize_origin("http://example.com:8080/a"), "http://example.com:8080");
        assert_eq!(normalize_origin("https://example.com:443/a"), "https://example.com");
        assert_eq!(normalize_origin("http://[::1]:3000"), "http://[::1]:3000");
    }

    #[test]
    fn test_mapping_keys_are_normalized() {
        let r = BackendResolver::new(
            [("https://Example.com/".to_string(), "http://b:1".to_string())],
            "http://default:8000",
        );
        assert_eq!(r.len(), 1);
        assert_eq!(r.resolve(Some("https://example.com")), "http://b:1");
    }
}
