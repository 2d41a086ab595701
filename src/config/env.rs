//! Environment overlay.
//!
//! `PROXY_ORIGIN_<NAME>=<origin>=<backend>` adds one origin mapping; the other
//! `PROXY_*` variables override single settings.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::config::loader::ConfigError;
use crate::config::schema::ProxyConfig;

pub const ENV_PREFIX: &str = "PROXY_";
pub const ORIGIN_PREFIX: &str = "PROXY_ORIGIN_";

fn parse_var<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        reason: format!("invalid value {:?}: {}", value, e),
    })
}

fn parse_origin_entry(var: &str, value: &str) -> Result<(String, String), ConfigError> {
    match value.split_once('=') {
        Some((origin, backend)) if !origin.trim().is_empty() && !backend.trim().is_empty() => {
            Ok((origin.trim().to_string(), backend.trim().to_string()))
        }
        _ => Err(ConfigError::Env {
            var: var.to_string(),
            reason: format!("expected <origin>=<backend>, got {:?}", value),
        }),
    }
}

/// Overlay `PROXY_*` variables onto `config`. Other variables are ignored.
///
/// Variables are applied in name order so duplicate origins resolve the same
/// way on every start.
pub fn apply_env_overrides<I>(config: &mut ProxyConfig, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: BTreeMap<String, String> = vars
        .into_iter()
        .filter(|(name, _)| name.starts_with(ENV_PREFIX))
        .collect();

    for (var, value) in &vars {
        if var.starts_with(ORIGIN_PREFIX) {
            let (origin, backend) = parse_origin_entry(var, value)?;
            config.routing.origin_mapping.insert(origin, backend);
            continue;
        }

        match var.as_str() {
            "PROXY_DEFAULT_SERVICE" => config.routing.default_service = value.trim().to_string(),
            "PROXY_HOST" => config.listener.host = value.trim().to_string(),
            "PROXY_PORT" => config.listener.port = parse_var(var, value)?,
            "PROXY_TIMEOUT_SECS" => config.timeouts.request_secs = parse_var(var, value)?,
            "PROXY_ALLOWED_METHODS" => {
                config.routing.allowed_methods = value
                    .split(',')
                    .map(|m| m.trim().to_ascii_uppercase())
                    .filter(|m| !m.is_empty())
                    .collect();
            }
            "PROXY_CACHE_ENABLED" => config.cache.enabled = parse_var(var, value)?,
            "PROXY_CACHE_TTL" => config.cache.ttl_secs = parse_var(var, value)?,
            "PROXY_MAX_CACHE_SIZE" => config.cache.max_entries = parse_var(var, value)?,
            "PROXY_RATE_LIMIT" => match value.trim().to_ascii_lowercase().as_str() {
                "" | "off" | "none" | "disabled" => config.rate_limit.enabled = false,
                _ => {
                    config.rate_limit.enabled = true;
                    config.rate_limit.limit = value.trim().to_string();
                }
            },
            "PROXY_LOG_LEVEL" => config.observability.log_level = value.trim().to_string(),
            "PROXY_LOG_FILE" => {
                config.observability.log_file =
                    Some(value.trim()).filter(|v| !v.is_empty()).map(str::to_string);
            }
            "PROXY_METRICS_ADDRESS" => {
                config.observability.metrics_enabled = true;
                config.observability.metrics_address = value.trim().to_string();
            }
            "PROXY_MAX_BODY_SIZE" => config.security.max_body_size = parse_var(var, value)?,
            // PROXY_CONFIG is read by the CLI.
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_origin_entries_add_mappings() {
        let mut config = ProxyConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PROXY_ORIGIN_RESIDORG3", "https://residorg3.residorg.eu=http://atf-service3:8000"),
                ("PROXY_ORIGIN_LOCAL", " http://localhost:3000 = http://dev:9000 "),
                ("HOME", "/root"),
            ]),
        )
        .unwrap();

        let mapping = &config.routing.origin_mapping;
        assert_eq!(mapping["https://residorg3.residorg.eu"], "http://atf-service3:8000");
        assert_eq!(mapping["http://localhost:3000"], "http://dev:9000");
    }

    #[test]
    fn test_env_overrides_file_mapping() {
        let mut config = ProxyConfig::default();
        config
            .routing
            .origin_mapping
            .insert("https://a.example.com".into(), "http://from-file:1".into());

        apply_env_overrides(
            &mut config,
            env(&[("PROXY_ORIGIN_A", "https://a.example.com=http://from-env:2")]),
        )
        .unwrap();

        assert_eq!(config.routing.origin_mapping["https://a.example.com"], "http://from-env:2");
    }

    #[test]
    fn test_dedicated_variables() {
        let mut config = ProxyConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PROXY_DEFAULT_SERVICE", "http://fallback:8000"),
                ("PROXY_HOST", "127.0.0.1"),
                ("PROXY_PORT", "9000"),
                ("PROXY_TIMEOUT_SECS", "5"),
                ("PROXY_ALLOWED_METHODS", "get, post,patch"),
                ("PROXY_CACHE_TTL", "60"),
                ("PROXY_MAX_CACHE_SIZE", "10"),
                ("PROXY_RATE_LIMIT", "100/second"),
                ("PROXY_LOG_FILE", "/var/log/origin-proxy/proxy.log"),
            ]),
        )
        .unwrap();

        assert_eq!(config.routing.default_service, "http://fallback:8000");
        assert_eq!(config.listener.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.timeouts.request_secs, 5);
        assert_eq!(config.routing.allowed_methods, vec!["GET", "POST", "PATCH"]);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.max_entries, 10);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.limit, "100/second");
        assert_eq!(
            config.observability.log_file.as_deref(),
            Some("/var/log/origin-proxy/proxy.log")
        );
    }

    #[test]
    fn test_rate_limit_can_be_disabled() {
        let mut config = ProxyConfig::default();
        apply_env_overrides(&mut config, env(&[("PROXY_RATE_LIMIT", "off")])).unwrap();
        assert!(!config.rate_limit.enabled);
    }

    #[test]
    fn test_bad_number_is_env_error() {
        let mut config = ProxyConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("PROXY_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "PROXY_PORT"));
    }

    #[test]
    fn test_malformed_origin_entry_is_env_error() {
        let mut config = ProxyConfig::default();
        let err = apply_env_overrides(
            &mut config,
            env(&[("PROXY_ORIGIN_X", "https://x.example.com")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
    }
}
