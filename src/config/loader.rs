//! Configuration loading from disk and environment.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::env::{apply_env_overrides, ENV_PREFIX};
use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {var}: {reason}")]
    Env { var: String, reason: String },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML document on top of the built-in defaults.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Convert raw environment pairs to strings. Non-UTF-8 variables outside the
/// `PROXY_` namespace are skipped; a non-UTF-8 `PROXY_*` value is an error.
pub fn utf8_vars<I>(vars: I) -> Result<Vec<(String, String)>, ConfigError>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut out = Vec::new();
    for (name, value) in vars {
        let Ok(name) = name.into_string() else {
            continue;
        };
        match value.into_string() {
            Ok(value) => out.push((name, value)),
            Err(_) if name.starts_with(ENV_PREFIX) => {
                return Err(ConfigError::Env {
                    var: name,
                    reason: "value is not valid UTF-8".to_string(),
                });
            }
            Err(_) => {}
        }
    }
    Ok(out)
}

/// Load defaults, the optional file and the process environment, then validate.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    load_config_from(path, utf8_vars(std::env::vars_os())?)
}

/// Same as [`load_config`] with an explicit set of environment variables.
pub fn load_config_from<I>(path: Option<&Path>, vars: I) -> Result<ProxyConfig, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            parse_config(&content)?
        }
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, vars)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_environment() {
        use std::os::unix::ffi::OsStringExt;

        let bad = || OsString::from_vec(vec![0x66, 0xff, 0x6f]);
        let vars = utf8_vars(vec![
            (OsString::from("PROXY_PORT"), OsString::from("8080")),
            (OsString::from("LANG_GARBAGE"), bad()),
            (bad(), OsString::from("x")),
        ])
        .unwrap();
        assert_eq!(vars, vec![("PROXY_PORT".to_string(), "8080".to_string())]);

        let err = utf8_vars(vec![(OsString::from("PROXY_DEFAULT_SERVICE"), bad())]).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "PROXY_DEFAULT_SERVICE"));
    }

    fn no_env() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_config_from(None, no_env()).unwrap();
        assert_eq!(config.listener.port, 5000);
        assert_eq!(config.cache.max_entries, 100);
    }

    #[test]
    fn test_file_then_env_precedence() {
        let path = std::env::temp_dir().join(format!("origin-proxy-{}.toml", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
            [listener]
            port = 7000

            [routing]
            default_service = "http://file-default:8000"

            [routing.origin_mapping]
            "https://a.example.com" = "http://a:8000"
            "#
        )
        .unwrap();
        drop(file);

        let env = vec![
            ("PROXY_PORT".to_string(), "7100".to_string()),
            (
                "PROXY_ORIGIN_B".to_string(),
                "https://b.example.com=http://b:8000".to_string(),
            ),
        ];
        let config = load_config_from(Some(&path), env).unwrap();
        std::fs::remove_file(&path).unwrap_or_default();

        assert_eq!(config.listener.port, 7100);
        assert_eq!(config.routing.default_service, "http://file-default:8000");
        assert_eq!(config.routing.origin_mapping.len(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/proxy.toml")), no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        assert!(matches!(parse_config("listener = 5"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_values_are_reported_together() {
        let env = vec![
            ("PROXY_DEFAULT_SERVICE".to_string(), "not a url".to_string()),
            ("PROXY_TIMEOUT_SECS".to_string(), "0".to_string()),
        ];
        match load_config_from(None, env) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
