//! Server configuration, read from the environment

use std::env;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::auth::Credentials;
use crate::resource::Resource;
use crate::store::Backend;

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_PORT_ATTEMPTS: u16 = 10;
pub const DEFAULT_DB_FILE: &str = "database.json";
pub const DEFAULT_REMOTE_DB: &str = "tododb";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    InvalidValue { key: &'static str, value: String, reason: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

pub struct Config {
    pub bind: String,
    pub port: u16,
    /// How many ports are tried (starting from `port`, upwards) when the port is busy
    pub port_attempts: u16,
    pub backend: Backend,
    /// Secret used to sign session cookies. `None` means a random secret will be used
    pub cookie_secret: Option<String>,
    pub initial_user: Option<Credentials>,
    pub cors_origin: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config, fetching variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &'static str, default: &str| -> String {
            lookup(key)
                .filter(|value| value.trim().is_empty() == false)
                .unwrap_or_else(|| {
                    log::debug!("{} not set, using default: {}", key, default);
                    default.to_string()
                })
        };

        let port = parse_number("TODO_PORT", var("TODO_PORT", &DEFAULT_PORT.to_string()))?;
        let port_attempts: u16 = parse_number("TODO_PORT_ATTEMPTS", var("TODO_PORT_ATTEMPTS", &DEFAULT_PORT_ATTEMPTS.to_string()))?;

        let backend = match var("TODO_BACKEND", "file").to_lowercase().as_str() {
            "file" => Backend::File {
                path: PathBuf::from(var("TODO_DB_FILE", DEFAULT_DB_FILE)),
            },
            "remote" => {
                let raw_url = lookup("TODO_REMOTE_URL").ok_or(ConfigError::Missing("TODO_REMOTE_URL"))?;
                let url = Url::parse(&raw_url).map_err(|err| ConfigError::InvalidValue {
                    key: "TODO_REMOTE_URL", value: raw_url.clone(), reason: err.to_string(),
                })?;
                Backend::Remote {
                    resource: Resource::new(url, var("TODO_REMOTE_USER", ""), var("TODO_REMOTE_PASSWORD", "")),
                    database: var("TODO_REMOTE_DB", DEFAULT_REMOTE_DB),
                }
            },
            other => return Err(ConfigError::InvalidValue {
                key: "TODO_BACKEND", value: other.to_string(), reason: "expected \"file\" or \"remote\"".to_string(),
            }),
        };

        let initial_user = match (lookup("TODO_ADMIN_USER"), lookup("TODO_ADMIN_PASSWORD")) {
            (Some(user), Some(password)) => Some(Credentials::new(user, password)),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("TODO_ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("TODO_ADMIN_USER")),
        };

        Ok(Self {
            bind: var("TODO_BIND", DEFAULT_BIND),
            port,
            port_attempts: port_attempts.max(1),
            backend,
            cookie_secret: lookup("TODO_COOKIE_SECRET").filter(|s| s.is_empty() == false),
            initial_user,
            cors_origin: var("TODO_CORS_ORIGIN", DEFAULT_CORS_ORIGIN),
        })
    }

    /// The secret keying cookies and password digests.
    ///
    /// When none is configured, a random one is generated: sessions and users will not survive a restart
    pub fn secret(&self) -> Vec<u8> {
        match &self.cookie_secret {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                log::warn!("TODO_COOKIE_SECRET is not set, using a random secret");
                let mut secret = uuid::Uuid::new_v4().as_bytes().to_vec();
                secret.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
                secret
            },
        }
    }
}

fn parse_number<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        key, value: value.clone(), reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.port_attempts, 10);
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert!(config.cookie_secret.is_none());
        assert!(config.initial_user.is_none());
        match config.backend {
            Backend::File { path } => assert_eq!(path, PathBuf::from("database.json")),
            other => panic!("unexpected backend {:?}", other),
        }
        assert_eq!(config_from(&[]).unwrap().secret().len(), 32);
    }

    #[test]
    fn remote_backend() {
        let config = config_from(&[
            ("TODO_BACKEND", "Remote"),
            ("TODO_REMOTE_URL", "https://couch.example.com/"),
            ("TODO_REMOTE_USER", "admin"),
            ("TODO_REMOTE_PASSWORD", "pw"),
            ("TODO_PORT", "8080"),
            ("TODO_COOKIE_SECRET", "s3cr3t"),
        ]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.secret(), b"s3cr3t".to_vec());
        match config.backend {
            Backend::Remote { resource, database } => {
                assert_eq!(resource.url().as_str(), "https://couch.example.com/");
                assert_eq!(resource.username(), "admin");
                assert_eq!(database, "tododb");
            },
            other => panic!("unexpected backend {:?}", other),
        }

        assert!(matches!(
            config_from(&[("TODO_BACKEND", "remote")]),
            Err(ConfigError::Missing("TODO_REMOTE_URL"))
        ));
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(config_from(&[("TODO_PORT", "eighty")]), Err(ConfigError::InvalidValue { key: "TODO_PORT", .. })));
        assert!(matches!(config_from(&[("TODO_PORT", "70000")]), Err(ConfigError::InvalidValue { key: "TODO_PORT", .. })));
        assert!(matches!(config_from(&[("TODO_BACKEND", "sqlite")]), Err(ConfigError::InvalidValue { key: "TODO_BACKEND", .. })));
        assert!(matches!(config_from(&[("TODO_ADMIN_USER", "root")]), Err(ConfigError::Missing("TODO_ADMIN_PASSWORD"))));
    }

    #[test]
    fn port_attempts() {
        assert_eq!(config_from(&[("TODO_PORT_ATTEMPTS", "3")]).unwrap().port_attempts, 3);
        // The configured port is always tried at least once
        assert_eq!(config_from(&[("TODO_PORT_ATTEMPTS", "0")]).unwrap().port_attempts, 1);
        assert!(matches!(
            config_from(&[("TODO_PORT_ATTEMPTS", "-1")]),
            Err(ConfigError::InvalidValue { key: "TODO_PORT_ATTEMPTS", .. })
        ));
    }

    #[test]
    fn initial_user() {
        let config = config_from(&[("TODO_ADMIN_USER", "root"), ("TODO_ADMIN_PASSWORD", "toor")]).unwrap();
        assert_eq!(config.initial_user, Some(Credentials::new("root", "toor")));
    }
}
