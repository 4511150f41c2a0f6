//! Configuration management for the booking client.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("Invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Backend database URL (`PLACEBOOK_BACKEND_URL`)
    pub backend_url: String,
    /// Image upload endpoint (`PLACEBOOK_UPLOAD_URL`)
    pub upload_url: String,
    /// Google Maps API key (`GOOGLE_MAPS_API_KEY`)
    pub maps_api_key: String,
    /// Static map zoom (`PLACEBOOK_MAP_ZOOM`, default: 14)
    pub map_zoom: u8,
    /// Show mutations before the backend confirms them (`PLACEBOOK_OPTIMISTIC`, default: true)
    pub optimistic: bool,
    /// Tracing filter (`PLACEBOOK_LOG`, default: `placebook=info`)
    pub log_filter: String,
    /// User to sign in at startup (`PLACEBOOK_USER_ID`)
    pub user_id: Option<String>,
    /// Backend token for that user (`PLACEBOOK_AUTH_TOKEN`)
    pub auth_token: Option<String>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a variable that cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a variable that cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            backend_url: lookup("PLACEBOOK_BACKEND_URL")
                .unwrap_or_else(|| "http://localhost:9000".to_string()),
            upload_url: lookup("PLACEBOOK_UPLOAD_URL")
                .unwrap_or_else(|| "http://localhost:5001/storeImage".to_string()),
            maps_api_key: lookup("GOOGLE_MAPS_API_KEY").unwrap_or_default(),
            map_zoom: parsed(&lookup, "PLACEBOOK_MAP_ZOOM", 14)?,
            optimistic: parsed(&lookup, "PLACEBOOK_OPTIMISTIC", true)?,
            log_filter: lookup("PLACEBOOK_LOG").unwrap_or_else(|| "placebook=info".to_string()),
            user_id: lookup("PLACEBOOK_USER_ID"),
            auth_token: lookup("PLACEBOOK_AUTH_TOKEN"),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:9000".to_string(),
            upload_url: "http://localhost:5001/storeImage".to_string(),
            maps_api_key: String::new(),
            map_zoom: 14,
            optimistic: true,
            log_filter: "placebook=info".to_string(),
            user_id: None,
            auth_token: None,
        }
    }
}

fn parsed<F, V>(lookup: &F, key: &'static str, default: V) -> Result<V, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    V: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests can unwrap

    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(Config::from_lookup(lookup(&[])).unwrap(), Config::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            ("PLACEBOOK_BACKEND_URL", "https://db.example"),
            ("GOOGLE_MAPS_API_KEY", "k3y"),
            ("PLACEBOOK_MAP_ZOOM", "9"),
            ("PLACEBOOK_OPTIMISTIC", "false"),
            ("PLACEBOOK_USER_ID", "u1"),
        ]))
        .unwrap();

        assert_eq!(config.backend_url, "https://db.example");
        assert_eq!(config.maps_api_key, "k3y");
        assert_eq!(config.map_zoom, 9);
        assert!(!config.optimistic);
        assert_eq!(config.user_id.as_deref(), Some("u1"));
        assert_eq!(config.auth_token, None);
    }

    #[test]
    fn rejects_unparsable_zoom() {
        assert_eq!(
            Config::from_lookup(lookup(&[("PLACEBOOK_MAP_ZOOM", "close")])),
            Err(ConfigError::Invalid {
                key: "PLACEBOOK_MAP_ZOOM",
                value: "close".to_string(),
            })
        );
    }
}
