//! Connection settings loaded from the environment.

use crate::error::ConfigError;

pub const BASE_URL_VAR: &str = "ARCHBOARD_BASE_URL";
pub const CLIENT_ID_VAR: &str = "ARCHBOARD_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "ARCHBOARD_CLIENT_SECRET";

/// Base URL and client credentials for one API server.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }

    /// Read the `ARCHBOARD_*` variables, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        Ok(Self::new(
            &get(BASE_URL_VAR)?,
            &get(CLIENT_ID_VAR)?,
            &get(CLIENT_SECRET_VAR)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loads_all_values() {
        let config = ClientConfig::from_lookup(lookup(&[
            (BASE_URL_VAR, "https://sis.example.org/"),
            (CLIENT_ID_VAR, "id"),
            (CLIENT_SECRET_VAR, "secret"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://sis.example.org");
        assert_eq!(config.client_id, "id");
        assert_eq!(config.client_secret, "secret");
    }

    #[test]
    fn missing_value_is_reported() {
        let err = ClientConfig::from_lookup(lookup(&[
            (BASE_URL_VAR, "https://sis.example.org"),
            (CLIENT_ID_VAR, "id"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing(CLIENT_SECRET_VAR));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let err = ClientConfig::from_lookup(lookup(&[
            (BASE_URL_VAR, "  "),
            (CLIENT_ID_VAR, "id"),
            (CLIENT_SECRET_VAR, "secret"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing(BASE_URL_VAR));
    }

    #[test]
    fn debug_redacts_secret() {
        let config = ClientConfig::new("https://sis.example.org", "id", "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
