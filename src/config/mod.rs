//! Client configuration management

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use url::Url;

/// Default GraphQL endpoint of a local Stash server
pub const DEFAULT_URL: &str = "http://localhost:9999/graphql";

/// Client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// GraphQL endpoint
    pub url: Url,

    /// API key sent in the `ApiKey` header, if the server requires one
    pub api_key: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,

    /// Identity map time-to-live
    pub cache_ttl: Duration,

    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_URL).expect("default URL is valid"),
            api_key: None,
            timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(300),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = lookup("STASH_URL").unwrap_or_else(|| DEFAULT_URL.to_string());
        let url = Url::parse(&url).with_context(|| format!("Invalid STASH_URL: {}", url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("STASH_URL must use http or https, got {}", url.scheme());
        }

        let api_key = lookup("STASH_API_KEY").filter(|key| !key.trim().is_empty());

        let timeout = lookup("STASH_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("Invalid STASH_TIMEOUT_SECS")?;

        let cache_ttl = lookup("STASH_CACHE_TTL_SECS")
            .unwrap_or_else(|| "300".to_string())
            .parse()
            .context("Invalid STASH_CACHE_TTL_SECS")?;

        Ok(Self {
            url,
            api_key,
            timeout: Duration::from_secs(timeout),
            cache_ttl: Duration::from_secs(cache_ttl),
            log_json: lookup("STASH_LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.url.as_str(), DEFAULT_URL);
        assert_eq!(config.api_key, None);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert!(!config.log_json);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("STASH_URL", "https://stash.example.com/graphql"),
            ("STASH_API_KEY", "secret"),
            ("STASH_CACHE_TTL_SECS", "0"),
            ("STASH_LOG_JSON", "1"),
        ]))
        .unwrap();

        assert_eq!(config.url.host_str(), Some("stash.example.com"));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.cache_ttl, Duration::ZERO);
        assert!(config.log_json);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("STASH_URL", "not a url")])).is_err());
        assert!(Config::from_lookup(lookup(&[("STASH_URL", "ftp://host/graphql")])).is_err());
        assert!(Config::from_lookup(lookup(&[("STASH_TIMEOUT_SECS", "soon")])).is_err());
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let config = Config::from_lookup(lookup(&[("STASH_API_KEY", "  ")])).unwrap();
        assert_eq!(config.api_key, None);
    }
}
