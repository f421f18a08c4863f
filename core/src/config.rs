//! Client configuration.
//!
//! `IvvyConfig::from_env` reads `IVVY_*` variables through the `config`
//! crate into a serde struct, then checks that both credentials are set.

use std::fmt;
use std::time::Duration;

use ::config::{Config, Environment};
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.ivvy.com/api/1.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// API key and secret issued by iVvy.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Everything needed to build a production `Ivvy` client.
#[derive(Debug, Clone)]
pub struct IvvyConfig {
    pub credentials: Credentials,
    pub base_url: String,
    pub timeout: Duration,
}

/// Raw `IVVY_*` settings as they come out of the environment.
#[derive(Debug, Deserialize)]
struct EnvSettings {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    api_secret: Option<String>,
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

impl IvvyConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(api_key, api_secret),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from `IVVY_API_KEY`, `IVVY_API_SECRET` and the optional
    /// `IVVY_BASE_URL` / `IVVY_TIMEOUT_SECS`.
    ///
    /// # Errors
    /// `ConfigError::Missing` when a credential is unset or blank,
    /// `ConfigError::Load` when a value has the wrong type.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(Environment::with_prefix("IVVY"))
    }

    fn from_source(source: Environment) -> Result<Self, ConfigError> {
        let settings: EnvSettings = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;

        let api_key = required(settings.api_key, "IVVY_API_KEY")?;
        let api_secret = required(settings.api_secret, "IVVY_API_SECRET")?;
        Ok(Self::new(api_key, api_secret)
            .with_base_url(settings.base_url)
            .with_timeout(Duration::from_secs(settings.timeout_secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let vars: ::config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("IVVY").source(Some(vars))
    }

    #[test]
    fn defaults_point_at_ivvy() {
        let config = IvvyConfig::new("key", "secret");
        assert_eq!(config.base_url, "https://api.ivvy.com/api/1.0");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn credentials_are_required() {
        let err = IvvyConfig::from_source(env(&[("IVVY_API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("IVVY_API_SECRET")));

        let err = IvvyConfig::from_source(env(&[("IVVY_API_KEY", " "), ("IVVY_API_SECRET", "s")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("IVVY_API_KEY")));
    }

    #[test]
    fn optional_settings_fall_back_to_defaults() {
        let config =
            IvvyConfig::from_source(env(&[("IVVY_API_KEY", "k"), ("IVVY_API_SECRET", "s")])).unwrap();
        assert_eq!(config.credentials, Credentials::new("k", "s"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn optional_settings_are_overridable() {
        let config = IvvyConfig::from_source(env(&[
            ("IVVY_API_KEY", "k"),
            ("IVVY_API_SECRET", "s"),
            ("IVVY_BASE_URL", "http://localhost:3000/api/1.0"),
            ("IVVY_TIMEOUT_SECS", "12"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:3000/api/1.0");
        assert_eq!(config.timeout, Duration::from_secs(12));
    }

    #[test]
    fn malformed_timeout_is_a_load_error() {
        let err = IvvyConfig::from_source(env(&[
            ("IVVY_API_KEY", "k"),
            ("IVVY_API_SECRET", "s"),
            ("IVVY_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn from_env_reads_process_environment() {
        std::env::set_var("IVVY_API_KEY", "env-key");
        std::env::set_var("IVVY_API_SECRET", "env-secret");
        std::env::set_var("IVVY_TIMEOUT_SECS", "7");

        let config = IvvyConfig::from_env().unwrap();
        assert_eq!(config.credentials, Credentials::new("env-key", "env-secret"));
        assert_eq!(config.timeout, Duration::from_secs(7));

        std::env::remove_var("IVVY_API_KEY");
        std::env::remove_var("IVVY_API_SECRET");
        std::env::remove_var("IVVY_TIMEOUT_SECS");
    }

    #[test]
    fn debug_hides_the_secret() {
        let shown = format!("{:?}", Credentials::new("key", "hunter2"));
        assert!(shown.contains("key"));
        assert!(!shown.contains("hunter2"));
    }
}
