//! Process-wide configuration.
//!
//! Build one [`Config`] at startup and hand it to the [`crate::Runner`]; it is
//! read-only afterwards.

use std::time::Duration;

use crate::error::{Error, Result};

/// Settings shared by every run of a [`crate::Runner`].
#[derive(Clone)]
pub struct Config {
    /// Model used by agents that don't name one
    pub default_model: String,
    /// Maximum number of model round-trips per run
    pub max_turns: usize,
    /// Temperature for LLM sampling (agents may override)
    pub temperature: Option<f32>,
    /// Maximum tokens for LLM response
    pub max_tokens: Option<u32>,
    /// Timeout the chat adapter should apply to each request
    pub request_timeout: Duration,
    /// Log every lifecycle event
    pub debug: bool,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o-mini".to_string(),
            max_turns: 10,
            temperature: None,
            max_tokens: None,
            request_timeout: Duration::from_secs(120),
            debug: false,
            openai_api_key: None,
            anthropic_api_key: None,
            gemini_api_key: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from the environment, starting from the defaults.
    ///
    /// Recognised variables: `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`,
    /// `GEMINI_API_KEY`, `BATON_DEFAULT_MODEL`, `BATON_MAX_TURNS`,
    /// `BATON_REQUEST_TIMEOUT` (seconds) and `BATON_DEBUG`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.openai_api_key = var("OPENAI_API_KEY");
        config.anthropic_api_key = var("ANTHROPIC_API_KEY");
        config.gemini_api_key = var("GEMINI_API_KEY");

        if let Some(model) = var("BATON_DEFAULT_MODEL") {
            config.default_model = model;
        }
        if let Some(turns) = var("BATON_MAX_TURNS") {
            config.max_turns = turns
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("BATON_MAX_TURNS={turns}: {e}")))?;
        }
        if let Some(secs) = var("BATON_REQUEST_TIMEOUT") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("BATON_REQUEST_TIMEOUT={secs}: {e}")))?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(debug) = var("BATON_DEBUG") {
            config.debug = matches!(debug.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(Error::Config("max_turns must be at least 1".into()));
        }
        if self.default_model.trim().is_empty() {
            return Err(Error::Config("default_model must not be empty".into()));
        }
        Ok(())
    }

    /// Whether any provider credential is set.
    pub fn has_provider(&self) -> bool {
        self.openai_api_key.is_some()
            || self.anthropic_api_key.is_some()
            || self.gemini_api_key.is_some()
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn max_turns(mut self, n: usize) -> Self {
        self.max_turns = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    pub fn anthropic_api_key(mut self, key: impl Into<String>) -> Self {
        self.anthropic_api_key = Some(key.into());
        self
    }

    pub fn gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.gemini_api_key = Some(key.into());
        self
    }
}

impl std::fmt::Debug for Config {
    // Credentials are reported as set/unset only.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("default_model", &self.default_model)
            .field("max_turns", &self.max_turns)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .field("debug", &self.debug)
            .field("openai_api_key", &self.openai_api_key.is_some())
            .field("anthropic_api_key", &self.anthropic_api_key.is_some())
            .field("gemini_api_key", &self.gemini_api_key.is_some())
            .finish()
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
        let config = Config::default();
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.max_turns, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert!(!config.debug);
        assert!(!config.has_provider());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = Config::new()
            .default_model("claude-sonnet-4")
            .max_turns(4)
            .temperature(0.1)
            .anthropic_api_key("sk-ant");
        assert_eq!(config.default_model, "claude-sonnet-4");
        assert_eq!(config.max_turns, 4);
        assert_eq!(config.temperature, Some(0.1));
        assert!(config.has_provider());
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("GEMINI_API_KEY", ""),
            ("BATON_MAX_TURNS", "3"),
            ("BATON_REQUEST_TIMEOUT", "30"),
            ("BATON_DEBUG", "true"),
        ]))
        .unwrap();

        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.max_turns, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.debug);
        assert_eq!(config.default_model, "gpt-4o-mini");
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let err = Config::from_lookup(lookup(&[("BATON_MAX_TURNS", "many")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("BATON_MAX_TURNS")));

        let err = Config::from_lookup(lookup(&[("BATON_MAX_TURNS", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_debug_hides_keys() {
        let rendered = format!("{:?}", Config::new().openai_api_key("sk-secret"));
        assert!(!rendered.contains("sk-secret"));
    }
}
