use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

const API_URL_VAR: &str = "PROCTOR_API_URL";
const API_TOKEN_VAR: &str = "PROCTOR_API_TOKEN";
const API_TIMEOUT_VAR: &str = "PROCTOR_API_TIMEOUT_SECS";
const REDIRECT_VAR: &str = "PROCTOR_REDIRECT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REDIRECT_SECS: u64 = 5;

fn parse_secs(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
        var,
        value: raw.to_owned(),
    })
}

/// Connection settings for the quiz-data service.
#[derive(Clone, Debug)]
pub struct GradingConfig {
    pub base_url: Url,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

impl GradingConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::Url` if `base_url` does not parse.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `PROCTOR_API_URL`, `PROCTOR_API_TOKEN` and `PROCTOR_API_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL is missing or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let base_url = lookup(API_URL_VAR).ok_or(ConfigError::Missing { var: API_URL_VAR })?;
        let mut config = Self::new(base_url.trim())?;
        if let Some(token) = lookup(API_TOKEN_VAR).filter(|t| !t.trim().is_empty()) {
            config.api_token = Some(token);
        }
        if let Some(raw) = lookup(API_TIMEOUT_VAR) {
            config.timeout = Duration::from_secs(parse_secs(API_TIMEOUT_VAR, &raw)?);
        }
        Ok(config)
    }

    /// Join `path` onto the base URL, keeping any base path prefix.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))
    }
}

/// Timing knobs for a running session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    display_poll: Duration,
    tick_period: Duration,
    redirect_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            display_poll: Duration::from_secs(1),
            tick_period: Duration::from_secs(1),
            redirect_delay: Duration::from_secs(DEFAULT_REDIRECT_SECS),
        }
    }
}

impl SessionSettings {
    /// Defaults, with `PROCTOR_REDIRECT_SECS` applied when set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the redirect delay does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        if let Some(raw) = lookup(REDIRECT_VAR) {
            settings.redirect_delay = Duration::from_secs(parse_secs(REDIRECT_VAR, &raw)?);
        }
        Ok(settings)
    }

    #[must_use]
    pub fn with_display_poll(mut self, poll: Duration) -> Self {
        self.display_poll = poll;
        self
    }

    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    #[must_use]
    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    #[must_use]
    pub fn display_poll(&self) -> Duration {
        self.display_poll
    }

    #[must_use]
    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    #[must_use]
    pub fn redirect_delay(&self) -> Duration {
        self.redirect_delay
    }
}
