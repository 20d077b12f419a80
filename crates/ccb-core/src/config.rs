//! Builder configuration
//!
//! Loaded from TOML; every section and field is optional and falls back to
//! [`Default`]. API credentials may come from the environment instead of the
//! file (`CHART_BUILDER_API_KEY`, `CHART_BUILDER_API_TOKEN`).

use crate::error::ConfigError;
use crate::theme::AppearanceMode;
use ccb_query::{LocalQueryBuilder, QueryLimit, QueryOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `api.key`
pub const ENV_API_KEY: &str = "CHART_BUILDER_API_KEY";
/// Environment variable overriding `api.token`
pub const ENV_API_TOKEN: &str = "CHART_BUILDER_API_TOKEN";

/// How the final query is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStrategy {
    /// Ask the chart code (`buildQuery` / `queryLoaded`)
    #[default]
    Sandbox,
    /// Build on the host from slot types
    Local,
}

/// Treatment of `queryLoaded` answers to superseded requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Only the latest issued request id is accepted
    #[default]
    DiscardSuperseded,
    /// Every answer is accepted; the last one wins
    LastWriteWins,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Analytics API
    pub api: ApiConfig,
    /// Chart bundle server
    pub bundle: BundleConfig,
    /// Throttles, debounces and timeouts
    pub timing: TimingConfig,
    /// Query construction
    pub query: QueryConfig,
    /// Rendering
    pub display: DisplayConfig,
}

/// Analytics API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API root (without version path)
    pub base_url: String,
    /// API key
    pub key: String,
    /// API token
    pub token: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.luzmo.com".to_string(),
            key: String::new(),
            token: String::new(),
            timeout_ms: 30_000,
        }
    }
}

/// Chart bundle server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Directory URL serving `index.js` and `index.css`
    pub base_url: String,
    /// Per-asset timeout in milliseconds
    pub timeout_ms: u64,
    /// Target origin for posted messages
    pub target_origin: String,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4200/custom-chart".to_string(),
            timeout_ms: 10_000,
            target_origin: "*".to_string(),
        }
    }
}

/// Timing settings, all in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum spacing between `buildQuery` sends
    pub throttle_ms: u64,
    /// Time after which an unanswered `buildQuery` stops blocking
    pub build_timeout_ms: u64,
    /// Quiet period before a query-relevant change triggers a query
    pub query_debounce_ms: u64,
    /// Quiet period before a cosmetic change triggers a re-render
    pub render_debounce_ms: u64,
    /// Render frame interval
    pub frame_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 500,
            build_timeout_ms: 5_000,
            query_debounce_ms: 300,
            render_debounce_ms: 50,
            frame_interval_ms: 16,
        }
    }
}

impl TimingConfig {
    /// Throttle window
    #[inline]
    #[must_use]
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Build round-trip timeout
    #[inline]
    #[must_use]
    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }

    /// Query debounce
    #[inline]
    #[must_use]
    pub fn query_debounce(&self) -> Duration {
        Duration::from_millis(self.query_debounce_ms)
    }

    /// Render debounce
    #[inline]
    #[must_use]
    pub fn render_debounce(&self) -> Duration {
        Duration::from_millis(self.render_debounce_ms)
    }

    /// Frame interval
    #[inline]
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Query construction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Sandbox-built or local queries
    pub strategy: QueryStrategy,
    /// Stale answer handling
    pub stale_policy: StalePolicy,
    /// Fall back to the local builder when the awaited build times out
    pub fallback_on_timeout: bool,
    /// Row limit for local queries
    pub limit: u64,
    /// Locale for local queries
    pub locale_id: String,
    /// Timezone for local queries
    pub timezone_id: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            strategy: QueryStrategy::default(),
            stale_policy: StalePolicy::default(),
            fallback_on_timeout: true,
            limit: ccb_query::DEFAULT_LIMIT,
            locale_id: "en".to_string(),
            timezone_id: "UTC".to_string(),
        }
    }
}

impl QueryConfig {
    /// Local builder configured from these settings
    #[must_use]
    pub fn local_builder(&self) -> LocalQueryBuilder {
        LocalQueryBuilder::new()
            .with_limit(QueryLimit::by(self.limit))
            .with_options(QueryOptions::new(&self.locale_id, &self.timezone_id))
    }
}

/// Rendering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Language passed to the chart
    pub language: String,
    /// Initial appearance mode
    pub appearance: AppearanceMode,
    /// Whether the host system prefers dark mode (resolves `auto`)
    pub prefers_dark: bool,
    /// Initial theme name, overriding the appearance mode
    pub theme: Option<String>,
}

impl DisplayConfig {
    /// Theme selected when a session starts
    #[must_use]
    pub fn initial_theme(&self) -> String {
        self.theme
            .clone()
            .unwrap_or_else(|| self.appearance.effective_theme(self.prefers_dark).to_string())
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            appearance: AppearanceMode::Auto,
            prefers_dark: false,
            theme: None,
        }
    }
}

impl BuilderConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// [`ConfigError::Parse`] for malformed TOML or unknown enum values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file, apply environment overrides and validate
    ///
    /// # Errors
    /// [`ConfigError`] when the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?.with_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Apply credential overrides from a variable lookup
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
            self.api.key = key;
        }
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.is_empty()) {
            self.api.token = token;
        }
        self
    }

    /// With API credentials
    #[inline]
    #[must_use]
    pub fn with_credentials(mut self, key: impl Into<String>, token: impl Into<String>) -> Self {
        self.api.key = key.into();
        self.api.token = token.into();
        self
    }

    /// With API base URL
    #[inline]
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api.base_url = url.into();
        self
    }

    /// With bundle base URL
    #[inline]
    #[must_use]
    pub fn with_bundle_url(mut self, url: impl Into<String>) -> Self {
        self.bundle.base_url = url.into();
        self
    }

    /// With query strategy
    #[inline]
    #[must_use]
    pub fn with_strategy(mut self, strategy: QueryStrategy) -> Self {
        self.query.strategy = strategy;
        self
    }

    /// With stale answer policy
    #[inline]
    #[must_use]
    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.query.stale_policy = policy;
        self
    }

    /// With timing settings
    #[inline]
    #[must_use]
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// With appearance mode
    #[inline]
    #[must_use]
    pub fn with_appearance(mut self, appearance: AppearanceMode) -> Self {
        self.display.appearance = appearance;
        self
    }

    /// Check internal consistency
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".to_string()));
        }
        if self.bundle.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("bundle.base_url must not be empty".to_string()));
        }
        if self.timing.build_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timing.build_timeout_ms must be positive".to_string()));
        }
        if self.timing.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid("timing.frame_interval_ms must be positive".to_string()));
        }
        if self.query.limit == 0 {
            return Err(ConfigError::Invalid("query.limit must be positive".to_string()));
        }
        Ok(())
    }
}
