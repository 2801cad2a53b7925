use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "EVENTFEED_CONFIG";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// JSON file backing the settings store
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,

    /// HTTP listener and admin access
    pub server: ServerConfig,

    /// Outbound calendar fetches
    #[serde(default)]
    pub fetch: FetchConfig,

    /// ICS cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Date formatting and list rendering
    #[serde(default)]
    pub display: DisplayConfig,

    /// Google Calendar API
    #[serde(default)]
    pub google: GoogleConfig,

    /// Operator notifications
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Initial source settings, copied into the settings store when absent
    #[serde(default)]
    pub source: SourceSeed,

    /// Hashtag enrichment rules; empty means the built-in table
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagRuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind_addr: String,

    /// Bearer token for the admin endpoints. Admin endpoints are disabled when unset.
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Public URL of the site, included in operator notices
    pub site_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Upper bound for a single calendar fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,

    /// Allow loopback/private targets (DEVELOPMENT ONLY)
    ///
    /// The cloud metadata address stays blocked either way.
    #[serde(default)]
    pub allow_private_network: bool,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            allow_private_network: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a fetched ICS body is served without refetching
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// IANA time zone used for formatted dates and the "tomorrow" window
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// `max_events` used when a render request does not set one
    #[serde(default = "default_max_events")]
    pub default_max_events: u32,
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_max_events() -> u32 {
    20
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            default_max_events: default_max_events(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_google_api_base")]
    pub api_base_url: String,

    #[serde(default = "default_google_max_results")]
    pub max_results: u32,
}

fn default_google_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_google_max_results() -> u32 {
    20
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_google_api_base(),
            max_results: default_google_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Optional endpoint receiving operator notices as JSON
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_notify_subject")]
    pub subject: String,
}

fn default_notify_subject() -> String {
    "Calendar Notification".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            subject: default_notify_subject(),
        }
    }
}

/// Source settings used to seed an empty settings store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSeed {
    #[serde(default)]
    pub ics_url: Option<String>,
    #[serde(default)]
    pub google_api_key: Option<String>,
    #[serde(default)]
    pub google_calendar_id: Option<String>,
    /// `google` or `nextcloud`
    #[serde(default)]
    pub feature: Option<String>,
}

/// One hashtag enrichment rule. Exactly one of `link` or `html` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRuleConfig {
    /// Tag name without the leading `#`
    pub tag: String,
    /// Wrap the summary in a link to this URL
    #[serde(default)]
    pub link: Option<String>,
    /// Append this HTML snippet to the description
    #[serde(default)]
    pub html: Option<String>,
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eventfeed")
}

fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            server: ServerConfig {
                bind_addr: "127.0.0.1:8080".to_string(),
                admin_token: std::env::var("EVENTFEED_ADMIN_TOKEN").ok(),
                site_url: "http://localhost:8080".to_string(),
            },
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
            display: DisplayConfig::default(),
            google: GoogleConfig::default(),
            notify: NotifyConfig::default(),
            source: SourceSeed::default(),
            tags: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, creating defaults if it doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!("No config at {}, writing defaults", config_path.display());
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; errors fail the load.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.server.bind_addr.parse::<SocketAddr>().is_err() {
            result.add_error(
                "server.bind_addr",
                format!("Not a socket address: {}", self.server.bind_addr),
            );
        }
        validate_url(&self.server.site_url, "server.site_url", &mut result);

        match &self.server.admin_token {
            None => result.add_warning(
                "server.admin_token",
                "Admin token not configured - admin endpoints are disabled",
            ),
            Some(token) if token.len() < 16 => result.add_warning(
                "server.admin_token",
                "Admin token is shorter than 16 characters",
            ),
            Some(_) => {}
        }

        if self.fetch.timeout_secs == 0 {
            result.add_error("fetch.timeout_secs", "Fetch timeout must be greater than 0");
        } else if self.fetch.timeout_secs > 120 {
            result.add_warning(
                "fetch.timeout_secs",
                "Fetch timeout is unusually long (>120s)",
            );
        }

        if self.fetch.allow_private_network {
            result.add_warning(
                "fetch.allow_private_network",
                "Private network targets are allowed - use for development only",
            );
        }

        if self.cache.ttl_secs == 0 {
            result.add_warning("cache.ttl_secs", "ICS cache disabled (0 seconds)");
        }

        if self.display.timezone.parse::<Tz>().is_err() {
            result.add_error(
                "display.timezone",
                format!("Unknown time zone: {}", self.display.timezone),
            );
        }

        if !(1..=100).contains(&self.display.default_max_events) {
            result.add_error(
                "display.default_max_events",
                "Default max events must be between 1 and 100",
            );
        }

        validate_url(&self.google.api_base_url, "google.api_base_url", &mut result);
        if !(1..=2500).contains(&self.google.max_results) {
            result.add_error(
                "google.max_results",
                "Google max results must be between 1 and 2500",
            );
        }

        if let Some(webhook) = &self.notify.webhook_url {
            validate_url(webhook, "notify.webhook_url", &mut result);
        }

        if let Some(ics_url) = &self.source.ics_url {
            validate_url(ics_url, "source.ics_url", &mut result);
        }

        if let Some(feature) = &self.source.feature {
            if feature != "google" && feature != "nextcloud" {
                result.add_error(
                    "source.feature",
                    format!("Feature must be google or nextcloud, got: {}", feature),
                );
            }
        }

        for (index, rule) in self.tags.iter().enumerate() {
            let field = format!("tags[{}]", index);
            if rule.tag.is_empty() || !rule.tag.chars().all(|c| c.is_alphanumeric() || c == '_') {
                result.add_error(
                    &field,
                    format!("Tag must be word characters without '#': {}", rule.tag),
                );
            }
            match (&rule.link, &rule.html) {
                (Some(link), None) => validate_url(link, &field, &mut result),
                (None, Some(_)) => {}
                _ => result.add_error(&field, "Set exactly one of link or html"),
            }
        }

        result
    }

    /// Parsed display time zone
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.display
            .timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid(format!("Unknown time zone: {}", self.display.timezone)))
    }

    /// Save configuration to a file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the configuration file (`EVENTFEED_CONFIG` or the platform config dir)
    pub fn config_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_dir().join("config.toml"))
    }
}

/// Validate a URL field: must parse, use http(s) and carry a host
pub fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }

            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }

            if url.port() == Some(0) {
                result.add_error(field_name, "Port cannot be 0");
            }
        }
        Err(e) => {
            result.add_error(field_name, format!("Invalid URL: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn base_config() -> Config {
        let mut config = Config::default();
        config.server.admin_token = Some("0123456789abcdef-token".to_string());
        config
    }

    #[test]
    fn test_valid_default_config() {
        let config = base_config();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_missing_admin_token_is_warning() {
        let mut config = base_config();
        config.server.admin_token = None;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "server.admin_token"));
    }

    #[test]
    fn test_invalid_ics_url_scheme() {
        let mut config = base_config();
        config.source.ics_url = Some("ftp://cloud.example.org/calendar.ics".to_string());
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_unknown_timezone() {
        let mut config = base_config();
        config.display.timezone = "Mars/Olympus".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(config.timezone().is_err());
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = base_config();
        config.fetch.timeout_secs = 0;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "fetch.timeout_secs"));
    }

    #[test]
    fn test_tag_rule_needs_exactly_one_action() {
        let mut config = base_config();
        config.tags.push(TagRuleConfig {
            tag: "Repaircafe".to_string(),
            link: None,
            html: None,
        });
        config.tags.push(TagRuleConfig {
            tag: "#Bad".to_string(),
            link: None,
            html: Some("<p>x</p>".to_string()),
        });
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "tags[0]"));
        assert!(result.errors.iter().any(|e| e.field == "tags[1]"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = Config::from_toml("[server\nbind_addr = ").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_minimal_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            bind_addr = "0.0.0.0:9000"
            site_url = "https://www.example.org"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.display.timezone, "Europe/Berlin");
        assert!(config.tags.is_empty());
    }

    #[test]
    fn test_load_from_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.server.bind_addr, config.server.bind_addr);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
