//! Configuration infrastructure
//!
//! Configuration is layered with the `config` crate:
//! 1. Built-in defaults (see [`defaults`])
//! 2. An optional JSON/TOML/YAML file
//! 3. `ETENDER_*` environment variables (`__` separates nested keys,
//!    e.g. `ETENDER_STORE__DATABASE_URL`)

#![allow(clippy::uninlined_format_args)]

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::infrastructure::parsing::LabelMatching;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub portal: PortalConfig,
    pub http: HttpClientConfig,
    pub store: StoreConfig,
    pub crawling: CrawlingConfig,
    pub logging: LoggingConfig,
}

/// Procurement portal endpoints and HTML conventions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Scheme and host, without trailing slash
    pub base_url: String,

    /// Path of the organisation index page
    pub index_path: String,

    /// Href substring that marks a direct tender-detail link
    pub detail_link_marker: String,

    /// Name of the session cookie replayed on every request
    pub session_cookie: String,

    /// How detail-page labels are matched against the field table
    pub label_matching: LabelMatching,
}

/// HTTP client configuration for crawling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub follow_redirects: bool,
}

/// Document store location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// sqlx connection string, e.g. `sqlite:data/tenders.db`
    pub database_url: String,

    /// Table holding tender documents
    pub collection: String,

    pub max_connections: u32,
}

/// Crawling specific configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlingConfig {
    /// Upper bound on in-flight detail page fetches
    pub max_concurrent_details: usize,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs in the log file
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; defaults to `logs/` next to the executable
    pub directory: Option<PathBuf>,

    /// Log file name
    pub file_name: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: etenders::BASE_URL.to_string(),
            index_path: etenders::ORGANISATION_INDEX_PATH.to_string(),
            detail_link_marker: etenders::DIRECT_LINK_MARKER.to_string(),
            session_cookie: etenders::SESSION_COOKIE.to_string(),
            label_matching: LabelMatching::Exact,
        }
    }
}

impl PortalConfig {
    /// Absolute URL of the organisation index page
    pub fn index_url(&self) -> String {
        format!("{}{}", self.base_url, self.index_path)
    }

    /// Resolve a discovered href; absolute URLs pass through unchanged
    pub fn resolve(&self, href: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", self.base_url, href)
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            follow_redirects: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::DATABASE_URL.to_string(),
            collection: defaults::COLLECTION.to_string(),
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for CrawlingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_details: defaults::MAX_CONCURRENT_DETAILS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            directory: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` (required if given), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let builtin = config::Config::try_from(&Self::default())?;
        let mut builder = config::Config::builder().add_source(builtin);

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => match Self::default_config_path() {
                Some(path) => builder.add_source(config::File::from(path).required(false)),
                None => builder,
            },
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// `<user config dir>/etender-crawler/etender_crawler.json`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(defaults::APP_DIR).join(defaults::CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.portal.base_url.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "portal.base_url must not be empty".to_string(),
            });
        }
        if let Err(e) = url::Url::parse(&self.portal.base_url) {
            return Err(ConfigError::Validation {
                message: format!("portal.base_url '{}' is not a URL: {}", self.portal.base_url, e),
            });
        }
        if self.crawling.max_concurrent_details == 0 {
            return Err(ConfigError::Validation {
                message: "crawling.max_concurrent_details must be greater than 0".to_string(),
            });
        }
        if self.store.collection.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "store.collection must not be empty".to_string(),
            });
        }
        if !self
            .store
            .collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Validation {
                message: format!(
                    "store.collection '{}' may only contain letters, digits and '_'",
                    self.store.collection
                ),
            });
        }
        Ok(())
    }
}

/// eProcurement portal URLs and HTML conventions
pub mod etenders {
    /// Base URL of the portal
    pub const BASE_URL: &str = "https://etenders.gov.in";

    /// Organisation index: one anchor per organisation, anchor text is its tender count
    pub const ORGANISATION_INDEX_PATH: &str =
        "/eprocure/app?page=FrontEndTendersByOrganisation&service=page";

    /// Href substring of a direct tender-detail link
    pub const DIRECT_LINK_MARKER: &str = "component=%24DirectLink&page=FrontEndViewTender";

    pub const SESSION_COOKIE: &str = "JSESSIONID";

    /// Dates on the portal are Indian Standard Time, UTC+05:30
    pub const UTC_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

    /// Label cell class on detail pages
    pub const CAPTION_CLASS: &str = "td_caption";

    /// Value cell class on detail pages
    pub const FIELD_CLASS: &str = "td_field";
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR: &str = "etender-crawler";
    pub const CONFIG_FILE: &str = "etender_crawler.json";
    pub const ENV_PREFIX: &str = "ETENDER";

    pub const USER_AGENT: &str = "etender-crawler/0.1";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const DATABASE_URL: &str = "sqlite:data/tender_crawler.db";
    pub const COLLECTION: &str = "tender";
    pub const DB_MAX_CONNECTIONS: u32 = 5;

    pub const MAX_CONCURRENT_DETAILS: usize = 10;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_FILE_NAME: &str = "etender-crawler.log";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.portal.index_url(),
            "https://etenders.gov.in/eprocure/app?page=FrontEndTendersByOrganisation&service=page"
        );
    }

    #[test]
    fn resolve_prefixes_relative_hrefs_only() {
        let portal = PortalConfig::default();
        assert_eq!(
            portal.resolve("/eprocure/app?x=1"),
            "https://etenders.gov.in/eprocure/app?x=1"
        );
        assert_eq!(portal.resolve("https://other.org/a"), "https://other.org/a");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = AppConfig::default();
        config.crawling.max_concurrent_details = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn base_url_must_parse() {
        let mut config = AppConfig::default();
        config.portal.base_url = "etenders.gov.in".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn collection_name_must_be_an_identifier() {
        let mut config = AppConfig::default();
        config.store.collection = "tender; DROP TABLE x".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{ "crawling": {{ "max_concurrent_details": 3 }}, "store": {{ "collection": "tenders_test" }} }}"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.crawling.max_concurrent_details, 3);
        assert_eq!(config.store.collection, "tenders_test");
        assert_eq!(config.portal.base_url, etenders::BASE_URL);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = AppConfig::load(Some(Path::new("/definitely/not/here.json")));
        assert!(result.is_err());
    }
}
