//! Infrastructure layer: configuration, logging, HTTP, HTML parsing and storage

pub mod config;
pub mod database_connection;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod parsing_error;
pub mod tender_repository;

// Re-export commonly used items
pub use self::config::{AppConfig, ConfigError};
pub use database_connection::DatabaseConnection;
pub use http_client::{FetchedPage, HttpClient, PageFetcher, SessionToken};
pub use logging::{get_log_directory, init_logging_with_config, log_system_info};
pub use parsing::{LinkParser, ParsingError, ParsingResult, TenderDetailParser};
pub use tender_repository::SqliteTenderRepository;
