//! eTender Crawler - harvests tender listings from the eProcurement portal
//!
//! The crawler walks the portal's organisation index, collects the tender
//! detail links of every organisation and stores each tender once, keyed by
//! its tender id and reference number.

pub mod crawling;
pub mod domain;
pub mod infrastructure;

pub use crawling::{CrawlError, CrawlOrchestrator, CrawlSummary};
pub use infrastructure::config::AppConfig;
