//! # Crawling pipeline
//!
//! Index page → organisation listings → tender detail pages → store.
//!
//! - [`link_discoverer`]: session negotiation and link discovery
//! - [`detail_fetcher`]: one detail page to zero or one stored tender
//! - [`orchestrator`]: bounded fan-out over the discovered links

use thiserror::Error;

use crate::domain::repositories::StoreError;
use crate::infrastructure::parsing::ParsingError;

pub mod detail_fetcher;
pub mod link_discoverer;
pub mod orchestrator;

pub use detail_fetcher::{DetailFetcher, DetailOutcome};
pub use link_discoverer::{DiscoveryReport, LinkDiscoverer};
pub use orchestrator::{CrawlOrchestrator, CrawlSummary};

/// Crawl failures
///
/// Only discovery errors end a run; per-page errors are logged and counted.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Response from {url} did not set the {cookie} session cookie")]
    MissingSessionToken { url: String, cookie: String },

    #[error(transparent)]
    Parsing(#[from] ParsingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CrawlError {
    pub(crate) fn transport(url: &str, error: &anyhow::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: format!("{error:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_keeps_context_chain() {
        let error = anyhow::anyhow!("connection reset").context("Failed to fetch URL: x");
        let crawl_error = CrawlError::transport("https://etenders.gov.in/x", &error);
        assert_eq!(
            crawl_error.to_string(),
            "Request to https://etenders.gov.in/x failed: Failed to fetch URL: x: connection reset"
        );
    }
}
