//! Tender detail page processing

use scraper::Html;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::CrawlError;
use crate::domain::repositories::{InsertOutcome, TenderRepository};
use crate::domain::tender::TenderRecord;
use crate::infrastructure::config::PortalConfig;
use crate::infrastructure::http_client::{PageFetcher, SessionToken};
use crate::infrastructure::parsing::{ContextualParser, DetailParseContext, TenderDetailParser};

/// What happened to one detail link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailOutcome {
    Inserted,
    /// A tender with the same natural key was already stored
    Duplicate,
    /// The page yielded no mapped fields
    Empty,
    Failed,
}

pub struct DetailFetcher {
    fetcher: Arc<dyn PageFetcher>,
    repository: Arc<dyn TenderRepository>,
    portal: PortalConfig,
    parser: TenderDetailParser,
}

impl DetailFetcher {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        repository: Arc<dyn TenderRepository>,
        portal: PortalConfig,
    ) -> Result<Self, CrawlError> {
        let parser = TenderDetailParser::new(portal.label_matching)?;
        Ok(Self {
            fetcher,
            repository,
            portal,
            parser,
        })
    }

    /// Fetch, parse and store one detail page; errors are logged, never returned
    pub async fn fetch(&self, href: &str, session: &SessionToken) -> DetailOutcome {
        let url = self.portal.resolve(href);
        match self.try_fetch(&url, session).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Tender detail {} failed: {}", url, e);
                DetailOutcome::Failed
            }
        }
    }

    async fn try_fetch(&self, url: &str, session: &SessionToken) -> Result<DetailOutcome, CrawlError> {
        let page = self
            .fetcher
            .fetch(url, Some(session))
            .await
            .map_err(|e| CrawlError::transport(url, &e))?;

        if !page.is_success() {
            return Err(CrawlError::Http {
                status: page.status,
                url: url.to_string(),
            });
        }

        let record = self.parse(&page.body, url)?;
        if record.is_empty() {
            debug!("No tender fields on {}", url);
            return Ok(DetailOutcome::Empty);
        }

        let key = record.key();
        match self.repository.insert_if_absent(&record).await? {
            InsertOutcome::Inserted => {
                info!("Stored tender {}", key);
                Ok(DetailOutcome::Inserted)
            }
            InsertOutcome::Duplicate => {
                info!("Tender {} already stored, skipping", key);
                Ok(DetailOutcome::Duplicate)
            }
        }
    }

    fn parse(&self, body: &str, url: &str) -> Result<TenderRecord, CrawlError> {
        let html = Html::parse_document(body);
        let record = self
            .parser
            .parse_with_context(&html, &DetailParseContext::new(url))?;
        Ok(record)
    }
}
