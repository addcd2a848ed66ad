//! Organisation and tender link discovery
//!
//! The index page issues the session cookie and lists one anchor per
//! organisation, its text being that organisation's tender count. Each
//! organisation's listing page links to the individual tender details.

use scraper::Html;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::CrawlError;
use crate::infrastructure::config::PortalConfig;
use crate::infrastructure::http_client::{PageFetcher, SessionToken};
use crate::infrastructure::parsing::{LinkParser, OrganisationLink};

/// Result of a discovery pass
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub session_token: SessionToken,
    /// Organisation anchors found on the index page
    pub org_count: u64,
    /// Sum of the organisation anchor texts; not the number of links found
    pub individual_tender_count: u64,
    /// Detail-page hrefs in discovery order, unresolved
    pub detail_links: Vec<String>,
}

pub struct LinkDiscoverer {
    fetcher: Arc<dyn PageFetcher>,
    portal: PortalConfig,
    parser: LinkParser,
}

impl LinkDiscoverer {
    pub fn new(fetcher: Arc<dyn PageFetcher>, portal: PortalConfig) -> Result<Self, CrawlError> {
        let parser = LinkParser::new(portal.detail_link_marker.clone())?;
        Ok(Self {
            fetcher,
            portal,
            parser,
        })
    }

    /// Fetch the index, then each organisation listing in turn
    ///
    /// Fails only when the index page itself cannot be used. A listing that
    /// fails contributes no links.
    pub async fn discover(&self) -> Result<DiscoveryReport, CrawlError> {
        let index_url = self.portal.index_url();
        info!("Fetching organisation index: {}", index_url);

        let index = self
            .fetcher
            .fetch(&index_url, None)
            .await
            .map_err(|e| CrawlError::transport(&index_url, &e))?;

        if !index.is_success() {
            return Err(CrawlError::Http {
                status: index.status,
                url: index_url,
            });
        }

        let session_token = index
            .session_token
            .clone()
            .ok_or_else(|| CrawlError::MissingSessionToken {
                url: index_url.clone(),
                cookie: self.portal.session_cookie.clone(),
            })?;

        let organisations = self
            .parser
            .organisation_links(&Html::parse_document(&index.body));

        let org_count = organisations.len() as u64;
        let individual_tender_count = organisations
            .iter()
            .fold(0u64, |total, org| total.saturating_add(org.tender_count));
        info!(
            "Found {} organisations listing {} tenders",
            org_count, individual_tender_count
        );

        let mut detail_links = Vec::new();
        for organisation in &organisations {
            let links = self.listing_links(organisation, &session_token).await;
            detail_links.extend(links);
        }

        info!("Discovered {} tender detail links", detail_links.len());
        Ok(DiscoveryReport {
            session_token,
            org_count,
            individual_tender_count,
            detail_links,
        })
    }

    /// Detail links on one organisation's listing page; empty on any failure
    async fn listing_links(
        &self,
        organisation: &OrganisationLink,
        session: &SessionToken,
    ) -> Vec<String> {
        let url = self.portal.resolve(&organisation.href);

        let page = match self.fetcher.fetch(&url, Some(session)).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Skipping organisation listing {}: {:#}", url, e);
                return Vec::new();
            }
        };
        if !page.is_success() {
            warn!("Skipping organisation listing {}: HTTP {}", url, page.status);
            return Vec::new();
        }

        let links = self
            .parser
            .tender_detail_links(&Html::parse_document(&page.body));
        debug!(
            "{} detail links on {} (advertised {})",
            links.len(),
            url,
            organisation.tender_count
        );
        links
    }
}
