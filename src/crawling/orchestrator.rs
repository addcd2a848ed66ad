//! # Crawl Orchestrator
//!
//! Runs discovery, then fans detail fetches out over spawned tasks gated by a
//! semaphore, and tallies their outcomes once every task has finished.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use super::detail_fetcher::{DetailFetcher, DetailOutcome};
use super::link_discoverer::LinkDiscoverer;
use super::CrawlError;
use crate::domain::repositories::TenderRepository;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http_client::PageFetcher;

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub org_count: u64,
    pub individual_tender_count: u64,
    pub links_scheduled: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub empty: usize,
    pub failed: usize,
}

impl CrawlSummary {
    pub fn record(&mut self, outcome: DetailOutcome) {
        match outcome {
            DetailOutcome::Inserted => self.inserted += 1,
            DetailOutcome::Duplicate => self.duplicates += 1,
            DetailOutcome::Empty => self.empty += 1,
            DetailOutcome::Failed => self.failed += 1,
        }
    }

    /// Links that reached an outcome; equals `links_scheduled` after a run
    pub fn processed(&self) -> usize {
        self.inserted + self.duplicates + self.empty + self.failed
    }
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "organisations={} advertised_tenders={} links={} inserted={} duplicates={} empty={} failed={}",
            self.org_count,
            self.individual_tender_count,
            self.links_scheduled,
            self.inserted,
            self.duplicates,
            self.empty,
            self.failed
        )
    }
}

pub struct CrawlOrchestrator {
    discoverer: LinkDiscoverer,
    detail_fetcher: Arc<DetailFetcher>,
    max_concurrent: usize,
}

impl CrawlOrchestrator {
    /// Both collaborators are shared by every task of a run
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        repository: Arc<dyn TenderRepository>,
        config: &AppConfig,
    ) -> Result<Self, CrawlError> {
        let discoverer = LinkDiscoverer::new(Arc::clone(&fetcher), config.portal.clone())?;
        let detail_fetcher = DetailFetcher::new(fetcher, repository, config.portal.clone())?;

        Ok(Self {
            discoverer,
            detail_fetcher: Arc::new(detail_fetcher),
            max_concurrent: config.crawling.max_concurrent_details.max(1),
        })
    }

    pub async fn run(&self) -> Result<CrawlSummary, CrawlError> {
        let started = Instant::now();
        let report = self.discoverer.discover().await?;

        let mut summary = CrawlSummary {
            org_count: report.org_count,
            individual_tender_count: report.individual_tender_count,
            links_scheduled: report.detail_links.len(),
            ..Default::default()
        };

        info!(
            "Scheduling {} detail fetches (max {} in flight)",
            summary.links_scheduled, self.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let session = Arc::new(report.session_token);
        let mut tasks = Vec::with_capacity(report.detail_links.len());

        for href in report.detail_links {
            let semaphore = Arc::clone(&semaphore);
            let session = Arc::clone(&session);
            let detail_fetcher = Arc::clone(&self.detail_fetcher);

            tasks.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        error!("Failed to acquire semaphore permit for {}", href);
                        return DetailOutcome::Failed;
                    }
                };
                debug!("Fetching tender detail {}", href);
                detail_fetcher.fetch(&href, &session).await
            }));
        }

        for result in futures::future::join_all(tasks).await {
            match result {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    error!("Detail task aborted: {}", e);
                    summary.record(DetailOutcome::Failed);
                }
            }
        }

        info!(
            "Crawl finished in {:.1}s: {}",
            started.elapsed().as_secs_f64(),
            summary
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_tallies_each_outcome() {
        let mut summary = CrawlSummary {
            links_scheduled: 5,
            ..Default::default()
        };
        for outcome in [
            DetailOutcome::Inserted,
            DetailOutcome::Inserted,
            DetailOutcome::Duplicate,
            DetailOutcome::Empty,
            DetailOutcome::Failed,
        ] {
            summary.record(outcome);
        }

        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.empty, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed(), summary.links_scheduled);
    }
}
