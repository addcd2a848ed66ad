//! Anchor extraction for the organisation index and listing pages

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{ParsingResult, element_text};
use crate::infrastructure::parsing_error::compile_selector;

/// An organisation anchor on the index page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationLink {
    pub href: String,
    /// Tender count shown as the anchor text
    pub tender_count: u64,
}

pub struct LinkParser {
    anchor_selector: Selector,
    detail_link_marker: String,
}

impl LinkParser {
    pub fn new(detail_link_marker: impl Into<String>) -> ParsingResult<Self> {
        Ok(Self {
            anchor_selector: compile_selector("a[href]")?,
            detail_link_marker: detail_link_marker.into(),
        })
    }

    /// Anchors whose visible text is made only of digits
    pub fn organisation_links(&self, html: &Html) -> Vec<OrganisationLink> {
        html.select(&self.anchor_selector)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                let text = element_text(&anchor);
                if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                match text.parse::<u64>() {
                    Ok(tender_count) => Some(OrganisationLink {
                        href: href.to_string(),
                        tender_count,
                    }),
                    Err(e) => {
                        warn!("Skipping organisation link with count '{}': {}", text, e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Hrefs of direct tender-detail links, in document order
    pub fn tender_detail_links(&self, html: &Html) -> Vec<String> {
        html.select(&self.anchor_selector)
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter(|href| href.contains(&self.detail_link_marker))
            .map(ToString::to_string)
            .collect()
    }
}
