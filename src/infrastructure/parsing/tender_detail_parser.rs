//! Tender detail page parser
//!
//! Detail pages lay out each attribute as a `td.td_caption` label cell followed
//! by a sibling `td.td_field` value cell.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::context::DetailParseContext;
use super::field_mapper::{FieldMapper, LabelMatching};
use super::{ContextualParser, ParsingResult, element_text};
use crate::domain::tender::TenderRecord;
use crate::infrastructure::config::etenders;
use crate::infrastructure::parsing_error::compile_selector;

pub struct TenderDetailParser {
    caption_selector: Selector,
    mapper: FieldMapper,
}

impl TenderDetailParser {
    pub fn new(matching: LabelMatching) -> ParsingResult<Self> {
        Ok(Self {
            caption_selector: compile_selector(&format!("td.{}", etenders::CAPTION_CLASS))?,
            mapper: FieldMapper::new(matching),
        })
    }

    /// All caption/value pairs on the page, in document order
    pub fn extract_pairs(&self, html: &Html) -> Vec<(String, String)> {
        html.select(&self.caption_selector)
            .filter_map(|caption| {
                let value = next_field_cell(caption)?;
                Some((element_text(&caption), element_text(&value)))
            })
            .collect()
    }
}

/// First following sibling `td` carrying the field class
fn next_field_cell(caption: ElementRef<'_>) -> Option<ElementRef<'_>> {
    caption
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| {
            sibling.value().name() == "td"
                && sibling
                    .value()
                    .classes()
                    .any(|class| class == etenders::FIELD_CLASS)
        })
}

impl ContextualParser for TenderDetailParser {
    type Output = TenderRecord;
    type Context = DetailParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output> {
        let pairs = self.extract_pairs(html);
        debug!("Found {} caption/field pairs on {}", pairs.len(), context.url);

        let fields = self
            .mapper
            .map_pairs(pairs.iter().map(|(label, value)| (label.as_str(), value.as_str())));

        Ok(TenderRecord::from_fields(fields, context.url.clone()))
    }
}
