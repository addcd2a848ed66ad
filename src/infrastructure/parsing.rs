//! HTML parsing for the procurement portal
//!
//! Link extraction for the index and listing pages, and caption/field
//! extraction plus label mapping for tender detail pages.

pub mod context;
pub mod error;
pub mod field_mapper;
pub mod link_parser;
pub mod tender_detail_parser;

// Re-export public types
pub use context::DetailParseContext;
pub use error::{ParsingError, ParsingResult};
pub use field_mapper::{FieldMapper, LabelMatching};
pub use link_parser::{LinkParser, OrganisationLink};
pub use tender_detail_parser::TenderDetailParser;

use scraper::{ElementRef, Html};

/// Parser trait with context support
pub trait ContextualParser {
    type Output;
    type Context;

    /// Parse HTML with contextual information
    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output>;
}

/// Visible text of an element: text nodes trimmed, blanks dropped, joined by a space
pub fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
