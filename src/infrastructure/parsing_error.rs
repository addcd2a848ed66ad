//! Parsing error types for portal HTML extraction

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ParsingError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },
}

impl ParsingError {
    /// Create an invalid selector error
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;

/// Compile a CSS selector, mapping the scraper error into [`ParsingError`]
pub fn compile_selector(selector: &str) -> ParsingResult<scraper::Selector> {
    scraper::Selector::parse(selector)
        .map_err(|e| ParsingError::invalid_selector(selector, e))
}
