//! Parsing context for tender detail pages

/// Detail parsing context for tender detail pages
#[derive(Debug, Clone)]
pub struct DetailParseContext {
    /// Fully-qualified URL of the page being parsed; becomes `tender_url`
    pub url: String,
}

impl DetailParseContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}
