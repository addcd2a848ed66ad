//! Domain module - tender entity and persistence interfaces
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod repositories;
pub mod tender;

pub use repositories::{
    CategoryGroup, InsertOutcome, StoreError, StoreResult, TenderHighlights, TenderRepository,
    TenderSearchCriteria,
};
pub use tender::{FieldValue, NOT_AVAILABLE, TenderField, TenderKey, TenderRecord, ValueKind};
