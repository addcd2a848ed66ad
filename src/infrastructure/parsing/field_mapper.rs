//! Label → field mapping for tender detail pages
//!
//! Each portal label maps to one canonical [`TenderField`] and a coercion
//! rule. Coercion never fails: malformed input falls back to `"NA"` (dates,
//! text) or `0` (currency) and is logged.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::domain::tender::{FieldValue, NOT_AVAILABLE, TenderField};

/// Date-time format used by the portal, e.g. `05-Jan-2024 02:30 PM`
pub const PORTAL_DATE_FORMAT: &str = "%d-%b-%Y %I:%M %p";

/// How a page label is matched against the label table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMatching {
    /// Exact lookup against the full table
    #[default]
    Exact,
    /// Containment lookup against the reduced five-label table.
    /// More permissive: any label containing e.g. "Title" matches.
    Substring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Date,
    Currency,
    Text,
}

#[derive(Debug, Clone, Copy)]
pub struct LabelRule {
    pub label: &'static str,
    pub field: TenderField,
    pub coercion: Coercion,
}

const fn rule(label: &'static str, field: TenderField, coercion: Coercion) -> LabelRule {
    LabelRule {
        label,
        field,
        coercion,
    }
}

/// Every label the detail page is known to carry
pub const LABEL_TABLE: &[LabelRule] = &[
    rule("Tender Reference Number", TenderField::TenderReferenceNumber, Coercion::Text),
    rule("Tender ID", TenderField::TenderId, Coercion::Text),
    rule("Tender Value in ₹", TenderField::TenderValue, Coercion::Currency),
    rule("Organisation Chain", TenderField::OrganisationChain, Coercion::Text),
    rule("Title", TenderField::TenderTitle, Coercion::Text),
    rule("Tender Category", TenderField::TenderCategory, Coercion::Text),
    rule("Tender Type", TenderField::TenderType, Coercion::Text),
    rule("General Technical Evaluation Allowed", TenderField::GenTechEval, Coercion::Text),
    rule("ItemWise Technical Evaluation Allowed", TenderField::ItemtechEval, Coercion::Text),
    rule("Allow Two Stage Bidding", TenderField::TwoStageBidding, Coercion::Text),
    rule("Is Multi Currency Allowed For BOQ", TenderField::MultiCurBoq, Coercion::Text),
    rule("Product Category", TenderField::ProdCategory, Coercion::Text),
    rule("Sub category", TenderField::SubCategory, Coercion::Text),
    rule("Bid Validity(Days)", TenderField::BillValidity, Coercion::Text),
    rule("Period Of Work(Days)", TenderField::WorkPeriod, Coercion::Text),
    rule("Pincode", TenderField::Pincode, Coercion::Text),
    rule("Published Date", TenderField::PublishedDate, Coercion::Date),
    rule("Bid Opening Date", TenderField::BidOpeningDate, Coercion::Date),
    rule("Document Download / Sale Start Date", TenderField::SaleStartDate, Coercion::Date),
    rule("Document Download / Sale End Date", TenderField::SaleEndDate, Coercion::Date),
    rule("Bid Submission Start Date", TenderField::BidSubmissionStartDate, Coercion::Date),
    rule("Bid Submission End Date", TenderField::BidSubmissionEndDate, Coercion::Date),
    rule("Tender Fee in ₹", TenderField::TenderFee, Coercion::Text),
    rule("Fee Payable To", TenderField::FeePayTo, Coercion::Text),
    rule("Fee Payable At", TenderField::FeePayAt, Coercion::Text),
    rule("Tender Fee Exemption Allowed", TenderField::FeeExemptAllowed, Coercion::Text),
    rule("EMD Amount in ₹", TenderField::EmdAmount, Coercion::Text),
    rule("EMD Fee Type", TenderField::EmdFeeType, Coercion::Text),
    rule("EMD Payable To", TenderField::EmdPayTo, Coercion::Text),
    rule("EMD Payable At", TenderField::EmdPayAt, Coercion::Text),
    rule("EMD Exemption Allowed", TenderField::EmdExemptAllowed, Coercion::Text),
    rule("EMD Percentage", TenderField::EmdPercentage, Coercion::Text),
    rule("Work Description", TenderField::WorkDescription, Coercion::Text),
];

/// Reduced table used with [`LabelMatching::Substring`]; first match wins
pub const REDUCED_LABEL_TABLE: &[LabelRule] = &[
    rule("Tender Reference Number", TenderField::TenderReferenceNumber, Coercion::Text),
    rule("Tender ID", TenderField::TenderId, Coercion::Text),
    rule("Bid Submission End Date", TenderField::BidSubmissionEndDate, Coercion::Date),
    rule("Tender Value", TenderField::TenderValue, Coercion::Currency),
    rule("Title", TenderField::TenderTitle, Coercion::Text),
];

/// Maps (label, raw text) pairs onto canonical tender fields
#[derive(Debug, Clone, Copy)]
pub struct FieldMapper {
    matching: LabelMatching,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new(LabelMatching::Exact)
    }
}

impl FieldMapper {
    pub const fn new(matching: LabelMatching) -> Self {
        Self { matching }
    }

    /// Find the rule for a page label, if any
    pub fn rule_for(&self, label: &str) -> Option<&'static LabelRule> {
        match self.matching {
            LabelMatching::Exact => LABEL_TABLE.iter().find(|rule| rule.label == label),
            LabelMatching::Substring => REDUCED_LABEL_TABLE
                .iter()
                .find(|rule| label.contains(rule.label)),
        }
    }

    /// Map label/value pairs; unmapped labels are ignored, later duplicates win
    pub fn map_pairs<'a, I>(&self, pairs: I) -> BTreeMap<TenderField, FieldValue>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut fields = BTreeMap::new();
        for (label, raw) in pairs {
            match self.rule_for(label) {
                Some(rule) => {
                    fields.insert(rule.field, coerce(rule.coercion, rule.field, raw));
                }
                None => debug!("Ignoring unmapped label: {}", label),
            }
        }
        fields
    }
}

/// Apply a coercion rule to raw cell text
pub fn coerce(coercion: Coercion, field: TenderField, raw: &str) -> FieldValue {
    match coercion {
        Coercion::Date => parse_portal_date(field, raw),
        Coercion::Currency => parse_currency(field, raw),
        Coercion::Text => parse_text(raw),
    }
}

fn parse_portal_date(field: TenderField, raw: &str) -> FieldValue {
    let raw = raw.trim();
    if raw.is_empty() || raw == NOT_AVAILABLE {
        return FieldValue::NotAvailable;
    }

    match NaiveDateTime::parse_from_str(raw, PORTAL_DATE_FORMAT) {
        Ok(value) => FieldValue::DateTime(value),
        Err(e) => {
            warn!("Unparseable date for {}: '{}' ({})", field, raw, e);
            FieldValue::NotAvailable
        }
    }
}

/// Thousands separators are removed and the fractional part is dropped
fn parse_currency(field: TenderField, raw: &str) -> FieldValue {
    let raw = raw.trim();
    if raw.is_empty() || raw == NOT_AVAILABLE {
        return FieldValue::Integer(0);
    }

    let whole = raw.split('.').next().unwrap_or_default();
    let digits: String = whole.chars().filter(|c| *c != ',').collect();

    match digits.parse::<i64>() {
        Ok(value) => FieldValue::Integer(value),
        Err(e) => {
            warn!("Non-numeric amount for {}: '{}' ({})", field, raw, e);
            FieldValue::Integer(0)
        }
    }
}

fn parse_text(raw: &str) -> FieldValue {
    let raw = raw.trim();
    if raw.is_empty() || raw == NOT_AVAILABLE {
        FieldValue::NotAvailable
    } else {
        FieldValue::Text(raw.to_string())
    }
}
