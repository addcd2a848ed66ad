//! Tender record entity
//!
//! A tender record is built transiently while a detail page is processed, then
//! either written once to the store or discarded as a duplicate.

use chrono::NaiveDateTime;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder stored in place of a missing or unparseable field
pub const NOT_AVAILABLE: &str = "NA";

/// Format used when a date-time value is written to a stored document
pub const STORED_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Canonical record keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TenderField {
    TenderReferenceNumber,
    TenderId,
    TenderValue,
    OrganisationChain,
    TenderTitle,
    TenderCategory,
    TenderType,
    GenTechEval,
    ItemtechEval,
    TwoStageBidding,
    MultiCurBoq,
    ProdCategory,
    SubCategory,
    BillValidity,
    WorkPeriod,
    Pincode,
    PublishedDate,
    BidOpeningDate,
    SaleStartDate,
    SaleEndDate,
    BidSubmissionStartDate,
    BidSubmissionEndDate,
    TenderFee,
    FeePayTo,
    FeePayAt,
    FeeExemptAllowed,
    EmdAmount,
    EmdFeeType,
    EmdPayTo,
    EmdPayAt,
    EmdExemptAllowed,
    EmdPercentage,
    WorkDescription,
}

impl TenderField {
    pub const ALL: [Self; 33] = [
        Self::TenderReferenceNumber,
        Self::TenderId,
        Self::TenderValue,
        Self::OrganisationChain,
        Self::TenderTitle,
        Self::TenderCategory,
        Self::TenderType,
        Self::GenTechEval,
        Self::ItemtechEval,
        Self::TwoStageBidding,
        Self::MultiCurBoq,
        Self::ProdCategory,
        Self::SubCategory,
        Self::BillValidity,
        Self::WorkPeriod,
        Self::Pincode,
        Self::PublishedDate,
        Self::BidOpeningDate,
        Self::SaleStartDate,
        Self::SaleEndDate,
        Self::BidSubmissionStartDate,
        Self::BidSubmissionEndDate,
        Self::TenderFee,
        Self::FeePayTo,
        Self::FeePayAt,
        Self::FeeExemptAllowed,
        Self::EmdAmount,
        Self::EmdFeeType,
        Self::EmdPayTo,
        Self::EmdPayAt,
        Self::EmdExemptAllowed,
        Self::EmdPercentage,
        Self::WorkDescription,
    ];

    /// Key used in stored documents
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::TenderReferenceNumber => "tender_reference_number",
            Self::TenderId => "tender_id",
            Self::TenderValue => "tender_value",
            Self::OrganisationChain => "organisation_chain",
            Self::TenderTitle => "tender_title",
            Self::TenderCategory => "tender_category",
            Self::TenderType => "tender_type",
            Self::GenTechEval => "gen_tech_eval",
            Self::ItemtechEval => "itemtech_eval",
            Self::TwoStageBidding => "two_stage_bidding",
            Self::MultiCurBoq => "multi_cur_boq",
            Self::ProdCategory => "prod_category",
            Self::SubCategory => "sub_category",
            Self::BillValidity => "bill_validity",
            Self::WorkPeriod => "work_period",
            Self::Pincode => "pincode",
            Self::PublishedDate => "published_date",
            Self::BidOpeningDate => "bid_opening_date",
            Self::SaleStartDate => "sale_start_date",
            Self::SaleEndDate => "sale_end_date",
            Self::BidSubmissionStartDate => "bid_submission_start_date",
            Self::BidSubmissionEndDate => "bid_submission_end_date",
            Self::TenderFee => "tender_fee",
            Self::FeePayTo => "fee_pay_to",
            Self::FeePayAt => "fee_pay_at",
            Self::FeeExemptAllowed => "fee_exempt_allowed",
            Self::EmdAmount => "emd_amount",
            Self::EmdFeeType => "emd_fee_type",
            Self::EmdPayTo => "emd_pay_to",
            Self::EmdPayAt => "emd_pay_at",
            Self::EmdExemptAllowed => "emd_exempt_allowed",
            Self::EmdPercentage => "emd_percentage",
            Self::WorkDescription => "work_description",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_key() == key)
    }

    pub const fn value_kind(self) -> ValueKind {
        match self {
            Self::TenderValue => ValueKind::Integer,
            Self::PublishedDate
            | Self::BidOpeningDate
            | Self::SaleStartDate
            | Self::SaleEndDate
            | Self::BidSubmissionStartDate
            | Self::BidSubmissionEndDate => ValueKind::DateTime,
            _ => ValueKind::Text,
        }
    }
}

impl fmt::Display for TenderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

/// Typed value of a single record field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    DateTime(NaiveDateTime),
    Integer(i64),
    Text(String),
    /// Serialised as the `"NA"` sentinel
    NotAvailable,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub const fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    pub const fn is_not_available(&self) -> bool {
        matches!(self, Self::NotAvailable)
    }

    /// String form used for key columns and text search
    pub fn to_plain_string(&self) -> String {
        match self {
            Self::DateTime(value) => value.format(STORED_DATETIME_FORMAT).to_string(),
            Self::Integer(value) => value.to_string(),
            Self::Text(text) => text.clone(),
            Self::NotAvailable => NOT_AVAILABLE.to_string(),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::DateTime(value) => {
                serializer.collect_str(&value.format(STORED_DATETIME_FORMAT))
            }
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Text(text) => serializer.serialize_str(text),
            Self::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

/// Stored value shape of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    DateTime,
}

/// Decodes a stored value by the declared kind of its field
struct TypedValue(ValueKind);

impl<'de> DeserializeSeed<'de> for TypedValue {
    type Value = FieldValue;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<FieldValue, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl Visitor<'_> for TypedValue {
    type Value = FieldValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ValueKind::Text => f.write_str("a text value"),
            ValueKind::Integer => f.write_str("an integer"),
            ValueKind::DateTime => write!(f, "a date-time formatted as {STORED_DATETIME_FORMAT}"),
        }
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<FieldValue, E> {
        match self.0 {
            ValueKind::Integer => Ok(FieldValue::Integer(value)),
            ValueKind::Text => Ok(FieldValue::Text(value.to_string())),
            ValueKind::DateTime => Err(E::invalid_type(de::Unexpected::Signed(value), &self)),
        }
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<FieldValue, E> {
        let signed = i64::try_from(value)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(value), &self))?;
        self.visit_i64(signed)
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<FieldValue, E> {
        if value == NOT_AVAILABLE {
            return Ok(FieldValue::NotAvailable);
        }
        match self.0 {
            ValueKind::Text => Ok(FieldValue::Text(value.to_string())),
            ValueKind::Integer => value
                .parse()
                .map(FieldValue::Integer)
                .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self)),
            ValueKind::DateTime => NaiveDateTime::parse_from_str(value, STORED_DATETIME_FORMAT)
                .map(FieldValue::DateTime)
                .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self)),
        }
    }
}

/// Natural key of a tender: (`tender_id`, `tender_reference_number`)
///
/// A missing half is `None` and matches another missing half.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TenderKey {
    pub tender_id: Option<String>,
    pub tender_reference_number: Option<String>,
}

impl TenderKey {
    pub fn new(tender_id: impl Into<String>, tender_reference_number: impl Into<String>) -> Self {
        Self {
            tender_id: Some(tender_id.into()),
            tender_reference_number: Some(tender_reference_number.into()),
        }
    }

    /// Column value for the id half; an empty string stands for "missing"
    pub fn tender_id_column(&self) -> &str {
        self.tender_id.as_deref().unwrap_or_default()
    }

    /// Column value for the reference half; an empty string stands for "missing"
    pub fn reference_number_column(&self) -> &str {
        self.tender_reference_number.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for TenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {}",
            self.tender_id.as_deref().unwrap_or("<none>"),
            self.tender_reference_number.as_deref().unwrap_or("<none>")
        )
    }
}

/// A tender harvested from one detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenderRecord {
    fields: BTreeMap<TenderField, FieldValue>,
    tender_url: String,
}

impl TenderRecord {
    pub fn new(tender_url: impl Into<String>) -> Self {
        Self {
            fields: BTreeMap::new(),
            tender_url: tender_url.into(),
        }
    }

    pub fn from_fields(
        fields: BTreeMap<TenderField, FieldValue>,
        tender_url: impl Into<String>,
    ) -> Self {
        Self {
            fields,
            tender_url: tender_url.into(),
        }
    }

    pub fn tender_url(&self) -> &str {
        &self.tender_url
    }

    pub fn set(&mut self, field: TenderField, value: FieldValue) {
        self.fields.insert(field, value);
    }

    pub fn get(&self, field: TenderField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn text(&self, field: TenderField) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn fields(&self) -> impl Iterator<Item = (TenderField, &FieldValue)> {
        self.fields.iter().map(|(field, value)| (*field, value))
    }

    /// Number of mapped fields, `tender_url` excluded
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no field was mapped from the page
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn key(&self) -> TenderKey {
        let component = |field| self.get(field).map(FieldValue::to_plain_string);
        TenderKey {
            tender_id: component(TenderField::TenderId),
            tender_reference_number: component(TenderField::TenderReferenceNumber),
        }
    }
}

impl Serialize for TenderRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        for (field, value) in &self.fields {
            map.serialize_entry(field.as_key(), value)?;
        }
        map.serialize_entry("tender_url", &self.tender_url)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for TenderRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = TenderRecord;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a tender document")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TenderRecord, A::Error> {
                let mut fields = BTreeMap::new();
                let mut tender_url = None;

                while let Some(key) = access.next_key::<String>()? {
                    if key == "tender_url" {
                        tender_url = Some(access.next_value::<String>()?);
                    } else if let Some(field) = TenderField::from_key(&key) {
                        let value = access.next_value_seed(TypedValue(field.value_kind()))?;
                        fields.insert(field, value);
                    } else {
                        // store metadata such as the document id
                        access.next_value::<de::IgnoredAny>()?;
                    }
                }

                let tender_url = tender_url.ok_or_else(|| de::Error::missing_field("tender_url"))?;
                Ok(TenderRecord { fields, tender_url })
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_record() -> TenderRecord {
        let mut record = TenderRecord::new("https://etenders.gov.in/eprocure/app?x=1");
        record.set(TenderField::TenderId, FieldValue::Text("2024_MES_123_1".into()));
        record.set(TenderField::TenderReferenceNumber, FieldValue::Text("CE/DLI/07".into()));
        record.set(TenderField::TenderValue, FieldValue::Integer(1_234_567));
        record.set(
            TenderField::PublishedDate,
            FieldValue::DateTime(
                NaiveDate::from_ymd_opt(2024, 1, 5)
                    .unwrap()
                    .and_hms_opt(14, 30, 0)
                    .unwrap(),
            ),
        );
        record.set(TenderField::Pincode, FieldValue::NotAvailable);
        record
    }

    #[test]
    fn field_keys_are_unique_and_resolvable() {
        for field in TenderField::ALL {
            assert_eq!(TenderField::from_key(field.as_key()), Some(field));
        }
        assert_eq!(TenderField::from_key("tender_url"), None);
    }

    #[test]
    fn record_serialises_to_flat_document() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["tender_id"], "2024_MES_123_1");
        assert_eq!(json["tender_value"], 1_234_567);
        assert_eq!(json["published_date"], "2024-01-05T14:30:00");
        assert_eq!(json["pincode"], "NA");
        assert_eq!(json["tender_url"], "https://etenders.gov.in/eprocure/app?x=1");
    }

    #[test]
    fn stored_document_reads_back_with_types() {
        let json = serde_json::json!({
            "id": "ignored",
            "tender_id": "2024_MES_123_1",
            "tender_reference_number": "CE/DLI/07",
            "tender_value": 1_234_567,
            "published_date": "2024-01-05T14:30:00",
            "pincode": "NA",
            "tender_url": "https://etenders.gov.in/eprocure/app?x=1"
        });
        let record: TenderRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record, sample_record());
    }

    #[test]
    fn date_shaped_text_stays_text() {
        let mut record = TenderRecord::new("https://etenders.gov.in/eprocure/app?x=2");
        record.set(
            TenderField::WorkDescription,
            FieldValue::Text("2024-01-05T14:30:00".into()),
        );
        record.set(TenderField::TenderId, FieldValue::Text("42".into()));

        let json = serde_json::to_string(&record).unwrap();
        let back: TenderRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn values_decode_by_field_kind() {
        let json = serde_json::json!({
            "tender_id": 77,
            "tender_value": "5000",
            "bid_opening_date": "NA",
            "tender_url": "https://etenders.gov.in/eprocure/app?x=3"
        });
        let record: TenderRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.text(TenderField::TenderId), Some("77"));
        assert_eq!(record.get(TenderField::TenderValue), Some(&FieldValue::Integer(5000)));
        assert_eq!(record.get(TenderField::BidOpeningDate), Some(&FieldValue::NotAvailable));
    }

    #[test]
    fn malformed_date_is_rejected() {
        let json = serde_json::json!({
            "published_date": "yesterday",
            "tender_url": "https://etenders.gov.in/eprocure/app?x=4"
        });
        assert!(serde_json::from_value::<TenderRecord>(json).is_err());
    }

    #[test]
    fn document_without_url_is_rejected() {
        let json = serde_json::json!({ "tender_id": "1" });
        assert!(serde_json::from_value::<TenderRecord>(json).is_err());
    }

    #[test]
    fn key_uses_both_identity_fields() {
        let key = sample_record().key();
        assert_eq!(key, TenderKey::new("2024_MES_123_1", "CE/DLI/07"));

        let bare = TenderRecord::new("https://example.org");
        assert_eq!(bare.key(), TenderKey::default());
        assert_eq!(bare.key().tender_id_column(), "");
        assert!(bare.is_empty());
    }
}
