//! Form validation, status assessment and the submitted record.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::category::Category;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw form input, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pub vendor: String,
    pub batch: String,
    pub supply_date: String,
    pub warranty: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no valid category selected")]
    MissingCategory,
    #[error("vendor is empty")]
    EmptyVendor,
    #[error("batch is empty")]
    EmptyBatch,
    #[error("warranty must be a positive whole number of years, got {0:?}")]
    InvalidWarranty(String),
    #[error("supply date is missing")]
    MissingSupplyDate,
    #[error("supply date must be YYYY-MM-DD, got {0:?}")]
    InvalidSupplyDate(String),
}

/// Form input that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub category: Category,
    pub vendor: String,
    pub batch: String,
    pub supply_date: NaiveDate,
    pub warranty_years: u32,
}

/// Checks the form before anything is consumed.
pub fn validate(
    category: Option<Category>,
    fields: &FormFields,
) -> Result<ValidatedForm, ValidationError> {
    let category = category.ok_or(ValidationError::MissingCategory)?;

    let vendor = fields.vendor.trim();
    if vendor.is_empty() {
        return Err(ValidationError::EmptyVendor);
    }
    let batch = fields.batch.trim();
    if batch.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }

    let warranty_years = match fields.warranty.trim().parse::<i64>() {
        Ok(n) if n > 0 => u32::try_from(n)
            .map_err(|_| ValidationError::InvalidWarranty(fields.warranty.clone()))?,
        _ => return Err(ValidationError::InvalidWarranty(fields.warranty.clone())),
    };

    let date = fields.supply_date.trim();
    if date.is_empty() {
        return Err(ValidationError::MissingSupplyDate);
    }
    let supply_date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidSupplyDate(fields.supply_date.clone()))?;

    Ok(ValidatedForm {
        category,
        vendor: vendor.to_string(),
        batch: batch.to_string(),
        supply_date,
        warranty_years,
    })
}

/// Client-side inspection hint attached to each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Expired,
    UnverifiedVendor,
    Valid,
}

impl Status {
    pub fn message(self) -> &'static str {
        match self {
            Status::Expired => "Expired - Replace immediately.",
            Status::UnverifiedVendor => "Unverified Vendor - Extra inspection needed.",
            Status::Valid => "Valid - No issue detected.",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.message())
    }
}

/// Year granularity: a warranty runs through the end of `supply_year + years`.
/// Expiry wins over the vendor check.
pub fn assess(form: &ValidatedForm, today: NaiveDate, unverified_vendor: &str) -> Status {
    let expiry_year = i64::from(form.supply_date.year()) + i64::from(form.warranty_years);
    if i64::from(today.year()) > expiry_year {
        Status::Expired
    } else if form.vendor == unverified_vendor {
        Status::UnverifiedVendor
    } else {
        Status::Valid
    }
}

fn serialize_date<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format(DATE_FORMAT))
}

fn serialize_timestamp<S: Serializer>(
    timestamp: &NaiveDateTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
}

fn serialize_warranty<S: Serializer>(years: &u32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{years} Years"))
}

/// One submitted inventory item. Field names match the spreadsheet columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    #[serde(rename = "QR_ID")]
    pub identifier: String,
    #[serde(rename = "Type")]
    pub category: Category,
    #[serde(rename = "Vendor")]
    pub vendor: String,
    #[serde(rename = "Batch")]
    pub batch: String,
    #[serde(rename = "Supply_Date", serialize_with = "serialize_date")]
    pub supply_date: NaiveDate,
    #[serde(rename = "Warranty", serialize_with = "serialize_warranty")]
    pub warranty_years: u32,
    #[serde(rename = "Status")]
    pub status: Status,
    #[serde(rename = "Timestamp", serialize_with = "serialize_timestamp")]
    pub timestamp: NaiveDateTime,
}

impl Record {
    /// Column names in spreadsheet order.
    pub const FIELDS: [&'static str; 8] = [
        "QR_ID",
        "Type",
        "Vendor",
        "Batch",
        "Supply_Date",
        "Warranty",
        "Status",
        "Timestamp",
    ];

    pub fn build(
        identifier: String,
        form: ValidatedForm,
        status: Status,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            identifier,
            category: form.category,
            vendor: form.vendor,
            batch: form.batch,
            supply_date: form.supply_date,
            warranty_years: form.warranty_years,
            status,
            timestamp,
        }
    }

    pub fn warranty_text(&self) -> String {
        format!("{} Years", self.warranty_years)
    }

    /// Column values as text, aligned with [`Record::FIELDS`].
    pub fn values(&self) -> [String; 8] {
        [
            self.identifier.clone(),
            self.category.label().to_string(),
            self.vendor.clone(),
            self.batch.clone(),
            self.supply_date.format(DATE_FORMAT).to_string(),
            self.warranty_text(),
            self.status.message().to_string(),
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        ]
    }

    /// `(column, value)` pairs, used for form-encoded submission.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        Self::FIELDS.into_iter().zip(self.values()).collect()
    }

    /// Delimited text dump, one `Label: value` per line.
    pub fn summary(&self) -> String {
        format!(
            "QR_ID: {},\nType: {},\nVendor: {},\nBatch: {},\nSupply Date: {},\nWarranty: {}",
            self.identifier,
            self.category,
            self.vendor,
            self.batch,
            self.supply_date.format(DATE_FORMAT),
            self.warranty_text(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fields(vendor: &str, batch: &str, date: &str, warranty: &str) -> FormFields {
        FormFields {
            vendor: vendor.into(),
            batch: batch.into(),
            supply_date: date.into(),
            warranty: warranty.into(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn validate_trims_and_parses() {
        let form = validate(
            Some(Category::RailClips),
            &fields("  Acme ", " B-7 ", "2024-03-01", " 5 "),
        )
        .unwrap();

        assert_eq!(form.vendor, "Acme");
        assert_eq!(form.batch, "B-7");
        assert_eq!(form.supply_date, date("2024-03-01"));
        assert_eq!(form.warranty_years, 5);
    }

    #[test]
    fn validate_rejects_each_bad_field() {
        let good = fields("Acme", "B1", "2024-03-01", "2");
        assert_eq!(
            validate(None, &good),
            Err(ValidationError::MissingCategory)
        );

        let cat = Some(Category::FishPlates);
        assert_eq!(
            validate(cat, &fields("   ", "B1", "2024-03-01", "2")),
            Err(ValidationError::EmptyVendor)
        );
        assert_eq!(
            validate(cat, &fields("Acme", "", "2024-03-01", "2")),
            Err(ValidationError::EmptyBatch)
        );
        for bad in ["abc", "0", "-3", "", "2.5"] {
            assert!(
                matches!(
                    validate(cat, &fields("Acme", "B1", "2024-03-01", bad)),
                    Err(ValidationError::InvalidWarranty(_))
                ),
                "warranty {bad:?} should be rejected"
            );
        }
        assert_eq!(
            validate(cat, &fields("Acme", "B1", "", "2")),
            Err(ValidationError::MissingSupplyDate)
        );
        assert!(matches!(
            validate(cat, &fields("Acme", "B1", "01/03/2024", "2")),
            Err(ValidationError::InvalidSupplyDate(_))
        ));
    }

    #[test]
    fn expired_when_current_year_passes_warranty() {
        let form = validate(
            Some(Category::RailClips),
            &fields("Acme", "B1", "2020-01-01", "3"),
        )
        .unwrap();

        assert_eq!(assess(&form, date("2024-06-01"), "Other"), Status::Expired);
        // Same year as expiry still counts as covered.
        assert_eq!(assess(&form, date("2023-12-31"), "Other"), Status::Valid);
    }

    #[test]
    fn unverified_vendor_flagged_when_not_expired() {
        let form = validate(
            Some(Category::RailClips),
            &fields("Other", "B1", "2024-01-01", "3"),
        )
        .unwrap();

        assert_eq!(
            assess(&form, date("2025-01-01"), "Other"),
            Status::UnverifiedVendor
        );
        assert_eq!(assess(&form, date("2030-01-01"), "Other"), Status::Expired);
    }

    #[test]
    fn record_serializes_with_sheet_field_names() {
        let form = validate(
            Some(Category::RailLiners),
            &fields("Acme", "B1", "2024-03-01", "2"),
        )
        .unwrap();
        let timestamp = date("2024-03-02").and_hms_opt(9, 30, 0).unwrap();
        let record = Record::build("RL0003".into(), form, Status::Valid, timestamp);

        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "QR_ID": "RL0003",
                "Type": "Rail liners",
                "Vendor": "Acme",
                "Batch": "B1",
                "Supply_Date": "2024-03-01",
                "Warranty": "2 Years",
                "Status": "Valid - No issue detected.",
                "Timestamp": "2024-03-02 09:30:00",
            })
        );
        assert_eq!(record.pairs()[0], ("QR_ID", "RL0003".to_string()));
        assert_eq!(
            record.summary(),
            "QR_ID: RL0003,\nType: Rail liners,\nVendor: Acme,\nBatch: B1,\nSupply Date: 2024-03-01,\nWarranty: 2 Years"
        );
    }
}
