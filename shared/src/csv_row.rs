//! CSV row schema for bulk import and export
//!
//! CSV files use their own encodings for some columns (`0-3m`, `Walk-in`,
//! `2` for BHK). Rows are normalized into canonical values and then run
//! through the same rules as form submissions; export writes the same
//! encodings back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Bhk, Buyer, BuyerFields, Source, Timeline};
use crate::validation::{validate_normalized, BuyerFormInput, ValidationErrors};

/// Column order of exported files; also accepted on import
pub const EXPORT_HEADERS: [&str; 14] = [
    "fullName",
    "email",
    "phone",
    "city",
    "propertyType",
    "bhk",
    "purpose",
    "budgetMin",
    "budgetMax",
    "timeline",
    "source",
    "notes",
    "tags",
    "status",
];

/// One CSV record keyed by header name. Unknown columns are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CsvBuyerRow {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub bhk: Option<String>,
    pub purpose: Option<String>,
    pub budget_min: Option<String>,
    pub budget_max: Option<String>,
    pub timeline: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub status: Option<String>,
}

fn cell(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn map_timeline(raw: Option<&str>) -> Timeline {
    match raw {
        Some("0-3m") => Timeline::ZeroToThreeMonths,
        Some("3-6m") => Timeline::ThreeToSixMonths,
        Some(">6m") => Timeline::MoreThanSixMonths,
        _ => Timeline::Exploring,
    }
}

fn timeline_cell(timeline: Timeline) -> &'static str {
    match timeline {
        Timeline::ZeroToThreeMonths => "0-3m",
        Timeline::ThreeToSixMonths => "3-6m",
        Timeline::MoreThanSixMonths => ">6m",
        Timeline::Exploring => "Exploring",
    }
}

fn map_bhk(raw: Option<&str>) -> Option<Bhk> {
    match raw? {
        "1" => Some(Bhk::One),
        "2" => Some(Bhk::Two),
        "3" => Some(Bhk::Three),
        "4" => Some(Bhk::Four),
        "Studio" => Some(Bhk::Studio),
        _ => None,
    }
}

fn bhk_cell(bhk: Bhk) -> &'static str {
    match bhk {
        Bhk::One => "1",
        Bhk::Two => "2",
        Bhk::Three => "3",
        Bhk::Four => "4",
        Bhk::Studio => "Studio",
    }
}

fn map_source(raw: Option<&str>) -> Option<String> {
    raw.map(|s| match s {
        "Walk-in" => Source::WalkIn.as_str().to_string(),
        other => other.to_string(),
    })
}

fn source_cell(source: Source) -> &'static str {
    match source {
        Source::WalkIn => "Walk-in",
        other => other.as_str(),
    }
}

fn map_budget(errors: &mut ValidationErrors, field: &str, raw: Option<&str>) -> Option<Value> {
    let raw = raw?;
    match raw.parse::<i64>() {
        Ok(amount) => Some(Value::from(amount)),
        Err(_) => {
            errors.add(field, format!("Expected a whole number, received '{}'", raw));
            None
        }
    }
}

impl CsvBuyerRow {
    /// Map CSV encodings onto the canonical form vocabulary.
    ///
    /// Returns the canonical submission plus any errors that only make sense
    /// at the CSV layer (unparsable budgets).
    pub fn normalize(&self) -> (BuyerFormInput, ValidationErrors) {
        let mut errors = ValidationErrors::new();
        let input = BuyerFormInput {
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            city: cell(&self.city).map(str::to_string),
            property_type: cell(&self.property_type).map(str::to_string),
            bhk: map_bhk(cell(&self.bhk)).map(|b| b.as_str().to_string()),
            purpose: cell(&self.purpose).map(str::to_string),
            budget_min: map_budget(&mut errors, "budgetMin", cell(&self.budget_min)),
            budget_max: map_budget(&mut errors, "budgetMax", cell(&self.budget_max)),
            timeline: Some(map_timeline(cell(&self.timeline)).as_str().to_string()),
            source: map_source(cell(&self.source)),
            notes: self.notes.clone(),
            tags: self.tags.clone(),
            status: cell(&self.status).map(str::to_string),
            updated_at: None,
        };
        (input, errors)
    }

    /// Export view of a stored buyer, in the encodings `normalize` reads back
    pub fn from_buyer(buyer: &Buyer) -> Self {
        Self {
            full_name: Some(buyer.full_name.clone()),
            email: buyer.email.clone(),
            phone: Some(buyer.phone.clone()),
            city: Some(buyer.city.to_string()),
            property_type: Some(buyer.property_type.to_string()),
            bhk: buyer.bhk.map(|b| bhk_cell(b).to_string()),
            purpose: Some(buyer.purpose.to_string()),
            budget_min: buyer.budget_min.map(|n| n.to_string()),
            budget_max: buyer.budget_max.map(|n| n.to_string()),
            timeline: Some(timeline_cell(buyer.timeline).to_string()),
            source: Some(source_cell(buyer.source).to_string()),
            notes: buyer.notes.clone(),
            tags: Some(buyer.tags.clone()),
            status: Some(buyer.status.to_string()),
        }
    }

    /// Cells in `EXPORT_HEADERS` order, absent values as empty strings
    pub fn to_record(&self) -> [&str; 14] {
        fn v(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("")
        }
        [
            v(&self.full_name),
            v(&self.email),
            v(&self.phone),
            v(&self.city),
            v(&self.property_type),
            v(&self.bhk),
            v(&self.purpose),
            v(&self.budget_min),
            v(&self.budget_max),
            v(&self.timeline),
            v(&self.source),
            v(&self.notes),
            v(&self.tags),
            v(&self.status),
        ]
    }
}

/// Normalize and validate one CSV row
pub fn validate_csv_row(row: &CsvBuyerRow) -> Result<BuyerFields, ValidationErrors> {
    let (input, errors) = row.normalize();
    validate_normalized(&input, errors).map(|validated| validated.fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PropertyType, Status};

    fn row() -> CsvBuyerRow {
        CsvBuyerRow {
            full_name: Some("Ravi Kumar".to_string()),
            phone: Some("9812345678".to_string()),
            city: Some("Chandigarh".to_string()),
            property_type: Some("Apartment".to_string()),
            bhk: Some("2".to_string()),
            purpose: Some("Buy".to_string()),
            budget_min: Some("4000000".to_string()),
            budget_max: Some("6000000".to_string()),
            timeline: Some("0-3m".to_string()),
            source: Some("Walk-in".to_string()),
            tags: Some("hot, ready ,hot".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_csv_vocabulary_is_normalized() {
        let fields = validate_csv_row(&row()).unwrap();
        assert_eq!(fields.bhk, Some(Bhk::Two));
        assert_eq!(fields.timeline, Timeline::ZeroToThreeMonths);
        assert_eq!(fields.source, Source::WalkIn);
        assert_eq!(fields.budget_min, Some(4_000_000));
        assert_eq!(fields.tags, "hot,ready");
        assert_eq!(fields.status, None);
    }

    #[test]
    fn test_unknown_timeline_falls_back_to_exploring() {
        let mut row = row();
        row.timeline = Some("someday".to_string());
        assert_eq!(validate_csv_row(&row).unwrap().timeline, Timeline::Exploring);
        row.timeline = None;
        assert_eq!(validate_csv_row(&row).unwrap().timeline, Timeline::Exploring);
    }

    #[test]
    fn test_canonical_names_are_not_csv_encodings() {
        let mut row = row();
        row.timeline = Some("MoreThanSixMonths".to_string());
        row.property_type = Some("Plot".to_string());
        row.bhk = Some("One".to_string());
        let fields = validate_csv_row(&row).unwrap();
        assert_eq!(fields.timeline, Timeline::Exploring);
        assert_eq!(fields.bhk, None);
    }

    #[test]
    fn test_unknown_bhk_is_absent() {
        let mut row = row();
        row.property_type = Some("Plot".to_string());
        row.bhk = Some("9".to_string());
        let fields = validate_csv_row(&row).unwrap();
        assert_eq!(fields.property_type, PropertyType::Plot);
        assert_eq!(fields.bhk, None);

        // Apartment with an unmappable BHK then fails the BHK requirement
        row.property_type = Some("Apartment".to_string());
        assert!(validate_csv_row(&row).unwrap_err().has("bhk"));
    }

    #[test]
    fn test_budget_cells() {
        let mut row = row();
        row.budget_min = Some(" ".to_string());
        row.budget_max = Some("lots".to_string());
        let errors = validate_csv_row(&row).unwrap_err();
        assert!(!errors.has("budgetMin"));
        assert!(errors.has("budgetMax"));

        row.budget_max = None;
        let fields = validate_csv_row(&row).unwrap();
        assert_eq!(fields.budget_min, None);
        assert_eq!(fields.budget_max, None);
    }

    #[test]
    fn test_invalid_status_and_source() {
        let mut row = row();
        row.status = Some("Closed".to_string());
        row.source = Some("Billboard".to_string());
        let errors = validate_csv_row(&row).unwrap_err();
        assert!(errors.has("status"));
        assert!(errors.has("source"));

        row.status = Some("Visited".to_string());
        row.source = Some("WalkIn".to_string());
        assert_eq!(validate_csv_row(&row).unwrap().status, Some(Status::Visited));
    }

    #[test]
    fn test_export_record_order() {
        let mut row = row();
        row.email = None;
        let record = row.to_record();
        assert_eq!(record.len(), EXPORT_HEADERS.len());
        assert_eq!(record[0], "Ravi Kumar");
        assert_eq!(record[1], "");
        assert_eq!(record[5], "2");
    }
}
