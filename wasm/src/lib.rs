//! WebAssembly module for the Buyer Lead Intake platform
//!
//! Runs the same validation the server applies so browser forms can report
//! field errors before submitting:
//! - Buyer form and CSV row validation
//! - Tag normalization
//! - Display labels

use serde::Serialize;
use wasm_bindgen::prelude::*;

use shared::{BuyerFields, BuyerFormInput, CsvBuyerRow, ValidationErrors};

/// Result envelope handed back to JavaScript as JSON
#[derive(Serialize)]
#[serde(untagged)]
enum Outcome {
    Valid { success: bool, data: BuyerFields },
    Invalid { success: bool, errors: ValidationErrors },
}

fn render(result: Result<BuyerFields, ValidationErrors>) -> String {
    let outcome = match result {
        Ok(data) => Outcome::Valid { success: true, data },
        Err(errors) => Outcome::Invalid { success: false, errors },
    };
    serde_json::to_string(&outcome)
        .unwrap_or_else(|e| format!(r#"{{"success":false,"errors":{{"_errors":["{}"]}}}}"#, e))
}

fn malformed(e: serde_json::Error) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add_form(format!("Invalid JSON: {}", e));
    errors
}

/// Validate a buyer form submission given as JSON.
///
/// Returns `{"success":true,"data":{...}}` or `{"success":false,"errors":{...}}`.
#[wasm_bindgen]
pub fn validate_buyer_form(input_json: &str) -> String {
    let result = serde_json::from_str::<BuyerFormInput>(input_json)
        .map_err(malformed)
        .and_then(|input| shared::validate_buyer_form(&input).map(|v| v.fields));
    render(result)
}

/// Validate one CSV row given as a JSON object keyed by header name
#[wasm_bindgen]
pub fn validate_csv_row(row_json: &str) -> String {
    let result = serde_json::from_str::<CsvBuyerRow>(row_json)
        .map_err(malformed)
        .and_then(|row| shared::validate_csv_row(&row));
    render(result)
}

/// Canonical tag string: trimmed, de-duplicated, comma joined
#[wasm_bindgen]
pub fn normalize_tags(raw: &str) -> String {
    shared::normalize_tags(raw)
}

/// Whether the property type needs a BHK value
#[wasm_bindgen]
pub fn bhk_required(property_type: &str) -> bool {
    shared::PropertyType::from_str(property_type)
        .map(|p| p.requires_bhk())
        .unwrap_or(false)
}

/// Display label for a timeline value, or the input if unknown
#[wasm_bindgen]
pub fn timeline_label(timeline: &str) -> String {
    shared::Timeline::from_str(timeline)
        .map(|t| t.label().to_string())
        .unwrap_or_else(|| timeline.to_string())
}

/// Display label for a BHK value, or the input if unknown
#[wasm_bindgen]
pub fn bhk_label(bhk: &str) -> String {
    shared::Bhk::from_str(bhk)
        .map(|b| b.label().to_string())
        .unwrap_or_else(|| bhk.to_string())
}
