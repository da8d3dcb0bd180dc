//! Validation engine for buyer submissions
//!
//! Every rule runs and contributes field-scoped messages; nothing is applied
//! unless the whole record passes. Cross-field rules only run once the fields
//! they depend on have parsed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Bhk, BuyerFields, City, PropertyType, Purpose, Source, Status, Timeline};

pub const FULL_NAME_MIN: usize = 2;
pub const FULL_NAME_MAX: usize = 80;
pub const PHONE_MIN: usize = 10;
pub const PHONE_MAX: usize = 15;
pub const NOTES_MAX: usize = 1000;

pub const BHK_REQUIRED_MESSAGE: &str = "BHK is required for Apartment and Villa property types";
pub const BHK_NOT_APPLICABLE_MESSAGE: &str = "BHK is only applicable to Apartment and Villa property types";
pub const BUDGET_ORDER_MESSAGE: &str = "Maximum budget must be greater than or equal to minimum budget";

/// Field-level validation failures.
///
/// Serializes as `{ "<field>": ["message", ...], "_errors": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Error)]
#[error("validation failed on {} field(s)", .fields.len())]
pub struct ValidationErrors {
    /// Whole-record messages not attached to a single field
    #[serde(rename = "_errors", default, skip_serializing_if = "Vec::is_empty")]
    pub form: Vec<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn add_form(&mut self, message: impl Into<String>) {
        self.form.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.form.is_empty() && self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&[String]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// `Ok(value)` when no error was recorded
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Buyer form submission as received from clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerFormInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub bhk: Option<String>,
    pub purpose: Option<String>,
    pub budget_min: Option<Value>,
    pub budget_max: Option<Value>,
    pub timeline: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub status: Option<String>,
    /// Concurrency token the client last saw
    pub updated_at: Option<String>,
}

/// A submission that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBuyer {
    pub fields: BuyerFields,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Normalize a comma separated tag list: trim, drop empties, de-duplicate, rejoin
pub fn normalize_tags(raw: &str) -> String {
    let mut tags: Vec<&str> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags.join(",")
}

/// Validate email format
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if validator::validate_email(email) {
        Ok(())
    } else {
        Err("Invalid email address")
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    raw: Option<&str>,
    min: usize,
    max: usize,
    min_message: &str,
) -> Option<String> {
    let Some(value) = present(raw) else {
        errors.add(field, "Required");
        return None;
    };
    let len = value.chars().count();
    if len < min {
        errors.add(field, min_message);
        None
    } else if len > max {
        errors.add(field, format!("String must contain at most {} character(s)", max));
        None
    } else {
        Some(value.to_string())
    }
}

fn required_enum<T>(
    errors: &mut ValidationErrors,
    field: &str,
    raw: Option<&str>,
    parse: fn(&str) -> Option<T>,
    expected: fn() -> String,
) -> Option<T> {
    let Some(value) = present(raw) else {
        errors.add(field, "Required");
        return None;
    };
    optional_enum(errors, field, Some(value), parse, expected)
}

fn optional_enum<T>(
    errors: &mut ValidationErrors,
    field: &str,
    raw: Option<&str>,
    parse: fn(&str) -> Option<T>,
    expected: fn() -> String,
) -> Option<T> {
    let value = present(raw)?;
    let parsed = parse(value);
    if parsed.is_none() {
        errors.add(
            field,
            format!("Invalid enum value. Expected {}, received '{}'", expected(), value),
        );
    }
    parsed
}

/// Budget amounts must be positive integers. `Err(())` means an error was recorded.
fn budget(errors: &mut ValidationErrors, field: &str, raw: Option<&Value>) -> Result<Option<i64>, ()> {
    let number = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64)),
        Some(Value::String(_)) => {
            errors.add(field, "Expected number, received string");
            return Err(());
        }
        Some(_) => None,
    };
    match number {
        Some(n) if n > 0 => Ok(Some(n)),
        Some(_) => {
            errors.add(field, "Number must be greater than 0");
            Err(())
        }
        None => {
            errors.add(field, "Expected integer");
            Err(())
        }
    }
}

/// Core rules shared by form and CSV submissions. `errors` may already hold
/// messages from an earlier normalization pass.
fn validate_candidate(
    input: &BuyerFormInput,
    mut errors: ValidationErrors,
) -> Result<ValidatedBuyer, ValidationErrors> {
    // Primitive shape
    let full_name = required_text(
        &mut errors,
        "fullName",
        input.full_name.as_deref(),
        FULL_NAME_MIN,
        FULL_NAME_MAX,
        "Name must be at least 2 characters",
    );
    let phone = required_text(
        &mut errors,
        "phone",
        input.phone.as_deref(),
        PHONE_MIN,
        PHONE_MAX,
        "Phone must be at least 10 digits",
    );

    let email = present(input.email.as_deref()).map(str::to_string);
    if let Some(ref email) = email {
        if let Err(message) = validate_email(email) {
            errors.add("email", message);
        }
    }

    let city = required_enum(&mut errors, "city", input.city.as_deref(), City::from_str, City::expected);
    let property_type = required_enum(
        &mut errors,
        "propertyType",
        input.property_type.as_deref(),
        PropertyType::from_str,
        PropertyType::expected,
    );
    let bhk_raw = present(input.bhk.as_deref());
    let bhk = optional_enum(&mut errors, "bhk", bhk_raw, Bhk::from_str, Bhk::expected);
    let purpose = required_enum(&mut errors, "purpose", input.purpose.as_deref(), Purpose::from_str, Purpose::expected);
    let timeline = required_enum(
        &mut errors,
        "timeline",
        input.timeline.as_deref(),
        Timeline::from_str,
        Timeline::expected,
    );
    let source = required_enum(&mut errors, "source", input.source.as_deref(), Source::from_str, Source::expected);
    let status = optional_enum(&mut errors, "status", input.status.as_deref(), Status::from_str, Status::expected);

    let budget_min = budget(&mut errors, "budgetMin", input.budget_min.as_ref());
    let budget_max = budget(&mut errors, "budgetMax", input.budget_max.as_ref());

    let notes = present(input.notes.as_deref()).map(str::to_string);
    if let Some(ref notes) = notes {
        if notes.chars().count() > NOTES_MAX {
            errors.add("notes", "Notes cannot exceed 1000 characters");
        }
    }

    let updated_at = match present(input.updated_at.as_deref()) {
        None => None,
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(_) => {
                errors.add("updatedAt", "Invalid date");
                None
            }
        },
    };

    // Conditional requirement: BHK iff Apartment/Villa
    if let Some(property_type) = property_type {
        if property_type.requires_bhk() && bhk_raw.is_none() {
            errors.add("bhk", BHK_REQUIRED_MESSAGE);
        } else if !property_type.requires_bhk() && bhk_raw.is_some() {
            errors.add("bhk", BHK_NOT_APPLICABLE_MESSAGE);
        }
    }

    // Budget ordering
    if let (Ok(Some(min)), Ok(Some(max))) = (budget_min, budget_max) {
        if max < min {
            errors.add("budgetMax", BUDGET_ORDER_MESSAGE);
        }
    }

    let tags = normalize_tags(input.tags.as_deref().unwrap_or_default());

    if !errors.is_empty() {
        return Err(errors);
    }

    match (full_name, phone, city, property_type, purpose, timeline, source, budget_min, budget_max) {
        (
            Some(full_name),
            Some(phone),
            Some(city),
            Some(property_type),
            Some(purpose),
            Some(timeline),
            Some(source),
            Ok(budget_min),
            Ok(budget_max),
        ) => Ok(ValidatedBuyer {
            fields: BuyerFields {
                full_name,
                email,
                phone,
                city,
                property_type,
                bhk,
                purpose,
                budget_min,
                budget_max,
                timeline,
                source,
                notes,
                tags,
                status,
            },
            updated_at,
        }),
        _ => {
            errors.add_form("Invalid buyer record");
            Err(errors)
        }
    }
}

/// Validate an interactive buyer form submission
pub fn validate_buyer_form(input: &BuyerFormInput) -> Result<ValidatedBuyer, ValidationErrors> {
    validate_candidate(input, ValidationErrors::new())
}

/// Entry point for submissions that were normalized by another layer first
pub(crate) fn validate_normalized(
    input: &BuyerFormInput,
    errors: ValidationErrors,
) -> Result<ValidatedBuyer, ValidationErrors> {
    validate_candidate(input, errors)
}
