//! Buyer validation tests
//!
//! Tests for the buyer schema including:
//! - BHK required exactly for Apartment and Villa
//! - Budget ordering
//! - Tag normalization idempotence

use proptest::prelude::*;
use serde_json::json;
use shared::{
    normalize_tags, validate_buyer_form, BuyerFormInput, PropertyType, BHK_NOT_APPLICABLE_MESSAGE,
    BHK_REQUIRED_MESSAGE, BUDGET_ORDER_MESSAGE,
};

fn form(property_type: &str, bhk: Option<&str>) -> BuyerFormInput {
    BuyerFormInput {
        full_name: Some("John Doe".to_string()),
        phone: Some("9876543210".to_string()),
        city: Some("Mohali".to_string()),
        property_type: Some(property_type.to_string()),
        bhk: bhk.map(str::to_string),
        purpose: Some("Buy".to_string()),
        timeline: Some("Exploring".to_string()),
        source: Some("Website".to_string()),
        ..Default::default()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_json_body_deserializes() {
        let input: BuyerFormInput = serde_json::from_value(json!({
            "fullName": "John Doe",
            "phone": "9876543210",
            "city": "Mohali",
            "propertyType": "Plot",
            "purpose": "Buy",
            "timeline": "Exploring",
            "source": "Website",
            "budgetMin": null,
            "id": "ignored"
        }))
        .unwrap();
        assert!(validate_buyer_form(&input).is_ok());
    }

    #[test]
    fn test_villa_without_bhk() {
        let errors = validate_buyer_form(&form("Villa", None)).unwrap_err();
        assert_eq!(errors.field("bhk").unwrap(), [BHK_REQUIRED_MESSAGE.to_string()]);
    }

    #[test]
    fn test_equal_budgets_accepted() {
        let mut input = form("Plot", None);
        input.budget_min = Some(json!(1_000_000));
        input.budget_max = Some(json!(1_000_000));
        assert!(validate_buyer_form(&input).is_ok());
    }

    #[test]
    fn test_invalid_enum_message_lists_values() {
        let mut input = form("Plot", None);
        input.city = Some("Delhi".to_string());
        let errors = validate_buyer_form(&input).unwrap_err();
        let message = &errors.field("city").unwrap()[0];
        assert!(message.contains("'Chandigarh'"));
        assert!(message.contains("received 'Delhi'"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn property_type_strategy() -> impl Strategy<Value = PropertyType> {
        prop::sample::select(PropertyType::ALL.to_vec())
    }

    fn bhk_strategy() -> impl Strategy<Value = Option<&'static str>> {
        prop::option::of(prop::sample::select(vec!["Studio", "One", "Two", "Three", "Four"]))
    }

    fn tags_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec("[ a-z]{0,6}", 0..8).prop_map(|parts| parts.join(","))
    }

    proptest! {
        /// BHK is accepted exactly when it is present for Apartment/Villa or
        /// absent for every other property type
        #[test]
        fn prop_bhk_iff_residential(property_type in property_type_strategy(), bhk in bhk_strategy()) {
            let result = validate_buyer_form(&form(property_type.as_str(), bhk));
            let expected_ok = property_type.requires_bhk() == bhk.is_some();
            prop_assert_eq!(result.is_ok(), expected_ok);

            if let Err(errors) = result {
                let expected = if property_type.requires_bhk() {
                    BHK_REQUIRED_MESSAGE
                } else {
                    BHK_NOT_APPLICABLE_MESSAGE
                };
                prop_assert_eq!(errors.field("bhk").unwrap()[0].as_str(), expected);
            }
        }

        /// Budget ordering: max below min is rejected on budgetMax
        #[test]
        fn prop_budget_ordering(min in 1i64..10_000_000, max in 1i64..10_000_000) {
            let mut input = form("Plot", None);
            input.budget_min = Some(json!(min));
            input.budget_max = Some(json!(max));

            match validate_buyer_form(&input) {
                Ok(validated) => {
                    prop_assert!(max >= min);
                    prop_assert_eq!(validated.fields.budget_max, Some(max));
                }
                Err(errors) => {
                    prop_assert!(max < min);
                    prop_assert_eq!(errors.field("budgetMax").unwrap()[0].as_str(), BUDGET_ORDER_MESSAGE);
                }
            }
        }

        /// Normalizing twice changes nothing
        #[test]
        fn prop_normalize_tags_idempotent(raw in tags_strategy()) {
            let once = normalize_tags(&raw);
            prop_assert_eq!(normalize_tags(&once), once.clone());
        }

        /// Normalized tags never contain empty or padded segments, nor repeats
        #[test]
        fn prop_normalize_tags_segments(raw in tags_strategy()) {
            let normalized = normalize_tags(&raw);
            if !normalized.is_empty() {
                let segments: Vec<&str> = normalized.split(',').collect();
                for (i, segment) in segments.iter().enumerate() {
                    prop_assert!(!segment.is_empty());
                    prop_assert_eq!(segment.trim(), *segment);
                    prop_assert!(!segments[..i].contains(segment));
                }
            }
        }
    }
}
