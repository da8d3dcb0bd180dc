//! Change-diff computation and history entry construction

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Buyer, BuyerFields, BuyerHistory, FieldChange, HistoryDiff, BULK_IMPORT_SOURCE};

/// Number of entries shown with a buyer's detail view
pub const RECENT_HISTORY_LIMIT: u32 = 5;

/// Fields that never participate in a diff
const IGNORED_FIELDS: &[&str] = &["updatedAt"];

fn to_object<T: Serialize>(value: &T) -> AppResult<Map<String, Value>> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::Internal("expected a JSON object".to_string())),
        Err(e) => Err(AppError::Internal(format!("JSON serialization error: {}", e))),
    }
}

/// Fields whose value in `incoming` differs from the stored snapshot.
///
/// Only fields present on both sides are compared, so an omitted status is
/// not a change.
pub fn diff_fields(before: &Buyer, incoming: &BuyerFields) -> AppResult<BTreeMap<String, FieldChange>> {
    let old = to_object(before)?;
    let new = to_object(incoming)?;

    let changes = new
        .into_iter()
        .filter(|(field, _)| !IGNORED_FIELDS.contains(&field.as_str()))
        .filter_map(|(field, new_value)| {
            let old_value = old.get(&field)?;
            (old_value != &new_value).then(|| {
                (
                    field,
                    FieldChange {
                        old: old_value.clone(),
                        new: new_value,
                    },
                )
            })
        })
        .collect();

    Ok(changes)
}

fn entry(buyer_id: Uuid, actor_id: Uuid, at: DateTime<Utc>, diff: HistoryDiff) -> BuyerHistory {
    BuyerHistory {
        id: Uuid::new_v4(),
        buyer_id,
        changed_by_id: actor_id,
        changed_by: None,
        changed_at: at,
        diff,
    }
}

/// Entry recording an interactive create.
///
/// Holds the fields as submitted, so a status the caller left out stays out.
pub fn created_entry(buyer: &Buyer, submitted: &BuyerFields, actor_id: Uuid) -> AppResult<BuyerHistory> {
    let fields = Value::Object(to_object(submitted)?);
    Ok(entry(
        buyer.id,
        actor_id,
        buyer.created_at,
        HistoryDiff::Created { source: None, fields },
    ))
}

/// Entry recording a create from CSV import
pub fn imported_entry(buyer: &Buyer, submitted: &BuyerFields, actor_id: Uuid) -> AppResult<BuyerHistory> {
    let fields = Value::Object(to_object(submitted)?);
    Ok(entry(
        buyer.id,
        actor_id,
        buyer.created_at,
        HistoryDiff::Created {
            source: Some(BULK_IMPORT_SOURCE.to_string()),
            fields,
        },
    ))
}

/// Entry recording an update, or `None` when nothing changed
pub fn updated_entry(
    buyer_id: Uuid,
    actor_id: Uuid,
    at: DateTime<Utc>,
    changes: BTreeMap<String, FieldChange>,
) -> Option<BuyerHistory> {
    if changes.is_empty() {
        None
    } else {
        Some(entry(buyer_id, actor_id, at, HistoryDiff::Updated { changes }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{City, PropertyType, Purpose, Source, Status, Timeline};
    use serde_json::json;

    fn stored() -> Buyer {
        let now = Utc::now();
        Buyer {
            id: Uuid::new_v4(),
            full_name: "John Doe".to_string(),
            email: None,
            phone: "9876543210".to_string(),
            city: City::Mohali,
            property_type: PropertyType::Plot,
            bhk: None,
            purpose: Purpose::Buy,
            budget_min: None,
            budget_max: None,
            timeline: Timeline::Exploring,
            source: Source::Website,
            status: Status::New,
            notes: None,
            tags: String::new(),
            owner_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_only_change() {
        let before = stored();
        let mut incoming = BuyerFields::from(&before);
        incoming.status = Some(Status::Qualified);

        let changes = diff_fields(&before, &incoming).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["status"], FieldChange { old: json!("New"), new: json!("Qualified") });
    }

    #[test]
    fn test_omitted_status_is_not_a_change() {
        let before = stored();
        let mut incoming = BuyerFields::from(&before);
        incoming.status = None;
        assert!(diff_fields(&before, &incoming).unwrap().is_empty());
    }

    #[test]
    fn test_null_transitions_are_recorded() {
        let before = stored();
        let mut incoming = BuyerFields::from(&before);
        incoming.email = Some("john@example.com".to_string());
        incoming.budget_min = Some(2_500_000);

        let changes = diff_fields(&before, &incoming).unwrap();
        assert_eq!(changes["email"].old, Value::Null);
        assert_eq!(changes["budgetMin"].new, json!(2_500_000));
    }

    #[test]
    fn test_no_change_no_entry() {
        let before = stored();
        let changes = diff_fields(&before, &BuyerFields::from(&before)).unwrap();
        assert!(updated_entry(before.id, before.owner_id, Utc::now(), changes).is_none());
    }

    #[test]
    fn test_imported_entry_is_tagged() {
        let buyer = stored();
        let entry = imported_entry(&buyer, &BuyerFields::from(&buyer), buyer.owner_id).unwrap();
        match entry.diff {
            HistoryDiff::Created { source, fields } => {
                assert_eq!(source.as_deref(), Some("bulk_import"));
                assert_eq!(fields["fullName"], "John Doe");
            }
            other => panic!("unexpected diff {:?}", other),
        }
    }

    #[test]
    fn test_created_entry_keeps_submitted_fields() {
        let buyer = stored();
        let mut submitted = BuyerFields::from(&buyer);
        submitted.status = None;

        let entry = created_entry(&buyer, &submitted, buyer.owner_id).unwrap();
        match entry.diff {
            HistoryDiff::Created { source, fields } => {
                assert_eq!(source, None);
                assert!(fields.get("status").is_none());
                assert_eq!(fields["phone"], "9876543210");
            }
            other => panic!("unexpected diff {:?}", other),
        }
    }
}
