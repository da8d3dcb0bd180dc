//! Buyer change history models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::UserSummary;

/// History source tag for rows created by CSV import
pub const BULK_IMPORT_SOURCE: &str = "bulk_import";

/// Old and new value of a single changed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Structured diff payload stored with each history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum HistoryDiff {
    Created {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        fields: Value,
    },
    Updated {
        changes: BTreeMap<String, FieldChange>,
    },
}

impl HistoryDiff {
    pub fn action(&self) -> &'static str {
        match self {
            HistoryDiff::Created { .. } => "created",
            HistoryDiff::Updated { .. } => "updated",
        }
    }
}

/// Immutable audit record of one create/update on a buyer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerHistory {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub changed_by_id: Uuid,
    pub changed_by: Option<UserSummary>,
    pub changed_at: DateTime<Utc>,
    pub diff: HistoryDiff,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_updated_diff_shape() {
        let mut changes = BTreeMap::new();
        changes.insert(
            "status".to_string(),
            FieldChange { old: json!("New"), new: json!("Qualified") },
        );
        let diff = HistoryDiff::Updated { changes };

        assert_eq!(
            serde_json::to_value(&diff).unwrap(),
            json!({ "action": "updated", "changes": { "status": { "old": "New", "new": "Qualified" } } })
        );
    }

    #[test]
    fn test_bulk_import_diff_shape() {
        let diff = HistoryDiff::Created {
            source: Some(BULK_IMPORT_SOURCE.to_string()),
            fields: json!({ "fullName": "Ravi Kumar" }),
        };
        let value = serde_json::to_value(&diff).unwrap();
        assert_eq!(value["action"], "created");
        assert_eq!(value["source"], "bulk_import");

        let plain = HistoryDiff::Created { source: None, fields: json!({}) };
        assert!(serde_json::to_value(&plain).unwrap().get("source").is_none());
    }
}
