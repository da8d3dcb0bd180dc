//! Backend models for the Buyer Lead Intake service
//!
//! Re-exports models from the shared crate and adds backend-specific models

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use shared::models::*;
pub use shared::types::*;
pub use shared::ValidationErrors;

/// A CSV data row that failed validation (1-based over data rows)
#[derive(Debug, Clone, Serialize)]
pub struct InvalidRow {
    pub row: usize,
    pub errors: ValidationErrors,
}

/// Pending magic-link sign-in. Only the token hash is stored.
#[derive(Debug, Clone)]
pub struct VerificationToken {
    pub identifier: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful bulk import
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub success: bool,
    pub message: String,
    pub count: usize,
}

impl ImportSummary {
    pub fn new(count: usize) -> Self {
        Self {
            success: true,
            message: format!("Successfully imported {} buyers", count),
            count,
        }
    }
}
