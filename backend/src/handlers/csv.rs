//! CSV import and export handlers

use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::models::{BuyerListParams, ImportSummary};
use crate::services::{csv::export_filename, CsvService};
use crate::AppState;

/// Import buyers from the multipart field `file`
pub async fn import_buyers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<ImportSummary>> {
    let mut text = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            text = Some(field.text().await?);
            break;
        }
    }
    let text = text.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let service = CsvService::new(state.buyers.clone(), state.config.import.max_rows);
    let summary = service.import(user.user_id, &text).await?;
    Ok(Json(summary))
}

/// Export every buyer matching the listing filters
pub async fn export_buyers(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<BuyerListParams>,
) -> AppResult<impl IntoResponse> {
    let query = params.into_query()?;
    let service = CsvService::new(state.buyers.clone(), state.config.import.max_rows);
    let csv = service.export(&query.filter, query.sort).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(Utc::now().date_naive())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
