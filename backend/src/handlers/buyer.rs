//! Buyer HTTP handlers

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Buyer, BuyerDetail, BuyerListItem, BuyerListParams, BuyerPage};
use crate::services::BuyerService;
use crate::AppState;
use shared::BuyerFormInput;

fn buyer_service(state: &AppState) -> BuyerService {
    BuyerService::new(
        state.buyers.clone(),
        state.users.clone(),
        state.rate_limiter.clone(),
    )
}

/// First address in `x-forwarded-for`, if any
pub fn client_addr(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// List buyers with filters, sorting and pagination
pub async fn list_buyers(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<BuyerListParams>,
) -> AppResult<Json<BuyerPage<BuyerListItem>>> {
    let query = params.into_query()?;
    let page = buyer_service(&state).list(&query).await?;
    Ok(Json(page))
}

/// Get a buyer with owner and recent history
pub async fn get_buyer(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(buyer_id): Path<Uuid>,
) -> AppResult<Json<BuyerDetail>> {
    let detail = buyer_service(&state).get(buyer_id).await?;
    Ok(Json(detail))
}

/// Create a buyer owned by the current user
pub async fn create_buyer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<BuyerFormInput>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Buyer>)> {
    let Json(input) = payload?;
    let buyer = buyer_service(&state).create(&user, &input).await?;
    Ok((StatusCode::CREATED, Json(buyer)))
}

/// Update a buyer (owner or admin)
pub async fn update_buyer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(buyer_id): Path<Uuid>,
    headers: HeaderMap,
    payload: Result<Json<BuyerFormInput>, JsonRejection>,
) -> AppResult<Json<Buyer>> {
    let Json(input) = payload?;
    let buyer = buyer_service(&state)
        .update(&user, buyer_id, client_addr(&headers), &input)
        .await?;
    Ok(Json(buyer))
}

/// Delete a buyer (owner or admin)
pub async fn delete_buyer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(buyer_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    buyer_service(&state).delete(&user, buyer_id).await?;
    Ok(Json(json!({ "success": true })))
}
