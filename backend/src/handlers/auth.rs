//! Authentication handlers

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{CurrentUser, SESSION_COOKIE};
use crate::models::{Role, User};
use crate::services::{auth::SessionTokens, AuthService};
use crate::AppState;

#[derive(Deserialize)]
pub struct MagicLinkRequest {
    pub email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_url: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    pub email: String,
    pub token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[serde(flatten)]
    pub tokens: SessionTokens,
    pub user: User,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Magic-link request handler
pub async fn request_magic_link(
    State(state): State<AppState>,
    payload: Result<Json<MagicLinkRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<MagicLinkResponse>)> {
    let Json(body) = payload?;
    let auth_service = AuthService::new(state.users.clone(), &state.config);
    let link = auth_service.request_magic_link(&body.email).await?;

    // Email delivery happens outside this service
    tracing::info!(email = %link.email, url = %link.verify_url, "Sign-in link ready for delivery");

    Ok((
        StatusCode::ACCEPTED,
        Json(MagicLinkResponse {
            message: "Check your email for a sign-in link".to_string(),
            verify_url: state.config.auth.expose_magic_links.then_some(link.verify_url),
        }),
    ))
}

/// Magic-link verification handler
pub async fn verify_magic_link(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<VerifyQuery>,
) -> AppResult<(CookieJar, Json<SessionResponse>)> {
    let auth_service = AuthService::new(state.users.clone(), &state.config);
    let (user, tokens) = auth_service.verify_magic_link(&query.email, &query.token).await?;

    let jar = jar.add(session_cookie(&tokens.access_token));
    Ok((jar, Json(SessionResponse { tokens, user })))
}

/// Demo login handler
pub async fn demo_login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<SessionResponse>)> {
    let auth_service = AuthService::new(state.users.clone(), &state.config);
    let (user, tokens) = auth_service.demo_login().await?;

    let jar = jar.add(session_cookie(&tokens.access_token));
    Ok((jar, Json(SessionResponse { tokens, user })))
}

/// Current session handler
pub async fn current_session(CurrentUser(user): CurrentUser) -> Json<SessionUser> {
    Json(SessionUser {
        id: user.user_id,
        email: user.email,
        name: user.name,
        role: user.role,
    })
}
