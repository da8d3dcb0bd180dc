//! Authentication middleware
//!
//! Resolves the session from a Bearer token or the session cookie and makes
//! the acting user available to handlers.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Role, UserSummary};
use crate::services::AuthService;
use crate::AppState;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "buyer_session";

/// Authenticated user information extracted from the session token
#[derive(Clone, Debug, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners and admins may modify a buyer
    pub fn can_modify(&self, owner_id: Uuid) -> bool {
        self.user_id == owner_id || self.is_admin()
    }

    /// Access check for writes and deletes
    pub fn ensure_can_modify(&self, owner_id: Uuid) -> AppResult<()> {
        if self.can_modify(owner_id) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.user_id, %owner_id, "Write denied to non-owner");
            Err(AppError::Forbidden(
                "You don't have permission to modify this buyer".to_string(),
            ))
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.user_id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Authentication middleware that validates session tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer
        .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string())
        .or_else(|| jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string()))
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let service = AuthService::new(state.users.clone(), &state.config);
    let auth_user = service.authenticate(&token)?;

    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            email: "agent@example.com".to_string(),
            name: None,
            role,
        }
    }

    #[test]
    fn test_owner_or_admin_may_modify() {
        let owner = user(Role::User);
        assert!(owner.can_modify(owner.user_id));
        assert!(!owner.can_modify(Uuid::new_v4()));
        assert!(user(Role::Admin).can_modify(Uuid::new_v4()));
    }

    #[test]
    fn test_forbidden_for_others() {
        let other = user(Role::User);
        assert!(matches!(
            other.ensure_can_modify(Uuid::new_v4()),
            Err(AppError::Forbidden(_))
        ));
    }
}
