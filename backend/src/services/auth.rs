//! Authentication service: magic-link sign-in, demo login and session tokens

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{Role, User, ValidationErrors, VerificationToken};
use crate::repository::UserRepository;

pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_NAME: &str = "Demo User";

type HmacSha256 = Hmac<Sha256>;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    jwt_secret: String,
    session_ttl_secs: i64,
    magic_link_ttl_secs: i64,
    public_url: String,
    demo_login_enabled: bool,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Issued session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// A freshly issued sign-in link
#[derive(Debug)]
pub struct MagicLink {
    pub email: String,
    pub verify_url: String,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(users: Arc<dyn UserRepository>, config: &Config) -> Self {
        Self {
            users,
            jwt_secret: config.jwt.secret.clone(),
            session_ttl_secs: config.jwt.session_ttl_secs,
            magic_link_ttl_secs: config.auth.magic_link_ttl_secs,
            public_url: config.auth.public_url.trim_end_matches('/').to_string(),
            demo_login_enabled: config.auth.demo_login_enabled,
        }
    }

    /// Lowercase, trim and validate an email address
    fn normalize_email(email: &str) -> AppResult<String> {
        let email = email.trim().to_lowercase();
        if let Err(message) = shared::validate_email(&email) {
            let mut errors = ValidationErrors::new();
            errors.add("email", message);
            return Err(AppError::Validation(errors));
        }
        Ok(email)
    }

    /// Hash a token for storage
    fn hash_token(&self, token: &str) -> AppResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.jwt_secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("Failed to create HMAC: {}", e)))?;
        mac.update(token.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Store a single-use sign-in token and build its link.
    /// Delivery of the link is left to the caller.
    pub async fn request_magic_link(&self, email: &str) -> AppResult<MagicLink> {
        let email = Self::normalize_email(email)?;
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

        self.users
            .store_verification_token(&VerificationToken {
                identifier: email.clone(),
                token_hash: self.hash_token(&token)?,
                expires_at: Utc::now() + Duration::seconds(self.magic_link_ttl_secs),
            })
            .await?;

        let verify_url = format!(
            "{}/api/auth/verify?email={}&token={}",
            self.public_url,
            urlencoding::encode(&email),
            token
        );
        tracing::info!(email = %email, "Magic sign-in link issued");

        Ok(MagicLink { email, verify_url })
    }

    /// Consume a sign-in token and open a session
    pub async fn verify_magic_link(&self, email: &str, token: &str) -> AppResult<(User, SessionTokens)> {
        let email = Self::normalize_email(email)?;
        let invalid = || AppError::Unauthorized("Invalid or expired sign-in link".to_string());

        let stored = self
            .users
            .take_verification_token(&email, &self.hash_token(token)?)
            .await?
            .ok_or_else(invalid)?;
        let now = Utc::now();
        if stored.expires_at <= now {
            return Err(invalid());
        }

        let user = self.users.upsert_user(&email, None, Role::User, Some(now)).await?;
        let tokens = self.issue_session(&user)?;
        tracing::info!(user_id = %user.id, "User signed in via magic link");
        Ok((user, tokens))
    }

    /// Demo credentials bypass, provisioning the demo admin on first use
    pub async fn demo_login(&self) -> AppResult<(User, SessionTokens)> {
        if !self.demo_login_enabled {
            return Err(AppError::NotFound("Demo login".to_string()));
        }

        let user = match self.users.find_user_by_email(DEMO_EMAIL).await? {
            Some(user) => user,
            None => {
                tracing::info!("Provisioning demo user");
                self.users
                    .upsert_user(DEMO_EMAIL, Some(DEMO_NAME), Role::Admin, Some(Utc::now()))
                    .await?
            }
        };
        let tokens = self.issue_session(&user)?;
        tracing::info!(user_id = %user.id, "Demo login");
        Ok((user, tokens))
    }

    /// Sign a session token for a user
    pub fn issue_session(&self, user: &User) -> AppResult<SessionTokens> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            exp: (now + Duration::seconds(self.session_ttl_secs)).timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(SessionTokens {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.session_ttl_secs,
        })
    }

    /// Validate session token and return claims
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Resolve the acting user from a session token
    pub fn authenticate(&self, token: &str) -> AppResult<AuthUser> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))?;

        Ok(AuthUser {
            user_id,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    fn service(demo: bool) -> AuthService {
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();
        config.auth.demo_login_enabled = demo;
        AuthService::new(Arc::new(MemoryStore::new()), &config)
    }

    fn token_from(url: &str) -> &str {
        url.rsplit("token=").next().unwrap()
    }

    #[tokio::test]
    async fn test_magic_link_round_trip() {
        let auth = service(false);
        let link = auth.request_magic_link(" Agent@Example.com ").await.unwrap();
        assert_eq!(link.email, "agent@example.com");
        assert!(link.verify_url.contains("email=agent%40example.com"));

        let (user, tokens) = auth
            .verify_magic_link("agent@example.com", token_from(&link.verify_url))
            .await
            .unwrap();
        assert_eq!(user.role, Role::User);
        assert!(user.email_verified.is_some());
        assert_eq!(auth.authenticate(&tokens.access_token).unwrap().user_id, user.id);

        // Single use
        assert!(matches!(
            auth.verify_magic_link("agent@example.com", token_from(&link.verify_url)).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_magic_link_rejects_bad_email() {
        let auth = service(false);
        assert!(matches!(
            auth.request_magic_link("not-an-email").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_demo_login() {
        assert!(matches!(service(false).demo_login().await, Err(AppError::NotFound(_))));

        let auth = service(true);
        let (first, _) = auth.demo_login().await.unwrap();
        let (second, _) = auth.demo_login().await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.role, Role::Admin);
        assert_eq!(first.name.as_deref(), Some(DEMO_NAME));
    }

    #[test]
    fn test_rejects_tampered_token() {
        let auth = service(false);
        assert!(matches!(auth.authenticate("garbage"), Err(AppError::Unauthorized(_))));
    }
}
