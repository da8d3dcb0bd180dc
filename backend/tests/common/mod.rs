//! Router harness over the in-memory store

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use buyer_leads_backend::{
    config::StorageBackend,
    create_app,
    models::{Role, User},
    repository::{MemoryStore, UserRepository},
    services::{AuthService, ManualClock, RateLimiter},
    AppState, Config,
};
use serde_json::Value;
use tower::ServiceExt;

pub const BOUNDARY: &str = "buyer-leads-test-boundary";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.environment = "test".to_string();
    config.storage.backend = StorageBackend::Memory;
    config.jwt.secret = "integration-test-secret".to_string();
    config.auth.demo_login_enabled = true;
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new());
        let rate_limiter = Arc::new(RateLimiter::with_clock(
            config.rate_limit.capacity,
            config.rate_limit.refill_per_second,
            &clock,
        ));
        let state = AppState::with_store(config, store.clone(), rate_limiter);

        Self {
            app: create_app(state.clone()),
            state,
            store,
            clock,
        }
    }

    /// Create a user and a session token for them
    pub async fn user(&self, email: &str, role: Role) -> (User, String) {
        let user = self
            .store
            .upsert_user(email, Some("Test Agent"), role, None)
            .await
            .unwrap();
        let auth = AuthService::new(self.state.users.clone(), &self.state.config);
        let token = auth.issue_session(&user).unwrap().access_token;
        (user, token)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, bytes.to_vec())
    }

    /// JSON request; the response body is parsed as JSON when present
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.request_with_headers(method, uri, token, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        extra: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        for (name, value) in extra {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let (status, _, bytes) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Upload CSV text as the multipart field `file`
    pub async fn upload_csv(&self, token: &str, csv: &str) -> (StatusCode, Value) {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"buyers.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
            b = BOUNDARY,
            csv = csv
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/buyers/csv")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        let (status, _, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

/// The minimal valid Plot buyer
pub fn plot_buyer() -> Value {
    serde_json::json!({
        "fullName": "John Doe",
        "phone": "9876543210",
        "city": "Mohali",
        "propertyType": "Plot",
        "purpose": "Buy",
        "timeline": "Exploring",
        "source": "Website"
    })
}
