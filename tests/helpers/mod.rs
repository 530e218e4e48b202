//! Shared test helpers for HTTP-level tests.

use std::net::SocketAddr;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use cloudbox_api::AppState;
use cloudbox_api::router::build_router;
use cloudbox_auth::testing::Harness;
use cloudbox_core::config::AppConfig;

/// Router wired over the in-memory auth harness.
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Auth components, fakes and the manual clock
    pub harness: Harness,
}

impl TestApp {
    /// Create a test application with default test configuration.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a test application with a tweaked configuration.
    pub fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let harness = Harness::with_config(tweak);
        let state = AppState::new(
            harness.config.clone(),
            harness.switchable.clone(),
            None,
            harness.services().clone(),
        );
        Self {
            router: build_router(state),
            harness,
        }
    }

    /// Create an active account with `{username}@example.com`.
    pub async fn create_user(&self, username: &str, password: &str) -> uuid::Uuid {
        self.harness.create_user(username, password).await.id
    }

    /// Log in and return the `data` object of the response.
    pub async fn login(&self, identifier: &str, password: &str) -> Value {
        let response = self
            .request(
                "POST",
                "/api/auth/login",
                Some(json!({ "identifier": identifier, "password": password })),
                None,
            )
            .await;
        assert_eq!(
            response.status,
            StatusCode::OK,
            "Login failed: {:?}",
            response.body
        );
        response.data().clone()
    }

    /// Make an HTTP request to the test app
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut req = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        self.send(req, body).await
    }

    /// Make an unauthenticated request arriving from `peer`, optionally
    /// carrying an `X-Forwarded-For` header.
    pub async fn request_from(
        &self,
        peer: SocketAddr,
        forwarded_for: Option<&str>,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> TestResponse {
        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .extension(ConnectInfo(peer));
        if let Some(forwarded_for) = forwarded_for {
            req = req.header("X-Forwarded-For", forwarded_for);
        }
        self.send(req, body).await
    }

    async fn send(&self, mut req: axum::http::request::Builder, body: Option<Value>) -> TestResponse {
        if body.is_some() {
            req = req.header("Content-Type", "application/json");
        }
        let body = match body {
            Some(value) => Body::from(serde_json::to_vec(&value).expect("Failed to serialize body")),
            None => Body::empty(),
        };
        let req = req.body(body).expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Parsed JSON body
    pub body: Value,
}

impl TestResponse {
    /// The `data` field of a success envelope.
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// The machine-readable code of an error body.
    pub fn error_code(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }

    /// A string field of the `data` object.
    pub fn data_str(&self, field: &str) -> String {
        self.data()[field]
            .as_str()
            .unwrap_or_else(|| panic!("missing data.{field} in {:?}", self.body))
            .to_string()
    }
}
