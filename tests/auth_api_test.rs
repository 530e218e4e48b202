//! HTTP-level tests for the authentication API.

mod helpers;

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{StatusCode, header};
use serde_json::json;

use cloudbox_core::clock::Clock;
use cloudbox_core::traits::notifier::CodePurpose;

use helpers::TestApp;

const PASSWORD: &str = "Sup3rsecret!";

#[tokio::test]
async fn test_login_and_me() {
    let app = TestApp::new();
    let user_id = app.create_user("alice", PASSWORD).await;

    let data = app.login("alice", PASSWORD).await;
    assert_eq!(data["token_type"], "Bearer");
    assert_eq!(data["user"]["username"], "alice");
    assert!(data["refresh_token"].is_string());
    let access = data["access_token"].as_str().unwrap();

    let response = app.request("GET", "/api/auth/me", None, Some(access)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data_str("id"), user_id.to_string());
    assert_eq!(response.data_str("username"), "alice");
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = TestApp::new();
    app.create_user("alice", PASSWORD).await;

    for identifier in ["alice", "nobody"] {
        let response = app
            .request(
                "POST",
                "/api/auth/login",
                Some(json!({ "identifier": identifier, "password": "Wrong-pass1" })),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.error_code(), "INVALID_CREDENTIALS");
    }
}

#[tokio::test]
async fn test_login_rate_limit_sets_retry_after() {
    let app = TestApp::new();
    app.create_user("alice", PASSWORD).await;
    let body = json!({ "identifier": "alice", "password": "Wrong-pass1" });

    for _ in 0..5 {
        let response = app
            .request("POST", "/api/auth/login", Some(body.clone()), None)
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    app.harness.clock.advance(Duration::from_secs(20));
    let response = app
        .request("POST", "/api/auth/login", Some(body), None)
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.error_code(), "RATE_LIMITED");
    assert_eq!(response.headers[header::RETRY_AFTER], "40");
}

#[tokio::test]
async fn test_protected_routes_need_access_token() {
    let app = TestApp::new();
    app.create_user("alice", PASSWORD).await;
    let data = app.login("alice", PASSWORD).await;

    let anonymous = app.request("GET", "/api/auth/me", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.error_code(), "UNAUTHORIZED");

    let refresh = data["refresh_token"].as_str().unwrap();
    let wrong_type = app.request("GET", "/api/auth/me", None, Some(refresh)).await;
    assert_eq!(wrong_type.status, StatusCode::UNAUTHORIZED);

    let garbage = app
        .request("GET", "/api/auth/me", None, Some("not-a-token"))
        .await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rotates_and_detects_reuse() {
    let app = TestApp::new();
    app.create_user("alice", PASSWORD).await;
    let data = app.login("alice", PASSWORD).await;
    let first_refresh = data["refresh_token"].as_str().unwrap().to_string();

    let rotated = app
        .request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": first_refresh })),
            None,
        )
        .await;
    assert_eq!(rotated.status, StatusCode::OK);
    let second_refresh = rotated.data_str("refresh_token");
    let second_access = rotated.data_str("access_token");
    assert_ne!(second_refresh, first_refresh);

    let me = app
        .request("GET", "/api/auth/me", None, Some(&second_access))
        .await;
    assert_eq!(me.status, StatusCode::OK);

    // Replaying the first token burns the whole family.
    let replay = app
        .request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": first_refresh })),
            None,
        )
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay.body["message"], "Invalid or expired token");

    let successor = app
        .request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": second_refresh })),
            None,
        )
        .await;
    assert_eq!(successor.status, StatusCode::UNAUTHORIZED);
    assert_eq!(successor.body["message"], replay.body["message"]);

    let me = app
        .request("GET", "/api/auth/me", None, Some(&second_access))
        .await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_access_and_family() {
    let app = TestApp::new();
    app.create_user("alice", PASSWORD).await;
    let data = app.login("alice", PASSWORD).await;
    let access = data["access_token"].as_str().unwrap();
    let refresh = data["refresh_token"].as_str().unwrap();

    let response = app
        .request(
            "POST",
            "/api/auth/logout",
            Some(json!({ "refresh_token": refresh })),
            Some(access),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let me = app.request("GET", "/api/auth/me", None, Some(access)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);

    let refreshed = app
        .request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": refresh })),
            None,
        )
        .await;
    assert_eq!(refreshed.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_body() {
    let app = TestApp::new();
    app.create_user("alice", PASSWORD).await;
    let data = app.login("alice", PASSWORD).await;
    let access = data["access_token"].as_str().unwrap();

    let response = app
        .request("POST", "/api/auth/logout", None, Some(access))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let me = app.request("GET", "/api/auth/me", None, Some(access)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_then_duplicate() {
    let app = TestApp::new();
    let body = json!({
        "username": "bob",
        "email": "bob@example.com",
        "password": PASSWORD,
    });

    let created = app
        .request("POST", "/api/auth/signup", Some(body.clone()), None)
        .await;
    assert_eq!(created.status, StatusCode::OK);
    assert_eq!(created.data()["user"]["username"], "bob");
    assert!(created.data()["access_token"].is_string());

    let duplicate = app
        .request("POST", "/api/auth/signup", Some(body), None)
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let weak = app
        .request(
            "POST",
            "/api/auth/signup",
            Some(json!({ "username": "carol", "password": "short" })),
            None,
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    assert_eq!(weak.error_code(), "VALIDATION_ERROR");
}

fn signup_body(i: usize) -> serde_json::Value {
    json!({
        "username": format!("user{i}"),
        "email": format!("user{i}@example.com"),
        "password": PASSWORD,
    })
}

#[tokio::test]
async fn test_signup_limit_ignores_untrusted_forwarded_header() {
    let app = TestApp::new();
    let peer = SocketAddr::from(([192, 0, 2, 10], 40000));

    let mut statuses = Vec::new();
    for i in 0..6 {
        let forwarded = format!("198.51.100.{i}");
        let response = app
            .request_from(
                peer,
                Some(&forwarded),
                "POST",
                "/api/auth/signup",
                Some(signup_body(i)),
            )
            .await;
        statuses.push(response.status);
    }
    assert_eq!(&statuses[..5], &[StatusCode::OK; 5]);
    assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_signup_limit_keys_on_client_behind_trusted_proxy() {
    let proxy = SocketAddr::from(([10, 0, 0, 1], 40000));
    let app = TestApp::with_config(|c| c.server.trusted_proxies = vec![proxy.ip()]);

    for i in 0..6 {
        let forwarded = format!("198.51.100.{i}");
        let response = app
            .request_from(
                proxy,
                Some(&forwarded),
                "POST",
                "/api/auth/signup",
                Some(signup_body(i)),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    }

    // Same client address behind the proxy shares one window.
    for i in 6..11 {
        app.request_from(proxy, Some("203.0.113.5"), "POST", "/api/auth/signup", Some(signup_body(i)))
            .await;
    }
    let limited = app
        .request_from(proxy, Some("203.0.113.5"), "POST", "/api/auth/signup", Some(signup_body(11)))
        .await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_password_change_signs_out_other_sessions() {
    let app = TestApp::new();
    app.create_user("alice", PASSWORD).await;
    let other = app.login("alice", PASSWORD).await;
    let current = app.login("alice", PASSWORD).await;

    let response = app
        .request(
            "PUT",
            "/api/auth/password",
            Some(json!({
                "current_password": PASSWORD,
                "new_password": "N3w-password!",
            })),
            Some(current["access_token"].as_str().unwrap()),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let fresh_access = response.data_str("access_token");

    let refresh = app
        .request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": other["refresh_token"] })),
            None,
        )
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);

    let stale = app
        .request(
            "GET",
            "/api/auth/me",
            None,
            Some(other["access_token"].as_str().unwrap()),
        )
        .await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);

    let me = app
        .request("GET", "/api/auth/me", None, Some(&fresh_access))
        .await;
    assert_eq!(me.status, StatusCode::OK);

    app.login("alice", "N3w-password!").await;
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::new();
    app.create_user("alice", PASSWORD).await;

    let requested = app
        .request(
            "POST",
            "/api/auth/password-reset",
            Some(json!({ "identifier": "alice@example.com" })),
            None,
        )
        .await;
    assert_eq!(requested.status, StatusCode::OK);
    let reset_id = requested.data_str("reset_id");
    let code = app
        .harness
        .sender
        .last_code(CodePurpose::PasswordReset)
        .unwrap();

    let confirmed = app
        .request(
            "POST",
            "/api/auth/password-reset/confirm",
            Some(json!({
                "reset_id": reset_id,
                "code": code,
                "new_password": "Res3t-password!",
            })),
            None,
        )
        .await;
    assert_eq!(confirmed.status, StatusCode::OK);

    let reused = app
        .request(
            "POST",
            "/api/auth/password-reset/confirm",
            Some(json!({
                "reset_id": reset_id,
                "code": code,
                "new_password": "An0ther-password!",
            })),
            None,
        )
        .await;
    assert_eq!(reused.status, StatusCode::UNAUTHORIZED);

    app.login("alice", "Res3t-password!").await;
}

#[tokio::test]
async fn test_password_reset_hides_unknown_accounts() {
    let app = TestApp::new();
    let response = app
        .request(
            "POST",
            "/api/auth/password-reset",
            Some(json!({ "identifier": "ghost" })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(!response.data_str("reset_id").is_empty());
    assert!(app.harness.sender.sent().is_empty());
}

#[tokio::test]
async fn test_mfa_enrollment_gates_login() {
    let app = TestApp::new();
    app.create_user("alice", PASSWORD).await;
    let data = app.login("alice", PASSWORD).await;
    let access = data["access_token"].as_str().unwrap();

    let enrolled = app
        .request("POST", "/api/auth/mfa/enroll", None, Some(access))
        .await;
    assert_eq!(enrolled.status, StatusCode::OK);
    assert_eq!(enrolled.data()["enabled"], false);
    let secret = enrolled.data_str("secret");

    let code_now = |app: &TestApp| {
        let now = app.harness.clock.now().timestamp() as u64;
        app.harness.mfa.totp().code_at(&secret, now).unwrap()
    };

    let enabled = app
        .request(
            "POST",
            "/api/auth/mfa/enable",
            Some(json!({ "code": code_now(&app) })),
            Some(access),
        )
        .await;
    assert_eq!(enabled.status, StatusCode::OK);

    let without_code = app
        .request(
            "POST",
            "/api/auth/login",
            Some(json!({ "identifier": "alice", "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(without_code.status, StatusCode::UNAUTHORIZED);
    assert_eq!(without_code.error_code(), "MFA_REQUIRED");

    // The enabling code's step is spent; move to the next one.
    app.harness.clock.advance(Duration::from_secs(30));
    let with_code = app
        .request(
            "POST",
            "/api/auth/login",
            Some(json!({
                "identifier": "alice",
                "password": PASSWORD,
                "totp_code": code_now(&app),
            })),
            None,
        )
        .await;
    assert_eq!(with_code.status, StatusCode::OK);

    let replay = app
        .request(
            "POST",
            "/api/auth/login",
            Some(json!({
                "identifier": "alice",
                "password": PASSWORD,
                "totp_code": code_now(&app),
            })),
            None,
        )
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay.error_code(), "MFA_INVALID");
}

#[tokio::test]
async fn test_mfa_disable_requires_enrollment() {
    let app = TestApp::new();
    app.create_user("alice", PASSWORD).await;
    let data = app.login("alice", PASSWORD).await;

    let response = app
        .request(
            "POST",
            "/api/auth/mfa/disable",
            Some(json!({ "code": "123456" })),
            Some(data["access_token"].as_str().unwrap()),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_code(), "MFA_NOT_ENROLLED");
}

#[tokio::test]
async fn test_email_code_send_and_verify() {
    let app = TestApp::new();
    app.create_user("alice", PASSWORD).await;
    let data = app.login("alice", PASSWORD).await;
    let access = data["access_token"].as_str().unwrap();

    let sent = app
        .request("POST", "/api/auth/email-code/send", None, Some(access))
        .await;
    assert_eq!(sent.status, StatusCode::OK);
    assert!(sent.data().get("code").is_none());
    let code = app
        .harness
        .sender
        .last_code(CodePurpose::EmailVerification)
        .unwrap();

    let verified = app
        .request(
            "POST",
            "/api/auth/email-code/verify",
            Some(json!({ "code": code })),
            Some(access),
        )
        .await;
    assert_eq!(verified.status, StatusCode::OK);
    assert_eq!(verified.data()["verified"], true);

    let again = app
        .request(
            "POST",
            "/api/auth/email-code/verify",
            Some(json!({ "code": code })),
            Some(access),
        )
        .await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.data()["verified"], false);
}

#[tokio::test]
async fn test_store_outage() {
    let app = TestApp::new();
    app.create_user("alice", PASSWORD).await;
    let data = app.login("alice", PASSWORD).await;
    let access = data["access_token"].as_str().unwrap();
    let refresh = data["refresh_token"].as_str().unwrap();

    app.harness.set_store_down(true);

    let refreshed = app
        .request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": refresh })),
            None,
        )
        .await;
    assert_eq!(refreshed.status, StatusCode::SERVICE_UNAVAILABLE);

    // Validation fails closed, so the gate leaves the request anonymous.
    let me = app.request("GET", "/api/auth/me", None, Some(access)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);

    let health = app.request("GET", "/api/health", None, None).await;
    assert_eq!(health.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health.data()["store"]["healthy"], false);

    app.harness.set_store_down(false);
    let me = app.request("GET", "/api/auth/me", None, Some(access)).await;
    assert_eq!(me.status, StatusCode::OK);
}

#[tokio::test]
async fn test_api_rate_limit() {
    let app = TestApp::with_config(|c| {
        c.rate_limit.api.max_requests = 2;
    });

    for _ in 0..2 {
        let response = app.request("GET", "/api/health", None, None).await;
        assert_eq!(response.status, StatusCode::OK);
    }
    let limited = app.request("GET", "/api/health", None, None).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers.contains_key(header::RETRY_AFTER));
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.request("GET", "/api/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data_str("status"), "ok");
    assert_eq!(response.data()["store"]["healthy"], true);
    assert!(response.data().get("database").is_none());
}
