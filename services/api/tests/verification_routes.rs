mod common;

use api_lib::config::{Config, RateLimitSettings};
use axum::http::{Method, StatusCode};
use chrono::Duration;
use common::{session_cookie, test_config, TestApp};
use serde_json::json;

async fn start_signup(app: &TestApp, email: &str) {
    let (status, _, body) = app
        .send(
            Method::POST,
            "/verification/email/send",
            None,
            Some(json!({
                "email": email,
                "firstName": "Ada",
                "lastName": "Lovelace",
                "password": "analytical",
                "userType": "host",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn wrong_code_then_right_code_creates_account_once() {
    let app = TestApp::new();
    start_signup(&app, "a@x.com").await;
    let code = app.dispatcher.last_code_for("a@x.com").unwrap();
    assert_eq!(code.len(), 6);

    let (status, _, body) = app
        .send(
            Method::POST,
            "/verification/email/verify",
            None,
            Some(json!({ "email": "a@x.com", "otp": "000000" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "InvalidCode");

    let (status, headers, body) = app
        .send(
            Method::POST,
            "/verification/email/verify",
            None,
            Some(json!({ "email": "a@x.com", "otp": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "a@x.com");
    assert_eq!(body["user"]["firstName"], "Ada");
    assert_eq!(body["user"]["userType"], "host");
    assert!(session_cookie(&headers).starts_with("session="));

    let (status, _, body) = app
        .send(
            Method::POST,
            "/verification/email/verify",
            None,
            Some(json!({ "email": "a@x.com", "otp": code })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "SessionExpired");
}

#[tokio::test]
async fn expired_code_is_rejected_and_discarded() {
    let app = TestApp::new();
    start_signup(&app, "late@x.com").await;
    let code = app.dispatcher.last_code_for("late@x.com").unwrap();

    app.clock.advance(Duration::seconds(301));

    let (status, _, body) = app
        .send(
            Method::POST,
            "/verification/email/verify",
            None,
            Some(json!({ "email": "late@x.com", "otp": code })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "CodeExpired");

    let (_, _, body) = app
        .send(
            Method::POST,
            "/verification/email/verify",
            None,
            Some(json!({ "email": "late@x.com", "otp": code })),
        )
        .await;
    assert_eq!(body["error"], "SessionExpired");
}

#[tokio::test]
async fn resend_issues_a_fresh_code_that_verifies() {
    let app = TestApp::new();
    start_signup(&app, "again@x.com").await;

    app.clock.advance(Duration::seconds(290));
    let (status, _, _) = app
        .send(
            Method::POST,
            "/verification/email/resend",
            None,
            Some(json!({ "email": "again@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.dispatcher.sent_count(), 2);

    // Past the first code's expiry but within the resent one's.
    app.clock.advance(Duration::seconds(60));
    let code = app.dispatcher.last_code_for("again@x.com").unwrap();
    let (status, _, _) = app
        .send(
            Method::POST,
            "/verification/email/verify",
            None,
            Some(json!({ "email": "again@x.com", "otp": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn resend_without_signup_is_session_expired() {
    let app = TestApp::new();
    let (status, _, body) = app
        .send(
            Method::POST,
            "/verification/email/resend",
            None,
            Some(json!({ "email": "nobody@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "SessionExpired");
    assert_eq!(app.dispatcher.sent_count(), 0);
}

#[tokio::test]
async fn registered_email_cannot_sign_up_again() {
    let app = TestApp::new();
    app.sign_up("taken@x.com", "Ada").await;

    let (status, _, body) = app
        .send(
            Method::POST,
            "/verification/email/send",
            None,
            Some(json!({
                "email": "taken@x.com",
                "firstName": "Other",
                "password": "another-pass",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyRegistered");
}

#[tokio::test]
async fn invalid_signup_fields_are_rejected_before_dispatch() {
    let app = TestApp::with_config(Config {
        otp_rate_limit: RateLimitSettings {
            max_requests: 10,
            window_secs: 60,
        },
        ..test_config()
    });
    for payload in [
        json!({ "email": "not-an-email", "firstName": "Ada", "password": "secret-pass" }),
        json!({ "email": "a@x.com", "firstName": "Ada", "password": "short" }),
        json!({ "email": "a@x.com", "firstName": "  ", "password": "secret-pass" }),
        json!({ "email": "a@x.com", "firstName": "Ada", "password": "secret-pass", "userType": "admin" }),
    ] {
        let (status, _, body) = app
            .send(Method::POST, "/verification/email/send", None, Some(payload))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidInput");
    }
    assert_eq!(app.dispatcher.sent_count(), 0);
}

#[tokio::test]
async fn phone_signup_round_trip() {
    let app = TestApp::new();
    let (status, _, _) = app
        .send(
            Method::POST,
            "/verification/phone/send",
            None,
            Some(json!({
                "phoneNumber": "+15551234567",
                "firstName": "Grace",
                "lastName": "Hopper",
                "password": "cobol-rules",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let code = app.dispatcher.last_code_for("+15551234567").unwrap();
    let (status, _, body) = app
        .send(
            Method::POST,
            "/verification/phone/verify",
            None,
            Some(json!({ "phoneNumber": "+15551234567", "otp": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["phoneNumber"], "+15551234567");
    assert_eq!(body["user"]["email"], serde_json::Value::Null);
}

#[tokio::test]
async fn verified_user_can_log_in_and_out() {
    let app = TestApp::new();
    app.sign_up("login@x.com", "Ada").await;

    let (status, _, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "login@x.com", "password": "wrong-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, headers, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "login@x.com", "password": "secret-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "login@x.com");
    let cookie = session_cookie(&headers);

    let (status, _, _) = app.send(Method::GET, "/stats", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = app
        .send(Method::POST, "/auth/logout", Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = app.send(Method::GET, "/stats", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn fourth_code_request_within_the_window_is_refused() {
    let app = TestApp::new();
    let signup = |email: &str| {
        json!({ "email": email, "firstName": "Ada", "password": "secret-pass" })
    };

    for n in 0..3 {
        let (status, _) = app
            .post_from("203.0.113.7", "/verification/email/send", signup(&format!("u{n}@x.com")))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app
        .post_from("203.0.113.7", "/verification/email/resend", json!({ "email": "u0@x.com" }))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "RateLimited");
    assert_eq!(
        body["message"],
        "Too many verification requests. Please try again in 15 minutes."
    );
    assert_eq!(app.dispatcher.sent_count(), 3);

    // Other clients keep their own allowance.
    let (status, _) = app
        .post_from("198.51.100.2", "/verification/email/send", signup("other@x.com"))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Checking a code is not counted.
    let code = app.dispatcher.last_code_for("u1@x.com").unwrap();
    let (status, body) = app
        .post_from(
            "203.0.113.7",
            "/verification/email/verify",
            json!({ "email": "u1@x.com", "otp": code }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}
