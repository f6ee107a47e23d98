#![allow(dead_code)]

//! Shared harness for the router tests: in-memory adapters, a manual clock and
//! a dispatcher that remembers every code and link it was asked to send.

use api_lib::{
    adapters::MemoryAdapter,
    config::{Config, RateLimitSettings},
    web::{self, AppState},
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use study_core::{CodeDispatcher, ContactKey, ManualClock, PortResult};
use tower::ServiceExt;
use tracing::Level;

#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<(String, String)>>,
    links: Mutex<Vec<(String, String)>>,
}

impl RecordingDispatcher {
    pub fn last_code_for(&self, contact: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == contact)
            .map(|(_, code)| code.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_link_for(&self, contact: &str) -> Option<String> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == contact)
            .map(|(_, link)| link.clone())
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }
}

#[async_trait]
impl CodeDispatcher for RecordingDispatcher {
    async fn send_code(&self, contact: &ContactKey, code: &str, _first_name: &str) -> PortResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((contact.as_str().to_string(), code.to_string()));
        Ok(())
    }

    async fn send_reset_link(
        &self,
        contact: &ContactKey,
        link: &str,
        _first_name: &str,
    ) -> PortResult<()> {
        self.links
            .lock()
            .unwrap()
            .push((contact.as_str().to_string(), link.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub dispatcher: Arc<RecordingDispatcher>,
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: None,
        log_level: Level::INFO,
        cors_origin: "http://localhost:5173".to_string(),
        frontend_url: "http://localhost:5173".to_string(),
        otp_ttl_secs: 300,
        otp_sweep_interval_secs: 600,
        otp_rate_limit: RateLimitSettings {
            max_requests: 3,
            window_secs: 15 * 60,
        },
        reset_rate_limit: RateLimitSettings {
            max_requests: 3,
            window_secs: 60 * 60,
        },
        email: None,
        sms: None,
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
        ));
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let storage = Arc::new(MemoryAdapter::new());
        let state = Arc::new(AppState::new(
            Arc::new(config),
            storage.clone(),
            storage,
            dispatcher.clone(),
            clock.clone(),
        ));
        Self {
            router: web::router(state),
            clock,
            dispatcher,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    /// Sends a JSON body as-is, for requests that must not parse.
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: &str,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.dispatch(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// POSTs a JSON body as if from the client at `ip`.
    pub async fn post_from(&self, ip: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, json) = self.dispatch(request).await;
        (status, json)
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, headers, json)
    }

    /// Runs the email signup flow end to end and returns the session cookie.
    pub async fn sign_up(&self, email: &str, first_name: &str) -> String {
        let (status, _, _) = self
            .send(
                Method::POST,
                "/verification/email/send",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "firstName": first_name,
                    "lastName": "Tester",
                    "password": "secret-pass",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let code = self.dispatcher.last_code_for(email).unwrap();
        let (status, headers, _) = self
            .send(
                Method::POST,
                "/verification/email/verify",
                None,
                Some(serde_json::json!({ "email": email, "otp": code })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        session_cookie(&headers)
    }
}

/// The `session=<id>` pair from a `Set-Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> String {
    headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string()
}
