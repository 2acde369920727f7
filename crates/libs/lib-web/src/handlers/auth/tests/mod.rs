//! # Auth Handler Tests
//!
//! Test suite for the registration and login handlers, run against the full
//! router over an in-memory database.


use crate::test_support::{body_json as read_json, json_request, test_app, ScriptedGateway};
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

pub async fn app() -> Router {
    test_app(ScriptedGateway::replying("unused")).await.0
}

pub async fn register_user(app: &Router, email: &str, password: &str) -> Response<Body> {
    post(app, "/auth/register", json!({ "email": email, "password": password })).await
}

pub async fn login_user(app: &Router, email: &str, password: &str) -> Response<Body> {
    post(app, "/auth/login", json!({ "email": email, "password": password })).await
}

pub async fn post(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, json_request("POST", uri, None, body)).await
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn assert_status(response: &Response<Body>, status: StatusCode) {
    assert_eq!(response.status(), status);
}
