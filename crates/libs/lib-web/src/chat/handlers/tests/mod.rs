//! # Chat Handler Tests
//!
//! Chat routes driven through the full router with `oneshot`, over an
//! in-memory database and a scripted AI gateway.

mod messages;

use crate::test_support::{bearer, body_json, get_request, json_request, test_app, ScriptedGateway};
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}
