//! Shared fixtures for the handler and orchestrator tests.

use crate::chat::gateway::{AiGateway, GatewayError, TranscriptTurn};
use crate::chat::hub::BroadcastHub;
use crate::server::{create_router, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use lib_auth::encode_jwt;
use lib_core::model::store::create_memory_pool;
use lib_core::{Config, UserId};
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub const TEST_SECRET: &str = "test-secret-key-must-be-at-least-32-characters-long!";

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiration_hours: 24,
        bind_address: "127.0.0.1:0".to_string(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
    }
}

/// Gateway returning a fixed result and recording every transcript it is sent.
pub struct ScriptedGateway {
    reply: Result<String, GatewayError>,
    seen: Mutex<Vec<Vec<TranscriptTurn>>>,
}

impl ScriptedGateway {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: Err(GatewayError::UpstreamUnavailable("connection refused".to_string())),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Vec<TranscriptTurn>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiGateway for ScriptedGateway {
    async fn complete(&self, transcript: &[TranscriptTurn]) -> Result<String, GatewayError> {
        self.seen.lock().unwrap().push(transcript.to_vec());
        self.reply.clone()
    }
}

/// Application state over a fresh in-memory database and a private hub.
pub async fn test_state(gateway: Arc<ScriptedGateway>) -> AppState {
    let pool = create_memory_pool().await.expect("In-memory database should be created");
    AppState::new(pool, test_config(), gateway, Arc::new(BroadcastHub::new()))
}

pub async fn test_app(gateway: Arc<ScriptedGateway>) -> (Router, AppState) {
    let state = test_state(gateway).await;
    (create_router(state.clone()), state)
}

pub fn bearer(user_id: UserId) -> String {
    let token = encode_jwt(user_id, format!("user{}@example.com", user_id), TEST_SECRET, 1)
        .expect("Token should encode");
    format!("Bearer {}", token)
}

pub fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
