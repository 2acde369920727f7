//! # Server Setup
//!
//! Server initialization, route registration, and HTTP server startup.
//!
//! [`start_server`] installs logging, loads and validates configuration,
//! opens the database and applies migrations, builds the chat services, then
//! serves the router returned by [`create_router`].

// region: --- Imports
use crate::chat::handlers::{ai_chat, chat_turn, chat_websocket, create_message, list_messages};
use crate::chat::{AiGateway, BroadcastHub, ChatOrchestrator, GatewayConfig, OpenAiGateway};
use crate::handlers;
use crate::middleware::{log_requests, require_auth, stamp_req, RequestStamp};
use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use lib_auth::TokenValidator;
use lib_core::config::init_config;
use lib_core::{create_pool, run_migrations, Config, DbPool, MessageRepository};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
// endregion: --- Imports

// region: --- AppState
/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub chat: Arc<ChatOrchestrator>,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    /// Wire the chat services over a pool and gateway.
    pub fn new(db: DbPool, config: Config, gateway: Arc<dyn AiGateway>, hub: Arc<BroadcastHub>) -> Self {
        Self::with_context_window(db, config, gateway, hub, crate::chat::orchestrator::DEFAULT_CONTEXT_WINDOW)
    }

    pub fn with_context_window(
        db: DbPool,
        config: Config,
        gateway: Arc<dyn AiGateway>,
        hub: Arc<BroadcastHub>,
        context_window: usize,
    ) -> Self {
        let chat = ChatOrchestrator::new(
            TokenValidator::new(&config.jwt_secret),
            Arc::new(MessageRepository::new(db.clone())),
            hub.clone(),
            gateway,
        )
        .with_context_window(context_window);

        Self {
            db,
            config,
            chat: Arc::new(chat),
            hub,
        }
    }
}

impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<ChatOrchestrator> {
    fn from_ref(state: &AppState) -> Self {
        state.chat.clone()
    }
}
// endregion: --- AppState

// region: --- Server Setup
/// Install the global tracing subscriber, level from `LOG_LEVEL` (default `info`).
fn init_tracing() -> anyhow::Result<String> {
    let log_level = std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase();

    let filter = match log_level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => tracing_subscriber::EnvFilter::new(&log_level),
        _ => tracing_subscriber::EnvFilter::new("info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set global tracing subscriber: {}", e))?;

    Ok(log_level)
}

/// Initialize and start the HTTP server.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration loading or validation fails
/// - Database connection or migrations fail
/// - The HTTP client for the AI service cannot be built
/// - Server binding fails
pub async fn start_server() -> anyhow::Result<()> {
    let log_level = init_tracing()?;

    info!("AI CHAT BACKEND STARTING");
    info!("Log level: {}", log_level);

    info!("Loading configuration...");
    let app_config = init_config().map_err(|e| anyhow::anyhow!(e))?.clone();
    let gateway_config = GatewayConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    if !gateway_config.is_configured() {
        tracing::warn!(
            "No {} set; chat turns will answer with the fallback reply",
            gateway_config.provider.api_key_env()
        );
    }

    // Ensure data directory exists for SQLite database
    if let Some(db_path) = app_config.database_url.strip_prefix("sqlite:") {
        let db_path = db_path.trim_start_matches("//");
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                info!("Created database directory: {:?}", parent);
            }
        }
    }

    info!("Connecting to database: {}", app_config.database_url);
    let pool = create_pool(&app_config.database_url).await?;

    info!("Running database migrations...");
    run_migrations(&pool).await?;
    info!("Migrations complete");

    let context_window = gateway_config.context_window;
    let gateway: Arc<dyn AiGateway> = Arc::new(OpenAiGateway::new(gateway_config)?);
    let state = AppState::with_context_window(
        pool,
        app_config.clone(),
        gateway,
        BroadcastHub::global(),
        context_window,
    );

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&app_config.bind_address).await?;

    info!("SERVER READY: http://{}", app_config.bind_address);
    log_server_info();

    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the main application router with all routes
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    info!("[ROUTE SETUP] Registering HTTP routes...");

    // Bearer-protected chat routes
    let chat_routes = Router::new()
        .route("/messages", get(list_messages).post(create_message))
        .route("/ai-chat", post(ai_chat))
        .route("/chat", post(chat_turn))
        .route_layer(from_fn_with_state(state.chat.clone(), require_auth));

    Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/ws", get(chat_websocket))
        .route("/health", get(|| async { "OK" }))
        .merge(chat_routes)
        .fallback(|| async { (axum::http::StatusCode::NOT_FOUND, "Route not found") })
        .with_state(state)
        .layer(from_fn(log_requests))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .extensions()
                        .get::<RequestStamp>()
                        .map(|s| s.id.clone())
                        .unwrap_or_else(|| "unknown".to_string());
                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri().path(),
                    )
                })
                .on_failure(
                    |error: tower_http::classify::ServerErrorsFailureClass,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::error!(
                            error = ?error,
                            latency_ms = latency.as_millis(),
                            "[HTTP FAILURE]"
                        );
                    },
                ),
        )
        // Outermost, so the id is present for the span and the request log
        .layer(from_fn(stamp_req))
        .layer(cors)
}

/// Log server information
fn log_server_info() {
    info!(" AUTH:");
    info!("   • POST /auth/register");
    info!("   • POST /auth/login");
    info!(" CHAT (Authorization: Bearer <token>):");
    info!("   • GET  /messages");
    info!("   • POST /messages");
    info!("   • POST /ai-chat");
    info!("   • POST /chat");
    info!(" REAL-TIME:");
    info!("   • GET  /ws?token={{token}}");
    info!(" HEALTH:");
    info!("   • GET  /health");
}
// endregion: --- Server Setup

#[cfg(test)]
mod tests {
    use crate::test_support::{get_request, test_app, ScriptedGateway};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_and_request_id() {
        let (app, _) = test_app(ScriptedGateway::replying("unused")).await;

        let response = app.oneshot(get_request("/health", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (app, _) = test_app(ScriptedGateway::replying("unused")).await;

        let response = app.oneshot(get_request("/nope", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
