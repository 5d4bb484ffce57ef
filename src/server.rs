//! Command API server and logging setup.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use flowhands_config::{Config, LoggingConfig};
use flowhands_core::{CommandMessage, CommandReply, ReplyStatus, RequestRouter};

use crate::app::FlowApp;

pub(crate) fn flowhands_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".flowhands"))
        .unwrap_or_else(|| PathBuf::from(".flowhands"))
}

/// Initialize tracing with console and, unless disabled, file output.
///
/// Log files go to `logging.dir` (default `~/.flowhands/logs`) with daily
/// rotation. `RUST_LOG` overrides `logging.level`.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let file_layer = if logging.file {
        let log_dir = logging.dir.clone().unwrap_or_else(|| flowhands_dir().join("logs"));
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("flowhands")
            .filename_suffix("log")
            .max_log_files(30)
            .build(&log_dir)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // The guard flushes on drop; keep it for the life of the process.
        static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
            std::sync::OnceLock::new();
        let _ = GUARD.set(guard);

        Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(file_layer)
        .init();

    Ok(())
}

#[derive(Clone)]
pub(crate) struct AppState {
    router: Arc<RequestRouter>,
}

/// Build the command API.
///
/// ```text
/// POST /commands        - Run a command, reply when it finishes
/// POST /commands/async  - Start a command, reply `started` (202)
/// GET  /commands/{id}   - Terminal reply of a started command
/// GET  /status          - Orchestrator state and history
/// GET  /health          - Liveness
/// ```
pub(crate) fn create_router(router: Arc<RequestRouter>) -> Router {
    Router::new()
        .route("/commands", post(run_command))
        .route("/commands/async", post(start_command))
        .route("/commands/{id}", get(command_reply))
        .route("/status", get(status))
        .route("/health", get(health))
        .with_state(AppState { router })
}

async fn run_command(
    State(state): State<AppState>,
    Json(message): Json<CommandMessage>,
) -> impl IntoResponse {
    let reply = state.router.dispatch(message).await;
    (reply_status_code(&reply), Json(reply))
}

async fn start_command(
    State(state): State<AppState>,
    Json(message): Json<CommandMessage>,
) -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(state.router.submit(message)))
}

async fn command_reply(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.router.reply_for(&id) {
        Some(reply) => (reply_status_code(&reply), Json(json!(reply))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"requestId": id, "error": "no reply available"})),
        ),
    }
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.router.orchestrator().status())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "busy": state.router.orchestrator().is_busy(),
    }))
}

fn reply_status_code(reply: &CommandReply) -> StatusCode {
    if reply.status != ReplyStatus::Error {
        return StatusCode::OK;
    }
    match reply.field("code").and_then(|c| c.as_str()) {
        Some("invalid_request") => StatusCode::BAD_REQUEST,
        Some("busy") => StatusCode::CONFLICT,
        Some("timeout") => StatusCode::GATEWAY_TIMEOUT,
        Some("generation_failed") | Some("upstream_http_error") => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Attach to the tool tab and serve until Ctrl-C.
pub(crate) async fn run_server(
    config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting flowhands v{}", env!("CARGO_PKG_VERSION"));
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let app = FlowApp::attach(&config).await?;
    let routes = create_router(app.router());

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Command API listening on http://{}", addr);

    axum::serve(listener, routes)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down...");
    app.shutdown().await;
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
