//! HTTP server for the chat API
//!
//! `POST /chat` runs a message through the same command handler as the voice
//! loop on the text channel. `GET /status` reports the loop's state.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use super::types::{ActiveFlow, ChatRequest, ChatResponse, ErrorResponse, StatusResponse};
use crate::context::AssistantContext;
use crate::dispatch::{CommandHandler, Phase};
use crate::flow::Channel;

/// State shared by the request handlers
#[derive(Clone)]
pub struct AppState {
    ctx: Arc<AssistantContext>,
    handler: CommandHandler,
    status: Arc<RwLock<ServerStatus>>,
}

struct ServerStatus {
    phase: Phase,
    start_time: Instant,
}

impl AppState {
    pub fn new(ctx: Arc<AssistantContext>) -> Self {
        Self {
            handler: CommandHandler::new(ctx.clone()),
            ctx,
            status: Arc::new(RwLock::new(ServerStatus {
                phase: Phase::Idle,
                start_time: Instant::now(),
            })),
        }
    }

    /// Record the voice loop's current phase
    pub async fn set_phase(&self, phase: Phase) {
        let mut status = self.status.write().await;
        if status.phase != phase {
            debug!(from = %status.phase, to = %phase, "API: phase updated");
        }
        status.phase = phase;
    }
}

/// Errors returned to API clients
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/status", get(status))
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let reply = state.handler.handle(Channel::Text, &request.message).await;
    Ok(Json(ChatResponse {
        response: reply.text,
    }))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let active_flow = state.ctx.flows().active().map(ActiveFlow::from);
    let status = state.status.read().await;

    Json(StatusResponse {
        listening: state.ctx.is_listening(),
        server_time: chrono::Local::now().to_rfc3339(),
        phase: status.phase,
        active_flow,
        uptime_secs: status.start_time.elapsed().as_secs(),
    })
}

/// Chat API server
pub struct Server {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
}

impl Server {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr, ctx: Arc<AssistantContext>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind chat API on {addr}"))?;
        let local_addr = listener
            .local_addr()
            .context("failed to read chat API address")?;

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            state: AppState::new(ctx),
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Record the voice loop's current phase for `/status`
    pub async fn set_phase(&self, phase: Phase) {
        self.state.set_phase(phase).await;
    }

    /// Serve requests until [`Server::shutdown`] is called
    pub async fn run(&self) -> Result<()> {
        let listener = self
            .listener
            .lock()
            .ok()
            .and_then(|mut listener| listener.take())
            .context("server not initialized")?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|stopped| *stopped).await;
                debug!("chat API draining connections");
            })
            .await
            .context("chat API server failed")
    }

    /// Stop accepting connections and let in-flight requests finish
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("chat API shutdown requested");
    }
}
