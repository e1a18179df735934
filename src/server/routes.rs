//! HTTP and WebSocket handlers
//!
//! | Route          | Effect                                              |
//! |----------------|-----------------------------------------------------|
//! | `GET /ws`      | Subscribe; every processed frame is one binary message |
//! | `POST /start`  | Start the stream                                    |
//! | `POST /stop`   | Stop the stream                                     |
//! | `GET /health`  | Liveness check                                      |
//! | `GET /stats`   | Controller state and pipeline counters              |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tower_http::trace::TraceLayer;

use crate::pipeline::{StreamController, StreamStatus};

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    controller: StreamController,
    connection_limit: Option<Arc<Semaphore>>,
    /// Flips to `true` when the server starts shutting down
    closing: watch::Receiver<bool>,
}

impl AppState {
    /// `max_connections` of 0 means unlimited
    pub fn new(
        controller: StreamController,
        max_connections: usize,
        closing: watch::Receiver<bool>,
    ) -> Self {
        let connection_limit = if max_connections > 0 {
            Some(Arc::new(Semaphore::new(max_connections)))
        } else {
            None
        };

        Self {
            controller,
            connection_limit,
            closing,
        }
    }

    pub fn controller(&self) -> &StreamController {
        &self.controller
    }
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Build the router with all endpoints
///
/// Must be served with `into_make_service_with_connect_info::<SocketAddr>()`
/// so subscribers can be tagged with their peer address.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/start", post(start_stream))
        .route("/stop", post(stop_stream))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn stats(State(state): State<AppState>) -> Json<StreamStatus> {
    Json(state.controller.status().await)
}

async fn start_stream(State(state): State<AppState>) -> Response {
    match state.controller.start().await {
        Ok(()) => Json(MessageBody {
            message: "Stream started",
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to start stream");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn stop_stream(State(state): State<AppState>) -> Json<MessageBody> {
    state.controller.stop().await;
    Json(MessageBody {
        message: "Stream stopped",
    })
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    // Check connection limit
    let permit = match &state.connection_limit {
        Some(limit) => match Arc::clone(limit).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(peer = %peer, "Connection rejected: limit reached");
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
        },
        None => None,
    };

    ws.on_upgrade(move |socket| serve_subscriber(socket, peer, state, permit))
}

/// Pump frames to one WebSocket until either side goes away
///
/// Closing, a receive error, a send error, eviction by the broadcaster and
/// server shutdown all count as a disconnect.
async fn serve_subscriber(
    mut socket: WebSocket,
    peer: SocketAddr,
    state: AppState,
    _permit: Option<OwnedSemaphorePermit>,
) {
    let controller = &state.controller;
    let (subscriber, mut frames) = controller.registry().create_subscriber(Some(peer));
    let id = subscriber.id();

    tracing::debug!(subscriber = %id, peer = %peer, "Subscriber connected");

    // A failed join leaves the subscriber unregistered
    if let Err(e) = controller.join(subscriber).await {
        tracing::warn!(subscriber = %id, error = %e, "Stream unavailable, closing subscriber");
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    let mut closing = state.closing.clone();

    if !*closing.borrow_and_update() {
        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = socket.send(Message::Binary(frame.data)).await {
                            tracing::debug!(subscriber = %id, error = %e, "Send failed");
                            break;
                        }
                    }
                    // Evicted by the broadcaster
                    None => break,
                },
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    // Keep-alive, contents ignored
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(subscriber = %id, error = %e, "Receive failed");
                        break;
                    }
                },
                _ = closing.changed() => break,
            }
        }
    }

    // Free the queue first so an in-flight publish to us fails fast
    drop(frames);
    let _ = socket.send(Message::Close(None)).await;
    controller.leave(id).await;

    tracing::debug!(subscriber = %id, peer = %peer, "Subscriber disconnected");
}
