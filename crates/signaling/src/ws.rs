//! WebSocket-Endpunkt
//!
//! `GET /ws` reserviert einen Verbindungsplatz und uebergibt die Verbindung
//! nach dem Upgrade an einen eigenen `ClientConnection`-Task. Ist der Server
//! voll, wird mit 503 geantwortet.
//!
//! `GET /api/users` liefert die aktuelle Teilnehmerliste als JSON.

use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::sync::watch;

use crate::connection::ClientConnection;
use crate::server_state::SignalingState;

#[derive(Clone)]
struct WsState {
    state: Arc<SignalingState>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Router mit `/ws` und `/api/users`
pub fn signaling_router(state: Arc<SignalingState>, shutdown_rx: watch::Receiver<bool>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/api/users", get(teilnehmer))
        .with_state(WsState { state, shutdown_rx })
}

async fn teilnehmer(State(ws_state): State<WsState>) -> Response {
    Json(ws_state.state.core.roster()).into_response()
}

async fn ws_upgrade(State(ws_state): State<WsState>, ws: WebSocketUpgrade) -> Response {
    let Some(platz) = ws_state.state.platz_reservieren() else {
        tracing::warn!(
            max_clients = ws_state.state.config.max_clients,
            "Verbindungslimit erreicht – Upgrade abgelehnt"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Server voll").into_response();
    };

    let max_frame = ws_state.state.config.max_frame_size;
    let verbindung = ClientConnection::neu(Arc::clone(&ws_state.state), platz);
    let shutdown_rx = ws_state.shutdown_rx.clone();

    ws.max_message_size(max_frame)
        .max_frame_size(max_frame)
        .on_upgrade(move |socket| verbindung.verarbeiten(socket, shutdown_rx))
}
