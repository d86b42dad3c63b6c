//! HTTP-Endpunkte fuer Uploads und Verlauf
//!
//! - `POST /upload` – Data-URL hochladen, Antwort `{fileId}`
//! - `GET  /file/:id` – Rohdaten mit gespeichertem Content-Type
//! - `GET  /api/messages?limit=N` – letzte Nachrichten
//! - `GET  /api/messages/:id/read-receipts` – Lesebestaetigungen

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use klingel_core::{FileId, MessageId};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::{error::ChatError, file_service::FileService, service::ChatService, types::DateiUpload};

/// Standard-Anzahl fuer `/api/messages` ohne `limit`
const STANDARD_LIMIT: usize = 50;

/// Geteilter Zustand der Chat-Endpunkte
#[derive(Clone)]
pub struct ChatHttpState {
    pub chat: Arc<ChatService>,
    pub dateien: Arc<FileService>,
}

#[derive(Debug, Deserialize)]
pub struct VerlaufQuery {
    pub limit: Option<usize>,
}

/// Router mit allen Chat-Endpunkten inklusive CORS
pub fn chat_router(state: ChatHttpState) -> Router {
    // Base64 plus JSON-Huelle: etwas mehr als 4/3 der Nutzdaten
    let body_limit = state.dateien.max_upload_bytes() / 3 * 4 + 64 * 1024;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/upload", post(upload))
        .route("/file/:id", get(datei_abrufen))
        .route("/api/messages", get(verlauf))
        .route("/api/messages/:id/read-receipts", get(lesebestaetigungen))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

fn fehler_antwort(e: &ChatError) -> Response {
    (
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}

async fn upload(State(state): State<ChatHttpState>, Json(upload): Json<DateiUpload>) -> Response {
    match state.dateien.datei_hochladen(upload).await {
        Ok(file_id) => (StatusCode::OK, Json(json!({ "fileId": file_id }))).into_response(),
        Err(e) => {
            tracing::warn!(fehler = %e, "Upload abgelehnt");
            fehler_antwort(&e)
        }
    }
}

async fn datei_abrufen(State(state): State<ChatHttpState>, Path(id): Path<String>) -> Response {
    let Ok(file_id) = id.parse::<FileId>() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.dateien.datei_laden(file_id).await {
        Ok((info, daten)) => {
            let content_type = HeaderValue::from_str(&info.mime_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    (
                        header::CACHE_CONTROL,
                        HeaderValue::from_static("public, max-age=3600"),
                    ),
                ],
                daten,
            )
                .into_response()
        }
        Err(ChatError::DateiNichtGefunden(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(file_id = %file_id, fehler = %e, "Datei konnte nicht gelesen werden");
            fehler_antwort(&e)
        }
    }
}

async fn verlauf(State(state): State<ChatHttpState>, Query(q): Query<VerlaufQuery>) -> Response {
    let limit = q.limit.filter(|l| *l > 0).unwrap_or(STANDARD_LIMIT);
    Json(state.chat.letzte_nachrichten(limit)).into_response()
}

async fn lesebestaetigungen(
    State(state): State<ChatHttpState>,
    Path(id): Path<u64>,
) -> Response {
    match state.chat.lesebestaetigungen(MessageId(id)) {
        Ok(liste) => Json(liste).into_response(),
        Err(e) => fehler_antwort(&e),
    }
}
