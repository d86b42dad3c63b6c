//! Tests fuer die Chat-HTTP-Endpunkte

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::Engine;
use klingel_core::ConnectionId;
use tower::ServiceExt;

use crate::file_service::FileService;
use crate::http::{chat_router, ChatHttpState};
use crate::service::ChatService;
use crate::storage::MemoryStorage;
use crate::types::NeueNachricht;

fn state() -> ChatHttpState {
    ChatHttpState {
        chat: ChatService::neu(100),
        dateien: FileService::neu(
            Arc::new(MemoryStorage::neu()),
            1024 * 1024,
            Duration::from_secs(3600),
        ),
    }
}

async fn body_json(antwort: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(antwort.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_upload_und_abruf_ueber_http() {
    let app: Router = chat_router(state());
    let inhalt = base64::engine::general_purpose::STANDARD.encode(b"bilddaten");
    let anfrage = serde_json::json!({
        "fileData": format!("data:image/jpeg;base64,{inhalt}"),
        "fileType": "image/jpeg",
    });

    let antwort = app
        .clone()
        .oneshot(
            Request::post("/upload")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(anfrage.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(antwort.status(), StatusCode::OK);
    let json = body_json(antwort).await;
    let file_id = json["fileId"].as_str().unwrap().to_string();
    assert_eq!(file_id.len(), 32);

    let antwort = app
        .oneshot(
            Request::get(format!("/file/{file_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(antwort.status(), StatusCode::OK);
    assert_eq!(antwort.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(
        antwort.headers()[header::CACHE_CONTROL],
        "public, max-age=3600"
    );
    let bytes = axum::body::to_bytes(antwort.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"bilddaten");
}

#[tokio::test]
async fn test_unbekannte_datei_404() {
    let app: Router = chat_router(state());
    for pfad in ["/file/0123456789abcdef0123456789abcdef", "/file/kaputt"] {
        let antwort = app
            .clone()
            .oneshot(Request::get(pfad).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_ungueltiger_upload_400() {
    let app: Router = chat_router(state());
    let anfrage = serde_json::json!({ "fileData": "data:image/png;base64,!!!", "fileType": "image/png" });
    let antwort = app
        .oneshot(
            Request::post("/upload")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(anfrage.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(antwort.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verlauf_und_lesebestaetigungen() {
    let state = state();
    let alice = ConnectionId::new();
    for text in ["a", "b", "c"] {
        state
            .chat
            .nachricht_senden(NeueNachricht {
                sender_id: alice,
                sender: "Alice".into(),
                text: text.into(),
                anhang: None,
            })
            .unwrap();
    }
    let letzte = state.chat.letzte_nachrichten(1).remove(0);
    state
        .chat
        .als_gelesen_markieren(letzte.id, alice, "Alice")
        .unwrap();

    let app: Router = chat_router(state);
    let antwort = app
        .clone()
        .oneshot(
            Request::get("/api/messages?limit=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(antwort.status(), StatusCode::OK);
    let json = body_json(antwort).await;
    let texte: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texte, vec!["b", "c"]);

    let antwort = app
        .clone()
        .oneshot(
            Request::get(format!("/api/messages/{}/read-receipts", letzte.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(antwort.status(), StatusCode::OK);
    let json = body_json(antwort).await;
    assert_eq!(json[0]["username"], "Alice");

    let antwort = app
        .oneshot(
            Request::get("/api/messages/999/read-receipts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(antwort.status(), StatusCode::NOT_FOUND);
}
