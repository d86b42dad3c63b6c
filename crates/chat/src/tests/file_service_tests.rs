//! Unit-Tests fuer den FileService

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use klingel_core::FileId;

use crate::error::ChatError;
use crate::file_service::FileService;
use crate::storage::{MemoryStorage, StorageBackend};
use crate::types::DateiUpload;

fn service(max: usize, ttl_sek: u64) -> (Arc<FileService>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::neu());
    let backend: Arc<dyn StorageBackend> = storage.clone();
    (
        FileService::neu(backend, max, Duration::from_secs(ttl_sek)),
        storage,
    )
}

fn data_url(mime: &str, inhalt: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(inhalt)
    )
}

#[tokio::test]
async fn test_upload_und_download() {
    let (files, _) = service(1024, 3600);

    let id = files
        .datei_hochladen(DateiUpload {
            file_data: data_url("image/png", b"\x89PNG-daten"),
            file_type: "image/png".into(),
        })
        .await
        .unwrap();

    let (info, daten) = files.datei_laden(id).await.unwrap();
    assert_eq!(daten, b"\x89PNG-daten");
    assert_eq!(info.mime_type, "image/png");
    assert_eq!(info.size_bytes, daten.len());
}

#[tokio::test]
async fn test_mime_aus_data_url_wenn_file_type_fehlt() {
    let (files, _) = service(1024, 3600);
    let id = files
        .datei_hochladen(DateiUpload {
            file_data: data_url("audio/webm", b"ton"),
            file_type: String::new(),
        })
        .await
        .unwrap();
    let (info, _) = files.datei_laden(id).await.unwrap();
    assert_eq!(info.mime_type, "audio/webm");
}

#[tokio::test]
async fn test_zu_grosse_datei_abgelehnt() {
    let (files, storage) = service(4, 3600);
    let result = files
        .datei_hochladen(DateiUpload {
            file_data: data_url("text/plain", b"zu viele bytes"),
            file_type: "text/plain".into(),
        })
        .await;
    assert!(matches!(result, Err(ChatError::DateiZuGross { max: 4, .. })));
    assert_eq!(storage.anzahl(), 0);
}

#[tokio::test]
async fn test_ungueltiges_base64_abgelehnt() {
    let (files, _) = service(1024, 3600);
    let result = files
        .datei_hochladen(DateiUpload {
            file_data: "data:image/png;base64,@@@kein-base64@@@".into(),
            file_type: "image/png".into(),
        })
        .await;
    assert!(matches!(result, Err(ChatError::UngueltigeEingabe(_))));
}

#[tokio::test]
async fn test_unbekannte_datei_nicht_gefunden() {
    let (files, _) = service(1024, 3600);
    let result = files.datei_laden(FileId::new()).await;
    assert!(matches!(result, Err(ChatError::DateiNichtGefunden(_))));
}

#[tokio::test(start_paused = true)]
async fn test_datei_laeuft_nach_ttl_ab() {
    let (files, storage) = service(1024, 60);
    let id = files
        .datei_hochladen(DateiUpload {
            file_data: data_url("text/plain", b"kurzlebig"),
            file_type: "text/plain".into(),
        })
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(files.datei_laden(id).await.is_ok());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(matches!(
        files.datei_laden(id).await,
        Err(ChatError::DateiNichtGefunden(_))
    ));
    assert_eq!(storage.anzahl(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abgelaufene_entfernen_raeumt_nur_alte_auf() {
    let (files, storage) = service(1024, 60);
    let upload = || DateiUpload {
        file_data: data_url("text/plain", b"x"),
        file_type: "text/plain".into(),
    };

    files.datei_hochladen(upload()).await.unwrap();
    tokio::time::advance(Duration::from_secs(45)).await;
    let juenger = files.datei_hochladen(upload()).await.unwrap();
    tokio::time::advance(Duration::from_secs(20)).await;

    assert_eq!(files.abgelaufene_entfernen().await, 1);
    assert_eq!(files.anzahl(), 1);
    assert_eq!(storage.anzahl(), 1);
    assert!(files.datei_laden(juenger).await.is_ok());
}
