//! FileService – Upload als Data-URL, Download und Ablauf nach TTL
//!
//! Hochgeladene Dateien sind kurzlebig: nach `ttl` liefert `datei_laden`
//! nur noch `DateiNichtGefunden`, der Aufraeum-Task loescht sie endgueltig.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use dashmap::DashMap;
use klingel_core::FileId;
use tokio::time::Instant;

use crate::{
    error::{ChatError, ChatResult},
    storage::StorageBackend,
    types::{DateiInfo, DateiUpload},
};

/// MIME-Typ wenn weder Upload noch Data-URL einen nennen
const STANDARD_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone)]
struct DateiEintrag {
    mime_type: String,
    size_bytes: usize,
    hochgeladen: Instant,
}

/// FileService verwaltet kurzlebige Uploads
pub struct FileService {
    storage: Arc<dyn StorageBackend>,
    index: DashMap<FileId, DateiEintrag>,
    max_upload_bytes: usize,
    ttl: Duration,
}

impl FileService {
    /// Neuen FileService erstellen
    pub fn neu(storage: Arc<dyn StorageBackend>, max_upload_bytes: usize, ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            storage,
            index: DashMap::new(),
            max_upload_bytes,
            ttl,
        })
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Datei hochladen und ihre neue ID zurueckgeben
    pub async fn datei_hochladen(&self, upload: DateiUpload) -> ChatResult<FileId> {
        let (url_mime, nutzdaten) = data_url_zerlegen(&upload.file_data)?;

        // Grobe Vorpruefung, bevor dekodiert wird
        let geschaetzt = nutzdaten.len() / 4 * 3;
        if geschaetzt > self.max_upload_bytes + 3 {
            return Err(ChatError::DateiZuGross {
                size: geschaetzt,
                max: self.max_upload_bytes,
            });
        }

        let daten = base64::engine::general_purpose::STANDARD
            .decode(nutzdaten.trim())
            .map_err(|e| ChatError::UngueltigeEingabe(format!("Ungueltiges Base64: {e}")))?;

        if daten.len() > self.max_upload_bytes {
            return Err(ChatError::DateiZuGross {
                size: daten.len(),
                max: self.max_upload_bytes,
            });
        }

        let mime_type = if !upload.file_type.trim().is_empty() {
            upload.file_type.trim().to_string()
        } else {
            url_mime.unwrap_or(STANDARD_MIME).to_string()
        };

        let file_id = FileId::new();
        self.storage.store(&file_id.to_string(), &daten).await?;
        self.index.insert(
            file_id,
            DateiEintrag {
                mime_type: mime_type.clone(),
                size_bytes: daten.len(),
                hochgeladen: Instant::now(),
            },
        );

        tracing::info!(
            file_id = %file_id,
            mime_type = %mime_type,
            size = daten.len(),
            "Datei hochgeladen"
        );

        Ok(file_id)
    }

    /// Datei herunterladen
    ///
    /// Gibt Metadaten und Rohdaten zurueck. Abgelaufene Dateien gelten als
    /// nicht vorhanden.
    pub async fn datei_laden(&self, file_id: FileId) -> ChatResult<(DateiInfo, Vec<u8>)> {
        let eintrag = self
            .index
            .get(&file_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| ChatError::DateiNichtGefunden(file_id.to_string()))?;

        if eintrag.hochgeladen.elapsed() >= self.ttl {
            self.entfernen(file_id).await;
            return Err(ChatError::DateiNichtGefunden(file_id.to_string()));
        }

        let daten = self.storage.retrieve(&file_id.to_string()).await?;
        let info = DateiInfo {
            id: file_id,
            mime_type: eintrag.mime_type,
            size_bytes: eintrag.size_bytes,
        };
        Ok((info, daten))
    }

    /// Entfernt alle abgelaufenen Dateien, gibt die Anzahl zurueck
    pub async fn abgelaufene_entfernen(&self) -> usize {
        let abgelaufen: Vec<FileId> = self
            .index
            .iter()
            .filter(|e| e.value().hochgeladen.elapsed() >= self.ttl)
            .map(|e| *e.key())
            .collect();

        for file_id in &abgelaufen {
            self.entfernen(*file_id).await;
        }

        if !abgelaufen.is_empty() {
            tracing::debug!(anzahl = abgelaufen.len(), "Abgelaufene Uploads entfernt");
        }
        abgelaufen.len()
    }

    /// Startet den periodischen Aufraeum-Task
    pub fn aufraeumen_starten(
        self: Arc<Self>,
        intervall: Duration,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(intervall);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.abgelaufene_entfernen().await;
                    }
                    res = shutdown_rx.changed() => {
                        if res.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Upload-Aufraeum-Task beendet");
        })
    }

    /// Anzahl aktuell bekannter Uploads
    pub fn anzahl(&self) -> usize {
        self.index.len()
    }

    async fn entfernen(&self, file_id: FileId) {
        self.index.remove(&file_id);
        if let Err(e) = self.storage.delete(&file_id.to_string()).await {
            tracing::warn!(file_id = %file_id, fehler = %e, "Upload konnte nicht geloescht werden");
        }
    }
}

/// Zerlegt `data:<mime>;base64,<payload>` in MIME-Typ und Base64-Teil
///
/// Ohne `data:`-Praefix wird der ganze Text als Base64 behandelt.
fn data_url_zerlegen(eingabe: &str) -> ChatResult<(Option<&str>, &str)> {
    let Some(rest) = eingabe.strip_prefix("data:") else {
        return Ok((None, eingabe));
    };

    let (kopf, nutzdaten) = rest
        .split_once(',')
        .ok_or_else(|| ChatError::UngueltigeEingabe("Data-URL ohne Komma".into()))?;

    let mime = kopf.strip_suffix(";base64").ok_or_else(|| {
        ChatError::UngueltigeEingabe("Nur Base64-kodierte Data-URLs werden unterstuetzt".into())
    })?;

    let mime = if mime.is_empty() { None } else { Some(mime) };
    Ok((mime, nutzdaten))
}
