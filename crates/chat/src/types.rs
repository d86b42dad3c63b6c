//! Oeffentliche Typen fuer den Chat-Service

use chrono::{DateTime, Utc};
use klingel_core::{ConnectionId, FileId, MessageId};
use serde::{Deserialize, Serialize};

/// Anhang einer Chat-Nachricht
///
/// `file_data` ist entweder eine Upload-ID (`/file/<id>`) oder, bei alten
/// Clients, die komplette Data-URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anhang {
    pub file_data: String,
    pub file_type: String,
}

/// Eine Chat-Nachricht im Verlauf
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatNachricht {
    pub id: MessageId,
    pub text: String,
    /// Anzeigename des Absenders zum Sendezeitpunkt
    pub sender: String,
    pub sender_id: ConnectionId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub anhang: Option<Anhang>,
}

/// Eingabe fuer `ChatService::nachricht_senden`
#[derive(Debug, Clone)]
pub struct NeueNachricht {
    pub sender_id: ConnectionId,
    pub sender: String,
    pub text: String,
    pub anhang: Option<Anhang>,
}

/// Lesebestaetigung eines Teilnehmers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesebestaetigung {
    pub message_id: MessageId,
    pub user_id: ConnectionId,
    pub username: String,
    pub read_at: DateTime<Utc>,
}

/// Daten zum Hochladen einer Datei
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateiUpload {
    /// `data:<mime>;base64,<payload>` oder reines Base64
    pub file_data: String,
    #[serde(default)]
    pub file_type: String,
}

/// Metadaten einer gespeicherten Datei
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateiInfo {
    pub id: FileId,
    pub mime_type: String,
    pub size_bytes: usize,
}
