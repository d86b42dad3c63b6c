//! Nachrichten-Protokoll (WebSocket, JSON)
//!
//! Definiert alle Nachrichten die ueber die WebSocket-Verbindung zwischen
//! Browser-Client und Server ausgetauscht werden.
//!
//! ## Design
//! - Jede Nachricht ist ein JSON-Objekt mit `type`-Tag
//! - Feldnamen in camelCase (Browser-Konvention)
//! - Getrennte Enums fuer Client->Server und Server->Client, damit der
//!   Dispatcher nur eingehende Nachrichten exhaustiv behandeln muss

use klingel_core::{CallError, ConnectionId, MessageId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer `callError`-Antworten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Anruf-Vermittlung
    UnknownConnection,
    InvalidTarget,
    Busy,
    SelfCall,
    NoSuchRing,
    // Verbindungszustand
    NotJoined,
    AlreadyJoined,
    // Chat
    InvalidMessage,
}

impl ErrorCode {
    /// Draht-Darstellung des Codes (auch Metrik-Label)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownConnection => "UNKNOWN_CONNECTION",
            Self::InvalidTarget => "INVALID_TARGET",
            Self::Busy => "BUSY",
            Self::SelfCall => "SELF_CALL",
            Self::NoSuchRing => "NO_SUCH_RING",
            Self::NotJoined => "NOT_JOINED",
            Self::AlreadyJoined => "ALREADY_JOINED",
            Self::InvalidMessage => "INVALID_MESSAGE",
        }
    }
}

impl From<CallError> for ErrorCode {
    fn from(fehler: CallError) -> Self {
        match fehler {
            CallError::UnknownConnection => Self::UnknownConnection,
            CallError::InvalidTarget => Self::InvalidTarget,
            CallError::Busy => Self::Busy,
            CallError::SelfCall => Self::SelfCall,
            CallError::NoSuchRing => Self::NoSuchRing,
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Beitritt mit Anzeigenamen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(alias = "displayName")]
    pub username: String,
}

/// Chat-Nachricht (Text und/oder Anhang)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendRequest {
    #[serde(default)]
    pub text: String,
    /// Referenz auf einen vorher per `/upload` hochgeladenen Anhang
    pub file_id: Option<String>,
    /// MIME-Typ des Anhangs
    pub file_type: Option<String>,
    /// Inline-Anhang als Data-URL (altes Format)
    pub file_data: Option<String>,
}

/// Anruf starten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallUserRequest {
    /// Ziel-Verbindung (opaker String, wird serverseitig aufgeloest)
    pub target_user_id: String,
}

/// Antwort des Angerufenen auf einen klingelnden Anruf
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAnswerRequest {
    pub caller_id: String,
}

/// WebRTC-Signal (SDP-Offer/Answer, ICE-Candidate) – wird nicht inspiziert
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRequest {
    pub signal: serde_json::Value,
}

/// Lesebestaetigung fuer eine Chat-Nachricht
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRequest {
    pub message_id: MessageId,
}

/// Alle Nachrichten die ein Client senden darf
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Join(JoinRequest),
    Message(ChatSendRequest),
    CallUser(CallUserRequest),
    AcceptCall(CallAnswerRequest),
    RejectCall(CallAnswerRequest),
    WebrtcSignal(SignalRequest),
    EndCall,
    Read(ReadRequest),
}

impl ClientMessage {
    /// Name des Nachrichtentyps (fuer Logs)
    pub fn typ_name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Message(_) => "message",
            Self::CallUser(_) => "callUser",
            Self::AcceptCall(_) => "acceptCall",
            Self::RejectCall(_) => "rejectCall",
            Self::WebrtcSignal(_) => "webrtcSignal",
            Self::EndCall => "endCall",
            Self::Read(_) => "read",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Zugewiesene Verbindungs-ID
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdInfo {
    pub user_id: ConnectionId,
}

/// Eintrag der Teilnehmerliste
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: ConnectionId,
    pub username: String,
    pub in_call: bool,
}

/// Vollstaendige Teilnehmerliste
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListInfo {
    pub users: Vec<RosterEntry>,
}

/// Beitritt oder Austritt eines Teilnehmers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceInfo {
    pub user_id: ConnectionId,
    pub username: String,
}

/// Eingehender Anruf (an den Angerufenen)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCallInfo {
    pub caller_id: ConnectionId,
    pub caller_name: String,
}

/// Anruf angenommen (an den Anrufer)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAcceptedInfo {
    pub accepter_id: ConnectionId,
}

/// Anruf abgelehnt (an den Anrufer)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRejectedInfo {
    pub rejecter_id: ConnectionId,
}

/// Fehler-Antwort an den ausloesenden Client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

/// Weitergeleitetes WebRTC-Signal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalInfo {
    pub signal: serde_json::Value,
    pub from_user_id: ConnectionId,
}

/// Verteilte Chat-Nachricht
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageInfo {
    /// Verlaufs-ID; Systemnachrichten haben keine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    pub text: String,
    /// Anzeigename des Absenders
    pub sender: String,
    pub sender_id: ConnectionId,
    /// Server-Zeitstempel (RFC 3339, UTC)
    pub timestamp: String,
    /// File-ID (oder Data-URL beim alten Format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Beitritts- und Austrittsmeldungen des Servers
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_system: bool,
}

/// Lesebestaetigung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptInfo {
    pub message_id: MessageId,
    pub user_id: ConnectionId,
    pub username: String,
}

/// Alle Nachrichten die der Server sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    UserId(UserIdInfo),
    UserList(UserListInfo),
    UserJoined(PresenceInfo),
    UserLeft(PresenceInfo),
    IncomingCall(IncomingCallInfo),
    CallAccepted(CallAcceptedInfo),
    CallRejected(CallRejectedInfo),
    CallEnded,
    CallError(CallErrorInfo),
    WebrtcSignal(SignalInfo),
    Message(ChatMessageInfo),
    ReadReceipt(ReadReceiptInfo),
}

impl ServerMessage {
    /// Erstellt eine Fehler-Antwort
    pub fn call_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::CallError(CallErrorInfo {
            code,
            message: message.into(),
        })
    }

    /// Erstellt eine Teilnehmerliste
    pub fn user_list(users: Vec<RosterEntry>) -> Self {
        Self::UserList(UserListInfo { users })
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl From<CallError> for ServerMessage {
    fn from(fehler: CallError) -> Self {
        Self::call_error(fehler.into(), fehler.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
