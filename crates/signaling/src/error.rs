//! Fehlertypen fuer den Signaling-Service

use klingel_protocol::WireError;
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// WebSocket-Transportfehler
    #[error("Transportfehler: {0}")]
    Transport(#[from] axum::Error),

    /// Frame konnte nicht kodiert oder dekodiert werden
    #[error("Wire-Fehler: {0}")]
    Wire(#[from] WireError),
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
