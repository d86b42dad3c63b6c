//! Wire-Format fuer WebSocket-Verbindungen
//!
//! Jede Nachricht ist genau ein WebSocket-Text-Frame mit einem JSON-Objekt.
//! Die maximale Frame-Groesse ist konfigurierbar (Standard: 100 MB, damit
//! Inline-Anhaenge im alten Format durchpassen).

use thiserror::Error;

use crate::message::{ClientMessage, ServerMessage};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (100 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler beim Kodieren oder Dekodieren eines Frames
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Frame zu gross: {laenge} Bytes (Maximum: {max} Bytes)")]
    FrameZuGross { laenge: usize, max: usize },

    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),
}

pub type WireResult<T> = Result<T, WireError>;

// ---------------------------------------------------------------------------
// WireCodec
// ---------------------------------------------------------------------------

/// Kodiert `ServerMessage`s und dekodiert `ClientMessage`s
#[derive(Debug, Clone, Copy)]
pub struct WireCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl WireCodec {
    /// Erstellt einen neuen `WireCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `WireCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Dekodiert einen eingehenden Text-Frame
    pub fn dekodieren(&self, text: &str) -> WireResult<ClientMessage> {
        if text.len() > self.max_frame_size {
            return Err(WireError::FrameZuGross {
                laenge: text.len(),
                max: self.max_frame_size,
            });
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Kodiert eine ausgehende Nachricht als Text-Frame
    pub fn kodieren(&self, nachricht: &ServerMessage) -> WireResult<String> {
        let json = serde_json::to_string(nachricht)?;
        if json.len() > self.max_frame_size {
            return Err(WireError::FrameZuGross {
                laenge: json.len(),
                max: self.max_frame_size,
            });
        }
        Ok(json)
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dekodieren_gueltiger_frame() {
        let codec = WireCodec::new();
        let msg = codec.dekodieren(r#"{"type":"endCall"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::EndCall));
    }

    #[test]
    fn dekodieren_ungueltiges_json() {
        let codec = WireCodec::new();
        let ergebnis = codec.dekodieren("{nicht json");
        assert!(matches!(ergebnis, Err(WireError::Json(_))));
    }

    #[test]
    fn dekodieren_fehlendes_pflichtfeld() {
        let codec = WireCodec::new();
        let ergebnis = codec.dekodieren(r#"{"type":"callUser"}"#);
        assert!(matches!(ergebnis, Err(WireError::Json(_))));
    }

    #[test]
    fn ablehnung_zu_grosser_frame() {
        let codec = WireCodec::with_max_size(16);
        let ergebnis = codec.dekodieren(r#"{"type":"join","username":"sehr langer name"}"#);
        assert!(matches!(ergebnis, Err(WireError::FrameZuGross { max: 16, .. })));
    }

    #[test]
    fn ablehnung_beim_kodieren_zu_grosse_nachricht() {
        let codec = WireCodec::with_max_size(10);
        let ergebnis = codec.kodieren(&ServerMessage::CallEnded);
        assert!(ergebnis.is_err());
    }

    #[test]
    fn kodieren_call_ended() {
        let codec = WireCodec::new();
        assert_eq!(
            codec.kodieren(&ServerMessage::CallEnded).unwrap(),
            r#"{"type":"callEnded"}"#
        );
    }

    #[test]
    fn standard_max_size() {
        assert_eq!(WireCodec::new().max_frame_size(), DEFAULT_MAX_FRAME_SIZE);
    }
}
