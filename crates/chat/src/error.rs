//! Fehlertypen fuer das Chat-Crate

use thiserror::Error;

/// Fehler von Verlauf, Uploads und Speicher-Backends
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Nachricht nicht gefunden: {0}")]
    NachrichtNichtGefunden(String),

    #[error("Datei nicht gefunden: {0}")]
    DateiNichtGefunden(String),

    #[error("Datei zu gross: {size} Bytes (Maximum: {max} Bytes)")]
    DateiZuGross { size: usize, max: usize },

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// HTTP-Statuscode fuer REST-Antworten
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NachrichtNichtGefunden(_) | Self::DateiNichtGefunden(_) => 404,
            Self::DateiZuGross { .. } => 413,
            Self::UngueltigeEingabe(_) => 400,
            Self::Io(_) => 500,
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
