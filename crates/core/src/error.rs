//! Fehlertypen fuer Klingel
//!
//! `CallError` beschreibt alle erwarteten, behebbaren Fehler der
//! Anruf-Vermittlung. Keiner davon beendet eine Verbindung; sie werden nur
//! an den ausloesenden Client zurueckgemeldet.

use thiserror::Error;

/// Result-Alias fuer Operationen der Anruf-Vermittlung
pub type CallResult<T> = std::result::Result<T, CallError>;

/// Fehler bei Registry- und Anruf-Operationen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CallError {
    /// Verbindungs-ID ist nicht (mehr) registriert
    #[error("Unbekannte Verbindung")]
    UnknownConnection,

    /// Anrufer oder Angerufener existiert nicht
    #[error("Ungueltiges Anrufziel")]
    InvalidTarget,

    /// Eine der beiden Parteien klingelt bereits oder telefoniert
    #[error("Teilnehmer ist besetzt")]
    Busy,

    /// Anrufer und Angerufener sind identisch
    #[error("Selbstanruf ist nicht moeglich")]
    SelfCall,

    /// Kein passender klingelnder Anruf (veraltet, doppelt oder falscher Anrufer)
    #[error("Kein passender eingehender Anruf")]
    NoSuchRing,
}

impl CallError {
    /// Stabiler, maschinenlesbarer Code (fuer Metrik-Labels und Logs)
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownConnection => "UNKNOWN_CONNECTION",
            Self::InvalidTarget => "INVALID_TARGET",
            Self::Busy => "BUSY",
            Self::SelfCall => "SELF_CALL",
            Self::NoSuchRing => "NO_SUCH_RING",
        }
    }
}
