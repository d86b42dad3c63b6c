//! Structured Logging via tracing-subscriber
//!
//! Level und Format kommen aus der Konfigurationsdatei; `KL_LOG_LEVEL`
//! (EnvFilter-Direktive, z.B. `info,klingel_signaling=debug`) und
//! `KL_LOG_FORMAT` (`text` / `json`) haben Vorrang.

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter};

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// Eine JSON-Zeile pro Event, fuer Log-Sammler
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            andere => Err(format!("Unbekanntes Log-Format: {andere}")),
        }
    }
}

/// Baut den Filter: Umgebung vor Konfiguration, sonst `info`
fn filter_bauen(level: &str) -> EnvFilter {
    EnvFilter::try_from_env("KL_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Ermittelt das Format; ein unbekannter Wert faellt auf Text zurueck
fn format_bestimmen(konfiguriert: &str) -> LogFormat {
    let roh = std::env::var("KL_LOG_FORMAT").unwrap_or_else(|_| konfiguriert.to_string());
    roh.parse().unwrap_or_else(|e| {
        eprintln!("{e}, verwende text");
        LogFormat::Text
    })
}

/// Installiert den globalen Subscriber
///
/// Ein zweiter Aufruf (z.B. in Tests) bleibt folgenlos.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = filter_bauen(level);

    let ergebnis = match format_bestimmen(format) {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging war bereits initialisiert");
    }
}
