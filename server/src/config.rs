//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use klingel_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Vermittlung (WebSocket, Anrufe)
    pub signaling: SignalingEinstellungen,
    /// Chat-Verlauf und Uploads
    pub chat: ChatEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (nur fuer Logs)
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Klingel Server".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP und WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub port: u16,
    /// Verzeichnis mit statischen Dateien (leer = keine)
    pub statisch_verzeichnis: Option<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3000,
            statisch_verzeichnis: None,
        }
    }
}

/// Vermittlungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingEinstellungen {
    /// Maximale gleichzeitige WebSocket-Verbindungen (0 = unbegrenzt)
    pub max_clients: u32,
    /// Ping-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Stille Verbindungen werden nach dieser Zeit getrennt
    pub verbindungs_timeout_sek: u64,
    /// Unbeantwortete Anrufe enden nach dieser Zeit (0 = nie)
    pub klingel_timeout_sek: u64,
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Maximale WebSocket-Frame-Groesse in Bytes
    pub max_frame_bytes: usize,
}

impl Default for SignalingEinstellungen {
    fn default() -> Self {
        let basis = SignalingConfig::default();
        Self {
            max_clients: basis.max_clients,
            keepalive_sek: basis.keepalive_sek,
            verbindungs_timeout_sek: basis.verbindungs_timeout_sek,
            klingel_timeout_sek: basis.klingel_timeout_sek,
            send_queue_groesse: basis.send_queue_groesse,
            max_frame_bytes: basis.max_frame_size,
        }
    }
}

/// Speicher-Backend fuer Uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeicherTyp {
    #[default]
    Memory,
    Disk,
}

/// Chat- und Upload-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatEinstellungen {
    /// Anzahl gehaltener Nachrichten
    pub history_limit: usize,
    /// Verlaufs-Nachrichten fuer neue Teilnehmer
    pub history_beim_beitritt: usize,
    /// Absender bekommt seine Nachricht zurueck
    pub echo_an_absender: bool,
    /// Beitritt und Austritt als Systemnachricht im Chat melden
    pub systemnachrichten: bool,
    /// Maximale Upload-Groesse in Bytes (dekodiert)
    pub max_upload_bytes: usize,
    /// Lebensdauer eines Uploads in Sekunden
    pub datei_ttl_sek: u64,
    /// Speicher-Backend: "memory" oder "disk"
    pub speicher: SpeicherTyp,
    /// Verzeichnis fuer das Disk-Backend
    pub speicher_verzeichnis: String,
}

impl Default for ChatEinstellungen {
    fn default() -> Self {
        Self {
            history_limit: 200,
            history_beim_beitritt: 50,
            echo_an_absender: true,
            systemnachrichten: false,
            max_upload_bytes: 100 * 1024 * 1024,
            datei_ttl_sek: 3600,
            speicher: SpeicherTyp::Memory,
            speicher_verzeichnis: "uploads".into(),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
///
/// `/metrics` und `/health` sind immer auch auf dem Haupt-Port erreichbar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den separaten Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: false,
            port: 9300,
        }
    }
}

/// Kleinste zulaessige Send-Queue pro Verbindung
pub const MIN_SEND_QUEUE_GROESSE: usize = 16;

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die Bind-Adresse fuer HTTP und WebSocket zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }

    /// Baut die Konfiguration fuer den Signaling-Service
    ///
    /// Eine Send-Queue unter `MIN_SEND_QUEUE_GROESSE` wird angehoben. Passt
    /// der Beitritts-Verlauf nicht in die Queue, wird er beim Beitritt
    /// gekuerzt.
    pub fn signaling_config(&self) -> SignalingConfig {
        let mut send_queue_groesse = self.signaling.send_queue_groesse;
        if send_queue_groesse < MIN_SEND_QUEUE_GROESSE {
            tracing::warn!(
                konfiguriert = send_queue_groesse,
                minimum = MIN_SEND_QUEUE_GROESSE,
                "send_queue_groesse zu klein, verwende Minimum"
            );
            send_queue_groesse = MIN_SEND_QUEUE_GROESSE;
        }

        let config = SignalingConfig {
            max_clients: self.signaling.max_clients,
            keepalive_sek: self.signaling.keepalive_sek,
            verbindungs_timeout_sek: self.signaling.verbindungs_timeout_sek,
            klingel_timeout_sek: self.signaling.klingel_timeout_sek,
            send_queue_groesse,
            max_frame_size: self.signaling.max_frame_bytes,
            echo_an_absender: self.chat.echo_an_absender,
            history_beim_beitritt: self.chat.history_beim_beitritt,
            systemnachrichten: self.chat.systemnachrichten,
        };

        if config.history_fuer_beitritt() < config.history_beim_beitritt {
            tracing::warn!(
                history_beim_beitritt = config.history_beim_beitritt,
                send_queue_groesse,
                gekuerzt_auf = config.history_fuer_beitritt(),
                "Beitritts-Verlauf passt nicht in die Send-Queue"
            );
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.signaling.max_clients, 512);
        assert_eq!(cfg.signaling.keepalive_sek, 30);
        assert_eq!(cfg.chat.history_limit, 200);
        assert_eq!(cfg.chat.speicher, SpeicherTyp::Memory);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.netzwerk.statisch_verzeichnis.is_none());
    }

    #[test]
    fn bind_adressen() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_adresse(), "0.0.0.0:3000");
        assert_eq!(cfg.observability_bind_adresse(), "0.0.0.0:9300");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            port = 8080
            statisch_verzeichnis = "public"

            [signaling]
            max_clients = 10
            klingel_timeout_sek = 45

            [chat]
            speicher = "disk"
            echo_an_absender = false
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.port, 8080);
        assert_eq!(cfg.netzwerk.statisch_verzeichnis.as_deref(), Some("public"));
        assert_eq!(cfg.signaling.max_clients, 10);
        assert_eq!(cfg.chat.speicher, SpeicherTyp::Disk);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.signaling.keepalive_sek, 30);
        assert_eq!(cfg.chat.history_limit, 200);
    }

    #[test]
    fn signaling_config_uebernimmt_werte() {
        let mut cfg = ServerConfig::default();
        cfg.signaling.klingel_timeout_sek = 20;
        cfg.chat.echo_an_absender = false;
        cfg.chat.history_beim_beitritt = 5;

        let sc = cfg.signaling_config();
        assert_eq!(sc.klingel_timeout_sek, 20);
        assert!(!sc.echo_an_absender);
        assert_eq!(sc.history_beim_beitritt, 5);
        assert_eq!(sc.max_clients, 512);
        assert!(!sc.systemnachrichten);
    }

    #[test]
    fn zu_kleine_send_queue_wird_angehoben() {
        let mut cfg = ServerConfig::default();
        cfg.signaling.send_queue_groesse = 1;
        cfg.chat.history_beim_beitritt = 50;
        cfg.chat.systemnachrichten = true;

        let sc = cfg.signaling_config();
        assert_eq!(sc.send_queue_groesse, MIN_SEND_QUEUE_GROESSE);
        assert!(sc.systemnachrichten);
        // Beitritt: userId, userList, Systemnachricht und Verlauf passen
        assert!(sc.history_fuer_beitritt() + 3 <= sc.send_queue_groesse);
        assert_eq!(sc.history_beim_beitritt, 50);
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/klingel.toml").unwrap();
        assert_eq!(cfg.netzwerk.port, 3000);
    }

    #[test]
    fn kaputte_datei_ist_ein_fehler() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("config.toml");
        std::fs::write(&pfad, "[signaling\nmax_clients = ").unwrap();
        assert!(ServerConfig::laden(pfad.to_str().unwrap()).is_err());
    }
}
