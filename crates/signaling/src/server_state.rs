//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Kern, Chat-Verlauf, Metriken und Konfiguration als Arc-Referenzen,
//! die sicher zwischen tokio-Tasks geteilt werden koennen.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use klingel_chat::ChatService;
use klingel_observability::KlingelMetrics;
use klingel_protocol::WireCodec;

use crate::core::SignalingCore;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige WebSocket-Verbindungen (0 = unbegrenzt)
    pub max_clients: u32,
    /// Ping-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer stille Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Klingeln wird nach dieser Zeit beendet (0 = nie)
    pub klingel_timeout_sek: u64,
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_size: usize,
    /// Absender bekommt seine eigene Chat-Nachricht zurueck
    pub echo_an_absender: bool,
    /// Anzahl Verlaufs-Nachrichten fuer neue Teilnehmer
    pub history_beim_beitritt: usize,
    /// Beitritt und Austritt als Chat-Systemnachricht melden
    pub systemnachrichten: bool,
}

/// Plaetze in der Send-Queue, die beim Beitritt neben dem Verlauf frei
/// bleiben: `userId`, `userList`, Systemnachricht und zwei fuer
/// gleichzeitige Broadcasts anderer Verbindungen.
pub const BEITRITT_RESERVE: usize = 5;

impl SignalingConfig {
    /// Verlaufslaenge fuer den Beitritt, begrenzt durch die Send-Queue
    ///
    /// Der Verlauf wird im selben Schritt wie `userId` eingereiht, bevor die
    /// Verbindung ihre Queue leeren kann.
    pub fn history_fuer_beitritt(&self) -> usize {
        self.history_beim_beitritt
            .min(self.send_queue_groesse.saturating_sub(BEITRITT_RESERVE))
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_clients: 512,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
            klingel_timeout_sek: 0,
            send_queue_groesse: 256,
            max_frame_size: klingel_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
            echo_an_absender: true,
            history_beim_beitritt: 50,
            systemnachrichten: false,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Registry und Call Ledger
    pub core: SignalingCore,
    /// Chat-Verlauf und Lesebestaetigungen
    pub chat: Arc<ChatService>,
    /// Prometheus-Metriken
    pub metriken: KlingelMetrics,
    /// Frame-Kodierung
    pub codec: WireCodec,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_time: Instant,
    offene_verbindungen: AtomicUsize,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, chat: Arc<ChatService>, metriken: KlingelMetrics) -> Arc<Self> {
        let codec = WireCodec::with_max_size(config.max_frame_size);
        let systemnachrichten = config.systemnachrichten;
        Arc::new(Self {
            config: Arc::new(config),
            core: SignalingCore::mit_systemnachrichten(systemnachrichten),
            chat,
            metriken,
            codec,
            start_time: Instant::now(),
            offene_verbindungen: AtomicUsize::new(0),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Uebertraegt den Kern-Zustand in die Gauges
    pub fn gauges_aktualisieren(&self) {
        let stat = self.core.statistik();
        self.metriken.connected_clients.set(stat.verbunden as i64);
        self.metriken.active_calls.set(stat.gespraeche as i64);
        self.metriken.ringing_calls.set(stat.klingelnd as i64);
    }

    /// Reserviert einen Verbindungsplatz, `None` wenn der Server voll ist
    pub fn platz_reservieren(self: &Arc<Self>) -> Option<VerbindungsPlatz> {
        let max = self.config.max_clients as usize;
        let mut aktuell = self.offene_verbindungen.load(Ordering::Relaxed);
        loop {
            if max > 0 && aktuell >= max {
                return None;
            }
            match self.offene_verbindungen.compare_exchange_weak(
                aktuell,
                aktuell + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return Some(VerbindungsPlatz {
                        state: Arc::clone(self),
                    })
                }
                Err(neu) => aktuell = neu,
            }
        }
    }

    /// Anzahl offener WebSocket-Verbindungen (auch noch nicht beigetretene)
    pub fn offene_verbindungen(&self) -> usize {
        self.offene_verbindungen.load(Ordering::Relaxed)
    }
}

/// Belegter Verbindungsplatz; wird beim Drop freigegeben
pub struct VerbindungsPlatz {
    state: Arc<SignalingState>,
}

impl Drop for VerbindungsPlatz {
    fn drop(&mut self) {
        self.state.offene_verbindungen.fetch_sub(1, Ordering::AcqRel);
    }
}
