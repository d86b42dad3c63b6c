//! Ausgehende Zustellung – Send-Queues und Postausgang
//!
//! Jede Verbindung hat eine begrenzte Send-Queue. Kern-Operationen fuellen
//! unter dem Lock nur einen `Postausgang`; zugestellt wird erst nach dem
//! Freigeben des Locks, immer nicht-blockierend.
//!
//! ## Volle Queue
//! Ein Client, dessen Queue voll ist, gilt als haengend: sein
//! `CancellationToken` wird ausgeloest, der Verbindungs-Task endet und laeuft
//! durch das normale Aufraeumen.

use klingel_core::ConnectionId;
use klingel_protocol::ServerMessage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    tx: mpsc::Sender<ServerMessage>,
    schliessen: CancellationToken,
}

/// Ergebnis eines einzelnen Zustellversuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zustellung {
    Eingereiht,
    /// Queue voll, Client wird getrennt
    Ueberlauf,
    /// Client bereits getrennt
    Geschlossen,
}

/// Erstellt Send-Queue und Handle fuer eine neue Verbindung
pub fn client_kanal(groesse: usize) -> (ClientSender, mpsc::Receiver<ServerMessage>) {
    let (tx, rx) = mpsc::channel(groesse.max(1));
    (
        ClientSender {
            tx,
            schliessen: CancellationToken::new(),
        },
        rx,
    )
}

impl ClientSender {
    /// Reiht eine Nachricht nicht-blockierend ein
    pub fn senden(&self, nachricht: ServerMessage) -> Zustellung {
        match self.tx.try_send(nachricht) {
            Ok(()) => Zustellung::Eingereiht,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.schliessen.cancel();
                Zustellung::Ueberlauf
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Zustellung::Geschlossen,
        }
    }

    /// Token, das beim Ueberlauf ausgeloest wird
    pub fn schliess_signal(&self) -> CancellationToken {
        self.schliessen.clone()
    }

    /// Ob der Client wegen Ueberlauf getrennt werden soll
    pub fn ist_abgewuergt(&self) -> bool {
        self.schliessen.is_cancelled()
    }
}

// ---------------------------------------------------------------------------
// Postausgang
// ---------------------------------------------------------------------------

/// Ausstehende Zustellungen, gesammelt unter dem Kern-Lock
#[derive(Debug, Default)]
#[must_use = "ein Postausgang muss zugestellt werden"]
pub struct Postausgang {
    eintraege: Vec<(ConnectionId, ClientSender, ServerMessage)>,
}

impl Postausgang {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Merkt eine Nachricht fuer einen Empfaenger vor
    pub fn an(&mut self, empfaenger: ConnectionId, sender: &ClientSender, nachricht: ServerMessage) {
        self.eintraege.push((empfaenger, sender.clone(), nachricht));
    }

    /// Haengt einen weiteren Postausgang an (Reihenfolge bleibt erhalten)
    pub fn anhaengen(&mut self, mut anderer: Postausgang) {
        self.eintraege.append(&mut anderer.eintraege);
    }

    pub fn len(&self) -> usize {
        self.eintraege.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }

    /// Alle vorgemerkten Empfaenger in Reihenfolge
    pub fn empfaenger(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.eintraege.iter().map(|(id, _, _)| *id)
    }

    /// Stellt alle Nachrichten zu. Darf nicht unter dem Kern-Lock laufen.
    ///
    /// Gibt die Anzahl erfolgreich eingereihter Nachrichten zurueck.
    pub fn zustellen(self) -> usize {
        let mut eingereiht = 0;
        for (empfaenger, sender, nachricht) in self.eintraege {
            match sender.senden(nachricht) {
                Zustellung::Eingereiht => eingereiht += 1,
                Zustellung::Ueberlauf => {
                    tracing::warn!(
                        connection_id = %empfaenger,
                        "Send-Queue voll – Client wird getrennt"
                    );
                }
                Zustellung::Geschlossen => {
                    tracing::debug!(
                        connection_id = %empfaenger,
                        "Send-Queue geschlossen (Client getrennt)"
                    );
                }
            }
        }
        eingereiht
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn senden_und_empfangen() {
        let (sender, mut rx) = client_kanal(4);
        assert_eq!(sender.senden(ServerMessage::CallEnded), Zustellung::Eingereiht);
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::CallEnded)));
    }

    #[tokio::test]
    async fn volle_queue_loest_schliess_signal_aus() {
        let (sender, _rx) = client_kanal(1);
        let signal = sender.schliess_signal();

        assert_eq!(sender.senden(ServerMessage::CallEnded), Zustellung::Eingereiht);
        assert!(!signal.is_cancelled());

        assert_eq!(sender.senden(ServerMessage::CallEnded), Zustellung::Ueberlauf);
        assert!(signal.is_cancelled());
        assert!(sender.ist_abgewuergt());
    }

    #[tokio::test]
    async fn geschlossene_queue_wird_ignoriert() {
        let (sender, rx) = client_kanal(4);
        drop(rx);
        assert_eq!(sender.senden(ServerMessage::CallEnded), Zustellung::Geschlossen);
        assert!(!sender.ist_abgewuergt());
    }

    #[tokio::test]
    async fn postausgang_ein_haengender_client_blockiert_andere_nicht() {
        let (langsam, _rx_langsam) = client_kanal(1);
        let (schnell, mut rx_schnell) = client_kanal(8);
        let id_langsam = ConnectionId::new();
        let id_schnell = ConnectionId::new();

        let mut post = Postausgang::neu();
        for _ in 0..3 {
            post.an(id_langsam, &langsam, ServerMessage::CallEnded);
            post.an(id_schnell, &schnell, ServerMessage::CallEnded);
        }
        assert_eq!(post.len(), 6);

        // 1x langsam + 3x schnell
        assert_eq!(post.zustellen(), 4);
        assert!(langsam.ist_abgewuergt());

        let mut empfangen = 0;
        while rx_schnell.try_recv().is_ok() {
            empfangen += 1;
        }
        assert_eq!(empfangen, 3);
    }

    #[test]
    fn anhaengen_behaelt_reihenfolge() {
        let (s, _rx) = client_kanal(4);
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        let mut erster = Postausgang::neu();
        erster.an(a, &s, ServerMessage::CallEnded);
        let mut zweiter = Postausgang::neu();
        zweiter.an(b, &s, ServerMessage::CallEnded);

        erster.anhaengen(zweiter);
        assert_eq!(erster.empfaenger().collect::<Vec<_>>(), vec![a, b]);
    }
}
