//! SignalingCore – Registry und Call Ledger hinter einem Lock
//!
//! Jede Operation sperrt genau einmal, veraendert Registry und Ledger
//! gemeinsam und gibt einen `Postausgang` zurueck. Zugestellt wird vom
//! Aufrufer, nachdem der Lock wieder frei ist.
//!
//! Zwei gleichzeitige Anrufe A->B und B->A werden durch den Lock
//! serialisiert: der zweite sieht eine belegte Seite und bekommt `Busy`.

use klingel_core::{CallResult, ConnectionId};
use klingel_protocol::{
    message::{CallAcceptedInfo, CallRejectedInfo, IncomingCallInfo, UserIdInfo},
    RosterEntry, ServerMessage,
};
use parking_lot::Mutex;

use crate::broadcast::{ClientSender, Postausgang};
use crate::call_ledger::{AnrufZustand, CallLedger, RingId};
use crate::registry::ConnectionRegistry;
use crate::{fanout, presence, relay};

struct KernZustand {
    registry: ConnectionRegistry,
    ledger: CallLedger,
}

/// Momentaufnahme fuer Metriken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KernStatistik {
    pub verbunden: usize,
    pub gespraeche: usize,
    pub klingelnd: usize,
}

/// Gemeinsamer Vermittlungs-Zustand
pub struct SignalingCore {
    zustand: Mutex<KernZustand>,
    /// Beitritt und Austritt zusaetzlich als Chat-Systemnachricht melden
    systemnachrichten: bool,
}

impl SignalingCore {
    pub fn neu() -> Self {
        Self::mit_systemnachrichten(false)
    }

    pub fn mit_systemnachrichten(systemnachrichten: bool) -> Self {
        Self {
            zustand: Mutex::new(KernZustand {
                registry: ConnectionRegistry::neu(),
                ledger: CallLedger::neu(),
            }),
            systemnachrichten,
        }
    }

    // -----------------------------------------------------------------------
    // Mitgliedschaft
    // -----------------------------------------------------------------------

    /// Registriert eine Verbindung
    ///
    /// Der Neue bekommt `userId` und `userList`, alle anderen `userJoined`
    /// und `userList`. Mit Systemnachrichten geht danach an alle eine
    /// Beitrittsmeldung.
    pub fn beitreten(&self, sender: ClientSender, display_name: &str) -> (ConnectionId, Postausgang) {
        let mut post = Postausgang::neu();
        let mut z = self.zustand.lock();

        let id = z.registry.register(sender.clone(), display_name);
        post.an(id, &sender, ServerMessage::UserId(UserIdInfo { user_id: id }));
        presence::beitritt_melden(&z.registry, id, &mut post);
        presence::roster_an_alle(&z.registry, &mut post);
        if self.systemnachrichten {
            let text = format!("{display_name} ist beigetreten");
            presence::systemnachricht_an_alle(&z.registry, id, text, &mut post);
        }

        (id, post)
    }

    /// Meldet eine Verbindung ab: Anruf beenden, austragen, Presence melden
    pub fn verlassen(&self, id: ConnectionId) -> Postausgang {
        let mut post = Postausgang::neu();
        let mut z = self.zustand.lock();
        let KernZustand { registry, ledger } = &mut *z;

        if let Some(beendet) = ledger.beenden(registry, id) {
            if let Some(gegenueber) = registry.get(&beendet.gegenueber) {
                post.an(gegenueber.id, &gegenueber.sender, ServerMessage::CallEnded);
            }
        }

        if let Some(verbindung) = registry.unregister(&id) {
            presence::austritt_melden(registry, id, &verbindung.display_name, &mut post);
            presence::roster_an_alle(registry, &mut post);
            if self.systemnachrichten {
                let text = format!("{} hat den Chat verlassen", verbindung.display_name);
                presence::systemnachricht_an_alle(registry, id, text, &mut post);
            }
        }

        post
    }

    // -----------------------------------------------------------------------
    // Anrufe
    // -----------------------------------------------------------------------

    /// Startet einen Anruf; der Angerufene bekommt `incomingCall`
    pub fn anrufen(&self, anrufer: ConnectionId, ziel: ConnectionId) -> CallResult<(RingId, Postausgang)> {
        let mut post = Postausgang::neu();
        let mut z = self.zustand.lock();
        let KernZustand { registry, ledger } = &mut *z;

        let ring_id = ledger.initiieren(registry, anrufer, ziel)?;

        if let (Some(von), Some(an)) = (registry.get(&anrufer), registry.get(&ziel)) {
            post.an(
                an.id,
                &an.sender,
                ServerMessage::IncomingCall(IncomingCallInfo {
                    caller_id: anrufer,
                    caller_name: von.display_name.clone(),
                }),
            );
        }

        Ok((ring_id, post))
    }

    /// Nimmt einen Anruf an; beide sind danach im Gespraech
    pub fn annehmen(&self, angerufener: ConnectionId, anrufer: ConnectionId) -> CallResult<Postausgang> {
        let mut post = Postausgang::neu();
        let mut z = self.zustand.lock();
        let KernZustand { registry, ledger } = &mut *z;

        ledger.annehmen(registry, angerufener, anrufer)?;

        if let Some(von) = registry.get(&anrufer) {
            post.an(
                von.id,
                &von.sender,
                ServerMessage::CallAccepted(CallAcceptedInfo {
                    accepter_id: angerufener,
                }),
            );
        }
        presence::roster_an_alle(registry, &mut post);

        Ok(post)
    }

    /// Lehnt einen Anruf ab; existiert er nicht mehr, passiert nichts
    pub fn ablehnen(&self, angerufener: ConnectionId, anrufer: ConnectionId) -> Postausgang {
        let mut post = Postausgang::neu();
        let mut z = self.zustand.lock();

        if z.ledger.ablehnen(angerufener, anrufer) {
            if let Some(von) = z.registry.get(&anrufer) {
                post.an(
                    von.id,
                    &von.sender,
                    ServerMessage::CallRejected(CallRejectedInfo {
                        rejecter_id: angerufener,
                    }),
                );
            }
        }

        post
    }

    /// Beendet Klingeln oder Gespraech; die Gegenseite bekommt `callEnded`
    pub fn auflegen(&self, id: ConnectionId) -> Postausgang {
        let mut post = Postausgang::neu();
        let mut z = self.zustand.lock();
        let KernZustand { registry, ledger } = &mut *z;

        let Some(beendet) = ledger.beenden(registry, id) else {
            return post;
        };

        if let Some(gegenueber) = registry.get(&beendet.gegenueber) {
            post.an(gegenueber.id, &gegenueber.sender, ServerMessage::CallEnded);
        }
        if beendet.war_im_gespraech {
            presence::roster_an_alle(registry, &mut post);
        }

        post
    }

    /// Klingel-Timeout: beendet den Anruf nur, wenn genau dieser noch klingelt
    pub fn klingel_timeout(&self, ring_id: RingId) -> Postausgang {
        let mut post = Postausgang::neu();
        let mut z = self.zustand.lock();

        if let Some((anrufer, angerufener)) = z.ledger.klingeln_abbrechen(ring_id) {
            for id in [anrufer, angerufener] {
                if let Some(v) = z.registry.get(&id) {
                    post.an(v.id, &v.sender, ServerMessage::CallEnded);
                }
            }
        }

        post
    }

    // -----------------------------------------------------------------------
    // Relay und Fan-out
    // -----------------------------------------------------------------------

    /// Leitet ein WebRTC-Signal an den Gespraechspartner weiter
    ///
    /// `None` wenn kein angenommener Partner existiert.
    pub fn signal_weiterleiten(&self, von: ConnectionId, signal: serde_json::Value) -> Option<Postausgang> {
        let mut post = Postausgang::neu();
        let z = self.zustand.lock();
        relay::weiterleiten(&z.registry, &z.ledger, von, signal, &mut post).then_some(post)
    }

    /// Verteilt eine Nachricht an alle Verbindungen
    pub fn an_alle(&self, nachricht: &ServerMessage, absender: ConnectionId, echo: bool) -> Postausgang {
        let mut post = Postausgang::neu();
        let z = self.zustand.lock();
        fanout::verteilen(&z.registry, nachricht, absender, echo, &mut post);
        post
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn anzeigename(&self, id: &ConnectionId) -> Option<String> {
        self.zustand
            .lock()
            .registry
            .get(id)
            .map(|v| v.display_name.clone())
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.zustand.lock().registry.snapshot()
    }

    pub fn anruf_zustand(&self, id: &ConnectionId) -> AnrufZustand {
        self.zustand.lock().ledger.zustand(id)
    }

    pub fn partner_von(&self, id: &ConnectionId) -> Option<ConnectionId> {
        self.zustand.lock().ledger.partner_von(id)
    }

    pub fn statistik(&self) -> KernStatistik {
        let z = self.zustand.lock();
        KernStatistik {
            verbunden: z.registry.len(),
            gespraeche: z.ledger.anzahl_gespraeche(),
            klingelnd: z.ledger.anzahl_klingelnd(),
        }
    }
}

impl Default for SignalingCore {
    fn default() -> Self {
        Self::neu()
    }
}
