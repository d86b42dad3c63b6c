//! Call Ledger – Klingelnde und laufende Anrufe
//!
//! Pro Verbindung hoechstens ein Eintrag; fehlt er, ist die Verbindung frei.
//! Eintraege existieren immer paarweise (A->B und B->A).
//!
//! ## Zustaende
//! ```text
//!            initiieren             annehmen
//!   Frei ------------------> Klingelt ----------> ImGespraech
//!    ^                          |                     |
//!    +---- ablehnen/beenden ----+------ beenden ------+
//! ```
//!
//! Das `in_call`-Flag der Registry ist genau fuer Verbindungen im Zustand
//! `ImGespraech` gesetzt. Klingeln allein setzt es nicht.

use std::collections::HashMap;

use klingel_core::{CallError, CallResult, ConnectionId};

use crate::registry::ConnectionRegistry;

/// Kennung eines einzelnen Klingel-Vorgangs
///
/// Ein Klingel-Timeout beendet nur den Anruf, fuer den er gestartet wurde.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RingId(pub u64);

/// Sicht auf den Anrufzustand einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnrufZustand {
    Frei,
    KlingeltAlsAnrufer { angerufener: ConnectionId },
    KlingeltAlsAngerufener { anrufer: ConnectionId },
    ImGespraech { partner: ConnectionId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Eintrag {
    KlingeltAlsAnrufer { angerufener: ConnectionId, ring_id: RingId },
    KlingeltAlsAngerufener { anrufer: ConnectionId, ring_id: RingId },
    ImGespraech { partner: ConnectionId },
}

impl Eintrag {
    fn gegenueber(&self) -> ConnectionId {
        match *self {
            Self::KlingeltAlsAnrufer { angerufener, .. } => angerufener,
            Self::KlingeltAlsAngerufener { anrufer, .. } => anrufer,
            Self::ImGespraech { partner } => partner,
        }
    }
}

/// Ergebnis von `beenden`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beendet {
    pub gegenueber: ConnectionId,
    /// `true` wenn ein laufendes Gespraech beendet wurde (Flags haben sich geaendert)
    pub war_im_gespraech: bool,
}

/// Alle klingelnden und laufenden Anrufe
#[derive(Debug, Default)]
pub struct CallLedger {
    eintraege: HashMap<ConnectionId, Eintrag>,
    naechste_ring_id: u64,
}

impl CallLedger {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn zustand(&self, id: &ConnectionId) -> AnrufZustand {
        match self.eintraege.get(id) {
            None => AnrufZustand::Frei,
            Some(Eintrag::KlingeltAlsAnrufer { angerufener, .. }) => AnrufZustand::KlingeltAlsAnrufer {
                angerufener: *angerufener,
            },
            Some(Eintrag::KlingeltAlsAngerufener { anrufer, .. }) => {
                AnrufZustand::KlingeltAlsAngerufener { anrufer: *anrufer }
            }
            Some(Eintrag::ImGespraech { partner }) => AnrufZustand::ImGespraech { partner: *partner },
        }
    }

    /// Startet einen Anruf; beide Seiten klingeln danach
    pub fn initiieren(
        &mut self,
        registry: &ConnectionRegistry,
        anrufer: ConnectionId,
        angerufener: ConnectionId,
    ) -> CallResult<RingId> {
        if anrufer == angerufener {
            return Err(CallError::SelfCall);
        }
        if !registry.contains(&anrufer) || !registry.contains(&angerufener) {
            return Err(CallError::InvalidTarget);
        }
        if self.eintraege.contains_key(&anrufer) || self.eintraege.contains_key(&angerufener) {
            return Err(CallError::Busy);
        }

        let ring_id = RingId(self.naechste_ring_id);
        self.naechste_ring_id += 1;

        self.eintraege.insert(
            anrufer,
            Eintrag::KlingeltAlsAnrufer {
                angerufener,
                ring_id,
            },
        );
        self.eintraege.insert(
            angerufener,
            Eintrag::KlingeltAlsAngerufener { anrufer, ring_id },
        );
        Ok(ring_id)
    }

    fn klingelt_von(&self, angerufener: &ConnectionId, anrufer: &ConnectionId) -> bool {
        matches!(
            self.eintraege.get(angerufener),
            Some(Eintrag::KlingeltAlsAngerufener { anrufer: a, .. }) if a == anrufer
        )
    }

    /// Nimmt einen klingelnden Anruf an; setzt beide `in_call`-Flags
    pub fn annehmen(
        &mut self,
        registry: &mut ConnectionRegistry,
        angerufener: ConnectionId,
        anrufer: ConnectionId,
    ) -> CallResult<()> {
        if !self.klingelt_von(&angerufener, &anrufer) {
            return Err(CallError::NoSuchRing);
        }

        registry.set_in_call(&angerufener, true)?;
        if let Err(e) = registry.set_in_call(&anrufer, true) {
            registry.set_in_call(&angerufener, false)?;
            return Err(e);
        }

        self.eintraege
            .insert(angerufener, Eintrag::ImGespraech { partner: anrufer });
        self.eintraege
            .insert(anrufer, Eintrag::ImGespraech { partner: angerufener });
        Ok(())
    }

    /// Lehnt einen klingelnden Anruf ab
    ///
    /// Gibt `false` zurueck, wenn es den Anruf nicht (mehr) gibt.
    pub fn ablehnen(&mut self, angerufener: ConnectionId, anrufer: ConnectionId) -> bool {
        if !self.klingelt_von(&angerufener, &anrufer) {
            return false;
        }
        self.eintraege.remove(&angerufener);
        self.eintraege.remove(&anrufer);
        true
    }

    /// Beendet Klingeln oder Gespraech einer Verbindung
    ///
    /// `None` wenn die Verbindung frei war. Zweimal aufgerufen wirkt wie einmal.
    pub fn beenden(&mut self, registry: &mut ConnectionRegistry, id: ConnectionId) -> Option<Beendet> {
        let eintrag = self.eintraege.remove(&id)?;
        let gegenueber = eintrag.gegenueber();
        self.eintraege.remove(&gegenueber);

        let war_im_gespraech = matches!(eintrag, Eintrag::ImGespraech { .. });
        if war_im_gespraech {
            // Eine bereits abgemeldete Seite hat kein Flag mehr
            let _ = registry.set_in_call(&id, false);
            let _ = registry.set_in_call(&gegenueber, false);
        }

        Some(Beendet {
            gegenueber,
            war_im_gespraech,
        })
    }

    /// Gespraechspartner, nur fuer angenommene Anrufe
    pub fn partner_von(&self, id: &ConnectionId) -> Option<ConnectionId> {
        match self.eintraege.get(id) {
            Some(Eintrag::ImGespraech { partner }) => Some(*partner),
            _ => None,
        }
    }

    /// Beendet einen Anruf, der mit dieser `RingId` noch klingelt
    ///
    /// Gibt `(anrufer, angerufener)` zurueck oder `None`, wenn der Anruf
    /// inzwischen angenommen, abgelehnt oder beendet wurde.
    pub fn klingeln_abbrechen(&mut self, ring_id: RingId) -> Option<(ConnectionId, ConnectionId)> {
        let (anrufer, angerufener) = self.eintraege.iter().find_map(|(id, e)| match e {
            Eintrag::KlingeltAlsAnrufer {
                angerufener,
                ring_id: r,
            } if *r == ring_id => Some((*id, *angerufener)),
            _ => None,
        })?;
        self.eintraege.remove(&anrufer);
        self.eintraege.remove(&angerufener);
        Some((anrufer, angerufener))
    }

    /// Anzahl laufender Gespraeche (Paare)
    pub fn anzahl_gespraeche(&self) -> usize {
        self.eintraege
            .values()
            .filter(|e| matches!(e, Eintrag::ImGespraech { .. }))
            .count()
            / 2
    }

    /// Anzahl klingelnder Anrufe (Paare)
    pub fn anzahl_klingelnd(&self) -> usize {
        self.eintraege
            .values()
            .filter(|e| matches!(e, Eintrag::KlingeltAlsAnrufer { .. }))
            .count()
    }
}
