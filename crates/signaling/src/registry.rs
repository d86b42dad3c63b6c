//! Connection Registry – Wer ist verbunden?
//!
//! Haelt zu jeder beigetretenen Verbindung ID, Anzeigename, Gespraechs-Flag
//! und Send-Handle. Die Registry selbst ist nicht synchronisiert; sie lebt
//! im `SignalingCore` hinter dessen Mutex.

use std::collections::HashMap;

use klingel_core::{CallError, CallResult, ConnectionId};
use klingel_protocol::RosterEntry;

use crate::broadcast::ClientSender;

/// Eine beigetretene Verbindung
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    /// Fest fuer die Lebensdauer der Verbindung
    pub display_name: String,
    /// Nur vom Call Ledger veraendert
    pub in_call: bool,
    pub sender: ClientSender,
    /// Beitritts-Reihenfolge fuer die Roster-Sortierung
    seq: u64,
}

/// Alle beigetretenen Verbindungen
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    verbindungen: HashMap<ConnectionId, Connection>,
    naechste_seq: u64,
}

impl ConnectionRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Verbindung unter einer frischen ID
    pub fn register(&mut self, sender: ClientSender, display_name: impl Into<String>) -> ConnectionId {
        let mut id = ConnectionId::new();
        while self.verbindungen.contains_key(&id) {
            id = ConnectionId::new();
        }

        let seq = self.naechste_seq;
        self.naechste_seq += 1;

        self.verbindungen.insert(
            id,
            Connection {
                id,
                display_name: display_name.into(),
                in_call: false,
                sender,
                seq,
            },
        );
        id
    }

    /// Entfernt eine Verbindung; unbekannte IDs sind kein Fehler
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<Connection> {
        self.verbindungen.remove(id)
    }

    pub fn set_in_call(&mut self, id: &ConnectionId, in_call: bool) -> CallResult<()> {
        let verbindung = self
            .verbindungen
            .get_mut(id)
            .ok_or(CallError::UnknownConnection)?;
        verbindung.in_call = in_call;
        Ok(())
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.verbindungen.get(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.verbindungen.contains_key(id)
    }

    /// Alle Verbindungen in Beitritts-Reihenfolge
    pub fn alle(&self) -> Vec<&Connection> {
        let mut alle: Vec<&Connection> = self.verbindungen.values().collect();
        alle.sort_by_key(|v| v.seq);
        alle
    }

    /// Roster in Beitritts-Reihenfolge
    pub fn snapshot(&self) -> Vec<RosterEntry> {
        self.alle()
            .into_iter()
            .map(|v| RosterEntry {
                id: v.id,
                username: v.display_name.clone(),
                in_call: v.in_call,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.verbindungen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verbindungen.is_empty()
    }
}
