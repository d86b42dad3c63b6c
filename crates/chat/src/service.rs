//! ChatService – Nachrichten annehmen, Verlauf, Lesebestaetigungen
//!
//! Der Verlauf lebt nur im Speicher und ist auf `history_limit` Nachrichten
//! begrenzt. Verdraengte Nachrichten verlieren auch ihre Lesebestaetigungen.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use klingel_core::{ConnectionId, MessageId};
use parking_lot::Mutex;

use crate::{
    error::{ChatError, ChatResult},
    types::{ChatNachricht, Lesebestaetigung, NeueNachricht},
};

/// Maximale Textlaenge einer Nachricht in Zeichen
pub const MAX_TEXT_LAENGE: usize = 4096;

struct Verlauf {
    nachrichten: VecDeque<ChatNachricht>,
    bestaetigungen: HashMap<MessageId, Vec<Lesebestaetigung>>,
    naechste_id: u64,
}

/// ChatService verwaltet den gemeinsamen Nachrichtenverlauf
pub struct ChatService {
    verlauf: Mutex<Verlauf>,
    history_limit: usize,
}

impl ChatService {
    /// Erstellt einen neuen ChatService
    pub fn neu(history_limit: usize) -> Arc<Self> {
        Arc::new(Self {
            verlauf: Mutex::new(Verlauf {
                nachrichten: VecDeque::new(),
                bestaetigungen: HashMap::new(),
                naechste_id: 1,
            }),
            history_limit,
        })
    }

    /// Nimmt eine Nachricht an, vergibt ID und Zeitstempel
    ///
    /// Leerer Text ist nur mit Anhang erlaubt.
    pub fn nachricht_senden(&self, neu: NeueNachricht) -> ChatResult<ChatNachricht> {
        if neu.text.trim().is_empty() && neu.anhang.is_none() {
            return Err(ChatError::UngueltigeEingabe(
                "Nachrichteninhalt darf nicht leer sein".into(),
            ));
        }

        let zeichen = neu.text.chars().count();
        if zeichen > MAX_TEXT_LAENGE {
            return Err(ChatError::UngueltigeEingabe(format!(
                "Nachricht zu lang: {zeichen} Zeichen (Maximum: {MAX_TEXT_LAENGE})"
            )));
        }

        let mut verlauf = self.verlauf.lock();
        let id = MessageId(verlauf.naechste_id);
        verlauf.naechste_id += 1;

        let nachricht = ChatNachricht {
            id,
            text: neu.text,
            sender: neu.sender,
            sender_id: neu.sender_id,
            timestamp: Utc::now(),
            anhang: neu.anhang,
        };

        if self.history_limit > 0 {
            verlauf.nachrichten.push_back(nachricht.clone());
            while verlauf.nachrichten.len() > self.history_limit {
                if let Some(alt) = verlauf.nachrichten.pop_front() {
                    verlauf.bestaetigungen.remove(&alt.id);
                }
            }
        }

        tracing::debug!(
            message_id = %id,
            sender_id = %nachricht.sender_id,
            anhang = nachricht.anhang.is_some(),
            "Chat-Nachricht angenommen"
        );

        Ok(nachricht)
    }

    /// Die letzten `limit` Nachrichten, aelteste zuerst
    pub fn letzte_nachrichten(&self, limit: usize) -> Vec<ChatNachricht> {
        let verlauf = self.verlauf.lock();
        let start = verlauf.nachrichten.len().saturating_sub(limit);
        verlauf.nachrichten.iter().skip(start).cloned().collect()
    }

    /// Markiert eine Nachricht als gelesen
    ///
    /// Gibt `Some` nur beim ersten Lesen durch diesen Teilnehmer zurueck,
    /// Wiederholungen liefern `None`.
    pub fn als_gelesen_markieren(
        &self,
        message_id: MessageId,
        user_id: ConnectionId,
        username: &str,
    ) -> ChatResult<Option<Lesebestaetigung>> {
        let mut verlauf = self.verlauf.lock();
        if !verlauf.nachrichten.iter().any(|n| n.id == message_id) {
            return Err(ChatError::NachrichtNichtGefunden(message_id.to_string()));
        }

        let liste = verlauf.bestaetigungen.entry(message_id).or_default();
        if liste.iter().any(|b| b.user_id == user_id) {
            return Ok(None);
        }

        let bestaetigung = Lesebestaetigung {
            message_id,
            user_id,
            username: username.to_string(),
            read_at: Utc::now(),
        };
        liste.push(bestaetigung.clone());
        Ok(Some(bestaetigung))
    }

    /// Alle Lesebestaetigungen einer Nachricht in Eingangsreihenfolge
    pub fn lesebestaetigungen(&self, message_id: MessageId) -> ChatResult<Vec<Lesebestaetigung>> {
        let verlauf = self.verlauf.lock();
        if !verlauf.nachrichten.iter().any(|n| n.id == message_id) {
            return Err(ChatError::NachrichtNichtGefunden(message_id.to_string()));
        }
        Ok(verlauf
            .bestaetigungen
            .get(&message_id)
            .cloned()
            .unwrap_or_default())
    }

    /// Anzahl der Nachrichten im Verlauf
    pub fn anzahl(&self) -> usize {
        self.verlauf.lock().nachrichten.len()
    }
}
