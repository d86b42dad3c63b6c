//! Presence Broadcaster – Roster und Beitritts-/Austritts-Events
//!
//! Alle Funktionen arbeiten auf der bereits gesperrten Registry und fuellen
//! nur den Postausgang.

use chrono::{SecondsFormat, Utc};
use klingel_core::ConnectionId;
use klingel_protocol::{
    message::{ChatMessageInfo, PresenceInfo},
    ServerMessage,
};

use crate::broadcast::Postausgang;
use crate::registry::ConnectionRegistry;

/// Aktuelle Teilnehmerliste an alle Verbindungen
pub(crate) fn roster_an_alle(registry: &ConnectionRegistry, post: &mut Postausgang) {
    let liste = ServerMessage::user_list(registry.snapshot());
    for verbindung in registry.alle() {
        post.an(verbindung.id, &verbindung.sender, liste.clone());
    }
}

/// `userJoined` an alle ausser dem Neuen
pub(crate) fn beitritt_melden(registry: &ConnectionRegistry, neu: ConnectionId, post: &mut Postausgang) {
    let Some(verbindung) = registry.get(&neu) else {
        return;
    };
    let event = ServerMessage::UserJoined(PresenceInfo {
        user_id: neu,
        username: verbindung.display_name.clone(),
    });
    for andere in registry.alle().into_iter().filter(|v| v.id != neu) {
        post.an(andere.id, &andere.sender, event.clone());
    }
}

/// `userLeft` an alle Verbliebenen (der Abgemeldete ist nicht mehr registriert)
pub(crate) fn austritt_melden(
    registry: &ConnectionRegistry,
    weg: ConnectionId,
    username: &str,
    post: &mut Postausgang,
) {
    let event = ServerMessage::UserLeft(PresenceInfo {
        user_id: weg,
        username: username.to_string(),
    });
    for verbindung in registry.alle() {
        post.an(verbindung.id, &verbindung.sender, event.clone());
    }
}

/// Absendername von Systemnachrichten
pub const SYSTEM_ABSENDER: &str = "System";

/// Systemnachricht (`isSystem`) ueber den Teilnehmer `betroffen` an alle
pub(crate) fn systemnachricht_an_alle(
    registry: &ConnectionRegistry,
    betroffen: ConnectionId,
    text: String,
    post: &mut Postausgang,
) {
    let nachricht = ServerMessage::Message(ChatMessageInfo {
        id: None,
        text,
        sender: SYSTEM_ABSENDER.to_string(),
        sender_id: betroffen,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        file_data: None,
        file_type: None,
        is_system: true,
    });
    for verbindung in registry.alle() {
        post.an(verbindung.id, &verbindung.sender, nachricht.clone());
    }
}
