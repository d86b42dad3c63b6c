//! Message Fan-out – Chat-Nachrichten an alle Verbindungen
//!
//! Unabhaengig vom Anrufzustand.

use chrono::SecondsFormat;
use klingel_chat::ChatNachricht;
use klingel_core::ConnectionId;
use klingel_protocol::{message::ChatMessageInfo, ServerMessage};

use crate::broadcast::Postausgang;
use crate::registry::ConnectionRegistry;

/// Wandelt eine Verlaufs-Nachricht in das Draht-Format
pub fn chat_nachricht_info(nachricht: &ChatNachricht) -> ServerMessage {
    let (file_data, file_type) = match &nachricht.anhang {
        Some(anhang) => (Some(anhang.file_data.clone()), Some(anhang.file_type.clone())),
        None => (None, None),
    };
    ServerMessage::Message(ChatMessageInfo {
        id: Some(nachricht.id),
        text: nachricht.text.clone(),
        sender: nachricht.sender.clone(),
        sender_id: nachricht.sender_id,
        timestamp: nachricht
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        file_data,
        file_type,
        is_system: false,
    })
}

/// Verteilt eine Nachricht an alle, den Absender nur mit `echo`
///
/// Gibt die Anzahl der vorgemerkten Empfaenger zurueck.
pub(crate) fn verteilen(
    registry: &ConnectionRegistry,
    nachricht: &ServerMessage,
    absender: ConnectionId,
    echo: bool,
    post: &mut Postausgang,
) -> usize {
    let mut anzahl = 0;
    for verbindung in registry.alle() {
        if !echo && verbindung.id == absender {
            continue;
        }
        post.an(verbindung.id, &verbindung.sender, nachricht.clone());
        anzahl += 1;
    }
    anzahl
}
