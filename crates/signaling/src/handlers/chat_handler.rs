//! Chat-Handler – Nachrichten verteilen und Lesebestaetigungen
//!
//! Nachrichten laufen ueber den ChatService (ID, Zeitstempel, Verlauf) und
//! werden dann an alle Verbindungen verteilt.

use std::sync::Arc;

use chrono::Utc;
use klingel_chat::{Anhang, ChatNachricht, NeueNachricht};
use klingel_core::{ConnectionId, MessageId};
use klingel_protocol::{
    message::{ChatSendRequest, ReadReceiptInfo, ReadRequest},
    ErrorCode, ServerMessage,
};

use crate::broadcast::Postausgang;
use crate::fanout::chat_nachricht_info;
use crate::handlers::{HandlerFehler, HandlerResult};
use crate::server_state::SignalingState;

/// Anhang aus der Anfrage: Upload-ID bevorzugt, sonst alte Inline-Daten
fn anhang_aus(request: &mut ChatSendRequest) -> Option<Anhang> {
    let file_type = request.file_type.take()?;
    let file_data = request.file_id.take().or_else(|| request.file_data.take())?;
    Some(Anhang {
        file_data,
        file_type,
    })
}

/// Prueft, ob die ausgehende `message` noch in einen Frame passt
///
/// Die ausgehende Form ist groesser als die Anfrage (ID, Zeitstempel,
/// Absender). Geprueft wird mit der groesstmoeglichen ID, bevor die Nachricht
/// in den Verlauf kommt.
fn ausgehend_kodierbar(neu: &NeueNachricht, state: &SignalingState) -> Result<(), HandlerFehler> {
    let entwurf = ChatNachricht {
        id: MessageId(u64::MAX),
        text: neu.text.clone(),
        sender: neu.sender.clone(),
        sender_id: neu.sender_id,
        timestamp: Utc::now(),
        anhang: neu.anhang.clone(),
    };
    state
        .codec
        .kodieren(&chat_nachricht_info(&entwurf))
        .map(|_| ())
        .map_err(|e| HandlerFehler::neu(ErrorCode::InvalidMessage, e.to_string()))
}

/// Nimmt eine Chat-Nachricht an und verteilt sie
pub fn handle_message(
    mut request: ChatSendRequest,
    absender: ConnectionId,
    state: &Arc<SignalingState>,
) -> HandlerResult {
    let sender = state
        .core
        .anzeigename(&absender)
        .ok_or_else(|| HandlerFehler::neu(ErrorCode::NotJoined, "Nicht beigetreten"))?;

    let anhang = anhang_aus(&mut request);
    let neu = NeueNachricht {
        sender_id: absender,
        sender,
        text: request.text,
        anhang,
    };
    ausgehend_kodierbar(&neu, state)?;

    let nachricht = state
        .chat
        .nachricht_senden(neu)
        .map_err(|e| HandlerFehler::neu(ErrorCode::InvalidMessage, e.to_string()))?;

    state.metriken.chat_messages_total.inc();
    tracing::debug!(
        connection_id = %absender,
        message_id = %nachricht.id,
        "Chat-Nachricht verteilt"
    );

    Ok(state.core.an_alle(
        &chat_nachricht_info(&nachricht),
        absender,
        state.config.echo_an_absender,
    ))
}

/// Markiert eine Nachricht als gelesen und meldet es allen
///
/// Wiederholtes Lesen und unbekannte Nachrichten erzeugen keine Post.
pub fn handle_read(request: ReadRequest, leser: ConnectionId, state: &Arc<SignalingState>) -> Postausgang {
    let Some(username) = state.core.anzeigename(&leser) else {
        return Postausgang::neu();
    };

    match state
        .chat
        .als_gelesen_markieren(request.message_id, leser, &username)
    {
        Ok(Some(bestaetigung)) => state.core.an_alle(
            &ServerMessage::ReadReceipt(ReadReceiptInfo {
                message_id: bestaetigung.message_id,
                user_id: bestaetigung.user_id,
                username: bestaetigung.username,
            }),
            leser,
            true,
        ),
        Ok(None) => Postausgang::neu(),
        Err(e) => {
            tracing::debug!(connection_id = %leser, fehler = %e, "Lesebestaetigung ignoriert");
            Postausgang::neu()
        }
    }
}
