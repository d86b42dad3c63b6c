//! Join-Handler – Beitritt mit Anzeigename

use std::sync::Arc;

use klingel_core::ConnectionId;
use klingel_protocol::{message::JoinRequest, ErrorCode};

use crate::broadcast::{ClientSender, Postausgang};
use crate::fanout::chat_nachricht_info;
use crate::handlers::HandlerFehler;
use crate::server_state::SignalingState;

/// Maximale Laenge eines Anzeigenamens in Zeichen
pub const MAX_NAME_LAENGE: usize = 64;

/// Registriert die Verbindung und haengt den juengsten Verlauf an
pub fn handle_join(
    request: JoinRequest,
    sender: &ClientSender,
    state: &Arc<SignalingState>,
) -> Result<(ConnectionId, Postausgang), HandlerFehler> {
    let name = request.username.trim();
    if name.is_empty() {
        return Err(HandlerFehler::neu(
            ErrorCode::InvalidMessage,
            "Benutzername darf nicht leer sein",
        ));
    }
    if name.chars().count() > MAX_NAME_LAENGE {
        return Err(HandlerFehler::neu(
            ErrorCode::InvalidMessage,
            format!("Benutzername zu lang (Maximum: {MAX_NAME_LAENGE} Zeichen)"),
        ));
    }

    let (id, mut post) = state.core.beitreten(sender.clone(), name);

    for nachricht in state.chat.letzte_nachrichten(state.config.history_fuer_beitritt()) {
        post.an(id, sender, chat_nachricht_info(&nachricht));
    }

    tracing::info!(connection_id = %id, username = %name, "Teilnehmer beigetreten");
    Ok((id, post))
}
