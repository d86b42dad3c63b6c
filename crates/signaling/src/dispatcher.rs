//! Message-Dispatcher – Routet Client-Nachrichten an die richtigen Handler
//!
//! Der Dispatcher empfaengt dekodierte Nachrichten einer Verbindung, prueft
//! den Verbindungszustand und stellt das Ergebnis zu.
//!
//! ## Zustandspruefung
//! - `join` nur vor dem Beitritt, sonst `ALREADY_JOINED`
//! - Alle anderen nur nach dem Beitritt, sonst `NOT_JOINED`

use std::sync::Arc;

use klingel_core::ConnectionId;
use klingel_protocol::{ClientMessage, ErrorCode};

use crate::broadcast::{ClientSender, Postausgang, Zustellung};
use crate::handlers::{call_handler, chat_handler, join_handler, HandlerFehler, HandlerResult};
use crate::server_state::SignalingState;

/// Dispatcher-Kontext – Informationen ueber die aktuelle Verbindung
pub struct DispatcherContext {
    /// Eigene Send-Queue (auch vor dem Beitritt fuer Fehler-Antworten)
    pub sender: ClientSender,
    /// Zugewiesene ID, `None` vor dem Beitritt und nach dem Aufraeumen
    pub connection_id: Option<ConnectionId>,
}

impl DispatcherContext {
    pub fn neu(sender: ClientSender) -> Self {
        Self {
            sender,
            connection_id: None,
        }
    }
}

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Dekodiert einen Text-Frame und verarbeitet ihn
    ///
    /// Ungueltige Frames werden geloggt und verworfen, die Verbindung bleibt offen.
    pub fn frame_verarbeiten(&self, text: &str, ctx: &mut DispatcherContext) {
        match self.state.codec.dekodieren(text) {
            Ok(nachricht) => self.dispatch(nachricht, ctx),
            Err(e) => {
                self.state.metriken.invalid_frames_total.inc();
                tracing::warn!(
                    connection_id = ?ctx.connection_id,
                    fehler = %e,
                    "Ungueltiger Frame verworfen"
                );
            }
        }
    }

    /// Verarbeitet eine Nachricht und stellt alle Folgenachrichten zu
    pub fn dispatch(&self, nachricht: ClientMessage, ctx: &mut DispatcherContext) {
        tracing::trace!(
            connection_id = ?ctx.connection_id,
            typ = nachricht.typ_name(),
            "Nachricht empfangen"
        );

        let ergebnis = match (nachricht, ctx.connection_id) {
            (ClientMessage::Join(request), None) => {
                match join_handler::handle_join(request, &ctx.sender, &self.state) {
                    Ok((id, post)) => {
                        ctx.connection_id = Some(id);
                        Ok(post)
                    }
                    Err(e) => Err(e),
                }
            }
            (ClientMessage::Join(_), Some(_)) => Err(HandlerFehler::neu(
                ErrorCode::AlreadyJoined,
                "Bereits beigetreten",
            )),
            (_, None) => Err(HandlerFehler::neu(
                ErrorCode::NotJoined,
                "Zuerst mit join beitreten",
            )),
            (andere, Some(id)) => self.dispatch_beigetreten(andere, id),
        };

        match ergebnis {
            Ok(post) => {
                post.zustellen();
            }
            Err(fehler) => self.fehler_melden(&fehler, ctx),
        }
        self.state.gauges_aktualisieren();
    }

    /// Verarbeitet Nachrichten beigetretener Verbindungen
    fn dispatch_beigetreten(&self, nachricht: ClientMessage, id: ConnectionId) -> HandlerResult {
        let state = &self.state;
        match nachricht {
            ClientMessage::CallUser(r) => call_handler::handle_call_user(r, id, state),
            ClientMessage::AcceptCall(r) => call_handler::handle_accept_call(r, id, state),
            ClientMessage::RejectCall(r) => Ok(call_handler::handle_reject_call(r, id, state)),
            ClientMessage::EndCall => Ok(call_handler::handle_end_call(id, state)),
            ClientMessage::WebrtcSignal(r) => Ok(call_handler::handle_signal(r, id, state)),
            ClientMessage::Message(r) => chat_handler::handle_message(r, id, state),
            ClientMessage::Read(r) => Ok(chat_handler::handle_read(r, id, state)),
            // Bereits in `dispatch` abgefangen
            ClientMessage::Join(_) => Ok(Postausgang::neu()),
        }
    }

    fn fehler_melden(&self, fehler: &HandlerFehler, ctx: &DispatcherContext) {
        self.state.metriken.fehler_zaehlen(fehler.code.as_str());
        tracing::debug!(
            connection_id = ?ctx.connection_id,
            code = fehler.code.as_str(),
            "Fehler an Client gemeldet"
        );
        if ctx.sender.senden(fehler.als_nachricht()) == Zustellung::Ueberlauf {
            tracing::warn!(
                connection_id = ?ctx.connection_id,
                "Send-Queue voll – Client wird getrennt"
            );
        }
    }

    /// Raeumt eine Verbindung genau einmal auf
    ///
    /// Beendet einen Anruf, meldet ab und verteilt `userLeft` und Roster.
    pub fn client_cleanup(&self, ctx: &mut DispatcherContext) {
        let Some(id) = ctx.connection_id.take() else {
            return;
        };
        self.state.core.verlassen(id).zustellen();
        self.state.gauges_aktualisieren();
        tracing::info!(connection_id = %id, "Teilnehmer abgemeldet");
    }
}
