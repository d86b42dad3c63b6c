//! Handler fuer alle Client-Nachrichten
//!
//! Jeder Handler ist fuer einen Nachrichtentyp zustaendig. Erfolg liefert
//! einen `Postausgang`, Fehler gehen als `callError` nur an den Ausloeser.

use klingel_core::CallError;
use klingel_protocol::{ErrorCode, ServerMessage};

use crate::broadcast::Postausgang;

pub mod call_handler;
pub mod chat_handler;
pub mod join_handler;

/// Fehler eines Handlers, wird zu `callError`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFehler {
    pub code: ErrorCode,
    pub nachricht: String,
}

impl HandlerFehler {
    pub fn neu(code: ErrorCode, nachricht: impl Into<String>) -> Self {
        Self {
            code,
            nachricht: nachricht.into(),
        }
    }

    pub fn als_nachricht(&self) -> ServerMessage {
        ServerMessage::call_error(self.code, self.nachricht.clone())
    }
}

impl From<CallError> for HandlerFehler {
    fn from(fehler: CallError) -> Self {
        Self::neu(fehler.into(), fehler.to_string())
    }
}

pub type HandlerResult = Result<Postausgang, HandlerFehler>;
