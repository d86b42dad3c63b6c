//! klingel-signaling – WebSocket-Vermittlung fuer Chat und Anrufe
//!
//! Dieser Crate verwaltet die WebSocket-Verbindungen der Teilnehmer,
//! vermittelt Anrufe zwischen genau zwei Teilnehmern und leitet deren
//! WebRTC-Signale weiter. Chat-Nachrichten und Presence-Updates werden an
//! alle verteilt.
//!
//! ## Architektur
//!
//! ```text
//! GET /ws (signaling_router)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task, begrenzte Send-Queue)
//!     |
//!     v
//! MessageDispatcher   Verbunden -> Beigetreten
//!     |
//!     +-- join_handler  (Beitritt, Verlauf)
//!     +-- call_handler  (callUser, acceptCall, rejectCall, endCall, webrtcSignal)
//!     +-- chat_handler  (message, read)
//!     |
//!     v
//! SignalingCore (ein Lock)
//!     +-- ConnectionRegistry  – Wer ist verbunden, wer telefoniert
//!     +-- CallLedger          – Klingeln und Gespraechspaare
//!     +-- presence / relay / fanout
//!     |
//!     v
//! Postausgang – wird nach dem Lock zugestellt
//! ```

pub mod broadcast;
pub mod call_ledger;
pub mod connection;
pub mod core;
pub mod dispatcher;
pub mod error;
pub mod fanout;
pub mod handlers;
mod presence;
pub mod registry;
mod relay;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use broadcast::{client_kanal, ClientSender, Postausgang, Zustellung};
pub use call_ledger::{AnrufZustand, CallLedger, RingId};
pub use connection::ClientConnection;
pub use crate::core::{KernStatistik, SignalingCore};
pub use dispatcher::{DispatcherContext, MessageDispatcher};
pub use error::{SignalingError, SignalingResult};
pub use registry::{Connection, ConnectionRegistry};
pub use server_state::{SignalingConfig, SignalingState, VerbindungsPlatz, BEITRITT_RESERVE};
pub use ws::signaling_router;
