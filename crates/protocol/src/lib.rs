//! klingel-protocol – Protokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen, die zwischen Browser-Client
//! und Server ueber die WebSocket-Verbindung ausgetauscht werden, sowie das
//! JSON-Text-Frame-Format.

pub mod message;
pub mod wire;

pub use message::{ClientMessage, ErrorCode, RosterEntry, ServerMessage};
pub use wire::{WireCodec, WireError};
