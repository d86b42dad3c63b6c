//! Signaling Relay – WebRTC-Signale zwischen Gespraechspartnern
//!
//! Die Nutzdaten (SDP, ICE-Kandidaten) werden nicht ausgewertet, nur mit
//! `fromUserId` markiert weitergereicht.

use klingel_core::ConnectionId;
use klingel_protocol::{message::SignalInfo, ServerMessage};

use crate::broadcast::Postausgang;
use crate::call_ledger::CallLedger;
use crate::registry::ConnectionRegistry;

/// Leitet ein Signal an den Gespraechspartner weiter
///
/// Gibt `false` zurueck, wenn es keinen angenommenen Partner gibt; das
/// Signal wird dann verworfen.
pub(crate) fn weiterleiten(
    registry: &ConnectionRegistry,
    ledger: &CallLedger,
    von: ConnectionId,
    signal: serde_json::Value,
    post: &mut Postausgang,
) -> bool {
    let Some(partner) = ledger.partner_von(&von) else {
        tracing::debug!(connection_id = %von, "Signal ohne Gespraechspartner verworfen");
        return false;
    };
    let Some(ziel) = registry.get(&partner) else {
        tracing::debug!(connection_id = %von, partner = %partner, "Partner nicht mehr registriert");
        return false;
    };

    post.an(
        partner,
        &ziel.sender,
        ServerMessage::WebrtcSignal(SignalInfo {
            signal,
            from_user_id: von,
        }),
    );
    true
}
