//! Call-Handler – Anrufen, Annehmen, Ablehnen, Auflegen, WebRTC-Signale

use std::sync::Arc;
use std::time::Duration;

use klingel_core::{CallError, ConnectionId};
use klingel_protocol::message::{CallAnswerRequest, CallUserRequest, SignalRequest};

use crate::broadcast::Postausgang;
use crate::call_ledger::RingId;
use crate::handlers::HandlerResult;
use crate::server_state::SignalingState;

/// Startet einen Anruf
pub fn handle_call_user(
    request: CallUserRequest,
    anrufer: ConnectionId,
    state: &Arc<SignalingState>,
) -> HandlerResult {
    let ziel: ConnectionId = request
        .target_user_id
        .parse()
        .map_err(|_| CallError::InvalidTarget)?;

    let (ring_id, post) = state.core.anrufen(anrufer, ziel)?;

    tracing::info!(
        connection_id = %anrufer,
        ziel = %ziel,
        ring_id = ring_id.0,
        "Anruf klingelt"
    );
    klingel_timeout_starten(ring_id, state);
    Ok(post)
}

/// Nimmt einen klingelnden Anruf an
pub fn handle_accept_call(
    request: CallAnswerRequest,
    angerufener: ConnectionId,
    state: &Arc<SignalingState>,
) -> HandlerResult {
    let anrufer: ConnectionId = request
        .caller_id
        .parse()
        .map_err(|_| CallError::NoSuchRing)?;

    let post = state.core.annehmen(angerufener, anrufer)?;
    tracing::info!(connection_id = %angerufener, anrufer = %anrufer, "Anruf angenommen");
    Ok(post)
}

/// Lehnt einen Anruf ab; veraltete Ablehnungen bleiben folgenlos
pub fn handle_reject_call(
    request: CallAnswerRequest,
    angerufener: ConnectionId,
    state: &Arc<SignalingState>,
) -> Postausgang {
    let Ok(anrufer) = request.caller_id.parse::<ConnectionId>() else {
        tracing::debug!(connection_id = %angerufener, "Ablehnung mit ungueltiger Anrufer-ID");
        return Postausgang::neu();
    };

    let post = state.core.ablehnen(angerufener, anrufer);
    if post.is_empty() {
        tracing::debug!(connection_id = %angerufener, anrufer = %anrufer, "Kein Anruf zum Ablehnen");
    } else {
        tracing::info!(connection_id = %angerufener, anrufer = %anrufer, "Anruf abgelehnt");
    }
    post
}

/// Beendet Klingeln oder Gespraech des Absenders
pub fn handle_end_call(id: ConnectionId, state: &Arc<SignalingState>) -> Postausgang {
    let post = state.core.auflegen(id);
    if !post.is_empty() {
        tracing::info!(connection_id = %id, "Anruf beendet");
    }
    post
}

/// Leitet ein WebRTC-Signal an den Gespraechspartner weiter
pub fn handle_signal(request: SignalRequest, von: ConnectionId, state: &Arc<SignalingState>) -> Postausgang {
    match state.core.signal_weiterleiten(von, request.signal) {
        Some(post) => {
            state.metriken.signals_relayed_total.inc();
            post
        }
        None => {
            state.metriken.signals_dropped_total.inc();
            Postausgang::neu()
        }
    }
}

/// Beendet den Anruf nach `klingel_timeout_sek`, falls er dann noch klingelt
fn klingel_timeout_starten(ring_id: RingId, state: &Arc<SignalingState>) {
    let sek = state.config.klingel_timeout_sek;
    if sek == 0 {
        return;
    }

    let state = Arc::clone(state);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(sek)).await;
        let post = state.core.klingel_timeout(ring_id);
        if !post.is_empty() {
            tracing::info!(ring_id = ring_id.0, "Klingel-Timeout – Anruf beendet");
        }
        post.zustellen();
        state.gauges_aktualisieren();
    });
}
