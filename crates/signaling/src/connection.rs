//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung laeuft in einem eigenen tokio-Task und verarbeitet ihre
//! eingehenden Frames nacheinander. Ausgehende Nachrichten kommen ueber die
//! begrenzte Send-Queue.
//!
//! ## Ende der Verbindung
//! Schliessen durch den Client, Transportfehler, Keepalive-Timeout,
//! Shutdown oder Ueberlauf der Send-Queue beenden die Schleife. Danach
//! laeuft genau einmal `client_cleanup`. Eine ausgehende Nachricht, die
//! nicht kodiert werden kann (z.B. groesser als `max_frame_size`), wird
//! nur verworfen.
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen WebSocket-Ping
//! - Jeder empfangene Frame (auch Pong) zaehlt als Lebenszeichen
//! - Nach `verbindungs_timeout_sek` Stille wird die Verbindung getrennt

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::time::Instant;

use crate::broadcast::client_kanal;
use crate::dispatcher::{DispatcherContext, MessageDispatcher};
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::{SignalingState, VerbindungsPlatz};

/// WebSocket-Close-Code "Going Away"
const CLOSE_GOING_AWAY: u16 = 1001;
/// WebSocket-Close-Code "Try Again Later" (Client zu langsam)
const CLOSE_TRY_AGAIN_LATER: u16 = 1013;
/// Wartezeit fuer den Close-Frame an einen langsamen Client
const SCHLIESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    /// Haelt den Verbindungsplatz bis zum Ende des Tasks
    _platz: VerbindungsPlatz,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState>, platz: VerbindungsPlatz) -> Self {
        Self {
            state,
            _platz: platz,
        }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal eingeht.
    pub async fn verarbeiten(
        self,
        socket: WebSocket,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek.max(1));
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek.max(1));

        let (mut ws_tx, mut ws_rx) = socket.split();
        let (sender, mut sende_rx) = client_kanal(self.state.config.send_queue_groesse);
        let abgewuergt = sender.schliess_signal();

        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));
        let mut ctx = DispatcherContext::neu(sender);

        tracing::debug!("Neue WebSocket-Verbindung");

        // Zeitpunkt des letzten empfangenen Frames
        let mut letzter_empfang = Instant::now();
        // Zeitpunkt des naechsten Ping
        let mut naechster_ping = Instant::now() + keepalive_intervall;

        loop {
            let jetzt = Instant::now();

            // Timeout-Pruefung
            if jetzt.duration_since(letzter_empfang) > timeout_dauer {
                tracing::warn!(connection_id = ?ctx.connection_id, "Verbindungs-Timeout");
                break;
            }

            // Send-Queue uebergelaufen
            if abgewuergt.is_cancelled() {
                tracing::warn!(connection_id = ?ctx.connection_id, "Client zu langsam – Verbindung wird getrennt");
                let _ = tokio::time::timeout(
                    SCHLIESS_TIMEOUT,
                    schliessen(&mut ws_tx, CLOSE_TRY_AGAIN_LATER, "Send-Queue voll"),
                )
                .await;
                break;
            }

            tokio::select! {
                // Eingehender Frame vom Client
                frame = ws_rx.next() => {
                    match frame {
                        Some(Ok(nachricht)) => {
                            letzter_empfang = Instant::now();
                            match nachricht {
                                Message::Text(text) => dispatcher.frame_verarbeiten(&text, &mut ctx),
                                Message::Close(_) => {
                                    tracing::debug!(connection_id = ?ctx.connection_id, "Close-Frame empfangen");
                                    break;
                                }
                                // Binaer-Frames werden ignoriert, Ping beantwortet axum selbst
                                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                connection_id = ?ctx.connection_id,
                                fehler = %e,
                                "WebSocket-Lesefehler"
                            );
                            break;
                        }
                        None => {
                            tracing::debug!(connection_id = ?ctx.connection_id, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus der Send-Queue
                Some(ausgehend) = sende_rx.recv() => {
                    // Ein blockierter Socket darf das Abwuergen nicht aufhalten
                    let gesendet = tokio::select! {
                        biased;
                        res = frame_senden(&self.state, &mut ws_tx, &ausgehend) => res,
                        _ = abgewuergt.cancelled() => {
                            tracing::warn!(connection_id = ?ctx.connection_id, "Client blockiert – Verbindung wird getrennt");
                            break;
                        }
                    };
                    match gesendet {
                        Ok(()) => {}
                        // Nur dieser Frame faellt weg, die Verbindung bleibt
                        Err(SignalingError::Wire(e)) => {
                            tracing::warn!(
                                connection_id = ?ctx.connection_id,
                                fehler = %e,
                                "Ausgehende Nachricht nicht kodierbar – verworfen"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                connection_id = ?ctx.connection_id,
                                fehler = %e,
                                "Senden fehlgeschlagen"
                            );
                            break;
                        }
                    }
                }

                // Keepalive-Ping
                _ = tokio::time::sleep_until(naechster_ping) => {
                    if let Err(e) = ws_tx.send(Message::Ping(Vec::new())).await {
                        tracing::warn!(
                            connection_id = ?ctx.connection_id,
                            fehler = %e,
                            "Ping-Senden fehlgeschlagen"
                        );
                        break;
                    }
                    naechster_ping = Instant::now() + keepalive_intervall;
                }

                // Send-Queue uebergelaufen; geschlossen wird oben in der Schleife
                _ = abgewuergt.cancelled() => {}

                // Shutdown-Signal
                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow() {
                        tracing::info!(connection_id = ?ctx.connection_id, "Shutdown-Signal – Verbindung wird getrennt");
                        let _ = schliessen(&mut ws_tx, CLOSE_GOING_AWAY, "Server wird heruntergefahren").await;
                        break;
                    }
                }
            }
        }

        // Cleanup beim Verbindungsende
        dispatcher.client_cleanup(&mut ctx);
        tracing::debug!("Verbindungs-Task beendet");
    }
}

async fn frame_senden<S>(
    state: &SignalingState,
    ws_tx: &mut S,
    nachricht: &klingel_protocol::ServerMessage,
) -> SignalingResult<()>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let text = state.codec.kodieren(nachricht)?;
    ws_tx.send(Message::Text(text)).await?;
    Ok(())
}

async fn schliessen<S>(ws_tx: &mut S, code: u16, grund: &'static str) -> SignalingResult<()>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    ws_tx
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: grund.into(),
        })))
        .await
        .map_err(SignalingError::from)
}
