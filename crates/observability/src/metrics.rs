//! Prometheus-kompatible Metriken fuer Klingel
//!
//! Registrierte Metriken:
//! - `klingel_connected_clients` – Gauge: Aktuell beigetretene Verbindungen
//! - `klingel_active_calls` – Gauge: Laufende Gespraeche (Paare)
//! - `klingel_ringing_calls` – Gauge: Klingelnde, noch unbeantwortete Anrufe
//! - `klingel_chat_messages_total` – Counter: Verteilte Chat-Nachrichten
//! - `klingel_signals_relayed_total` – Counter: Weitergeleitete WebRTC-Signale
//! - `klingel_signals_dropped_total` – Counter: Verworfene Signale (kein Partner)
//! - `klingel_call_errors_total` – Counter: Fehler-Antworten (code)
//! - `klingel_invalid_frames_total` – Counter: Verworfene, ungueltige Frames
//! - `klingel_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `klingel_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle Klingel-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Zaehler.
#[derive(Clone)]
pub struct KlingelMetrics {
    pub registry: Arc<Registry>,

    // Vermittlungs-Metriken
    pub connected_clients: IntGauge,
    pub active_calls: IntGauge,
    pub ringing_calls: IntGauge,
    pub chat_messages_total: IntCounter,
    pub signals_relayed_total: IntCounter,
    pub signals_dropped_total: IntCounter,
    pub call_errors_total: IntCounterVec,
    pub invalid_frames_total: IntCounter,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl KlingelMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "klingel_connected_clients",
            "Anzahl aktuell beigetretener Verbindungen",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let active_calls = IntGauge::with_opts(Opts::new(
            "klingel_active_calls",
            "Anzahl laufender Gespraeche",
        ))?;
        registry.register(Box::new(active_calls.clone()))?;

        let ringing_calls = IntGauge::with_opts(Opts::new(
            "klingel_ringing_calls",
            "Anzahl klingelnder Anrufe",
        ))?;
        registry.register(Box::new(ringing_calls.clone()))?;

        let chat_messages_total = IntCounter::with_opts(Opts::new(
            "klingel_chat_messages_total",
            "Gesamtanzahl verteilter Chat-Nachrichten",
        ))?;
        registry.register(Box::new(chat_messages_total.clone()))?;

        let signals_relayed_total = IntCounter::with_opts(Opts::new(
            "klingel_signals_relayed_total",
            "Gesamtanzahl weitergeleiteter WebRTC-Signale",
        ))?;
        registry.register(Box::new(signals_relayed_total.clone()))?;

        let signals_dropped_total = IntCounter::with_opts(Opts::new(
            "klingel_signals_dropped_total",
            "WebRTC-Signale ohne aktiven Gespraechspartner",
        ))?;
        registry.register(Box::new(signals_dropped_total.clone()))?;

        let call_errors_total = IntCounterVec::new(
            Opts::new(
                "klingel_call_errors_total",
                "An Clients gemeldete Fehler nach Code",
            ),
            &["code"],
        )?;
        registry.register(Box::new(call_errors_total.clone()))?;

        let invalid_frames_total = IntCounter::with_opts(Opts::new(
            "klingel_invalid_frames_total",
            "Verworfene ungueltige WebSocket-Frames",
        ))?;
        registry.register(Box::new(invalid_frames_total.clone()))?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("klingel_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "klingel_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            active_calls,
            ringing_calls,
            chat_messages_total,
            signals_relayed_total,
            signals_dropped_total,
            call_errors_total,
            invalid_frames_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Zaehlt eine Fehler-Antwort mit ihrem Code
    pub fn fehler_zaehlen(&self, code: &str) {
        self.call_errors_total.with_label_values(&[code]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: KlingelMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<KlingelMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
