//! Health-Check-Endpunkt fuer Klingel
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Verbindungsauslastung

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::KlingelMetrics;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub connected_clients: i64,
    pub active_calls: i64,
    pub max_clients: u32,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    pub metriken: KlingelMetrics,
    pub max_clients: u32,
}

impl HealthState {
    pub fn neu(metriken: KlingelMetrics, max_clients: u32) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            metriken,
            max_clients,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Volle Auslastung meldet `degraded`, neue Clients werden dann abgewiesen
    pub fn status(&self) -> HealthStatus {
        let verbunden = self.metriken.connected_clients.get();
        if self.max_clients > 0 && verbunden >= i64::from(self.max_clients) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn antwort(&self) -> HealthResponse {
        HealthResponse {
            status: self.status(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            connected_clients: self.metriken.connected_clients.get(),
            active_calls: self.metriken.active_calls.get(),
            max_clients: self.max_clients,
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Serverstatus zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let response = state.antwort();

    let http_status = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK, // 200 auch bei degraded (Probe soll nicht failen)
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(max: u32) -> HealthState {
        HealthState::neu(KlingelMetrics::neu().unwrap(), max)
    }

    #[test]
    fn health_state_uptime_frisch() {
        assert!(state(10).uptime_seconds() < 5);
    }

    #[test]
    fn status_gesund_unter_limit() {
        let s = state(2);
        s.metriken.connected_clients.set(1);
        assert_eq!(s.status(), HealthStatus::Healthy);
    }

    #[test]
    fn status_degraded_bei_voller_auslastung() {
        let s = state(2);
        s.metriken.connected_clients.set(2);
        assert_eq!(s.status(), HealthStatus::Degraded);
    }

    #[test]
    fn kein_limit_bleibt_gesund() {
        let s = state(0);
        s.metriken.connected_clients.set(10_000);
        assert_eq!(s.status(), HealthStatus::Healthy);
    }

    #[test]
    fn health_response_serialisierung() {
        let s = state(512);
        s.metriken.active_calls.set(1);
        let json = serde_json::to_string(&s.antwort()).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"active_calls\":1"));
        assert!(json.contains("\"max_clients\":512"));
    }

    #[tokio::test]
    async fn health_endpunkt_liefert_json() {
        let app: Router = health_router(state(4));
        let antwort = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(antwort.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.status, HealthStatus::Healthy);
        assert_eq!(parsed.max_clients, 4);
    }
}
