//! klingel-server – Bibliotheks-Root
//!
//! Baut aus der Konfiguration alle Dienste zusammen und stellt den
//! oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use config::{ServerConfig, SpeicherTyp};
use klingel_chat::{
    chat_router, ChatHttpState, ChatService, DiskStorage, FileService, MemoryStorage,
    StorageBackend,
};
use klingel_observability::{
    health_router, metrics_router, observability_server_starten, request_timing_layer,
    timing_middleware, HealthState, KlingelMetrics,
};
use klingel_signaling::{signaling_router, SignalingState};
use tokio::sync::watch;
use tower_http::services::ServeDir;

/// Intervall des Upload-Aufraeum-Tasks
const AUFRAEUM_INTERVALL: Duration = Duration::from_secs(60);

/// Alle laufenden Dienste eines Servers
#[derive(Clone)]
pub struct Dienste {
    pub signaling: Arc<SignalingState>,
    pub chat: Arc<ChatService>,
    pub dateien: Arc<FileService>,
    pub metriken: KlingelMetrics,
    pub health: HealthState,
}

impl Dienste {
    /// Erstellt Metriken, Chat, Upload-Speicher und Vermittlung
    pub fn erstellen(config: &ServerConfig) -> Result<Self> {
        let metriken = KlingelMetrics::neu().context("Metriken konnten nicht registriert werden")?;

        let speicher: Arc<dyn StorageBackend> = match config.chat.speicher {
            SpeicherTyp::Memory => Arc::new(MemoryStorage::neu()),
            SpeicherTyp::Disk => {
                tracing::info!(verzeichnis = %config.chat.speicher_verzeichnis, "Uploads auf Disk");
                Arc::new(DiskStorage::new(&config.chat.speicher_verzeichnis))
            }
        };

        let chat = ChatService::neu(config.chat.history_limit);
        let dateien = FileService::neu(
            speicher,
            config.chat.max_upload_bytes,
            Duration::from_secs(config.chat.datei_ttl_sek),
        );
        let signaling = SignalingState::neu(
            config.signaling_config(),
            Arc::clone(&chat),
            metriken.clone(),
        );
        let health = HealthState::neu(metriken.clone(), config.signaling.max_clients);

        Ok(Self {
            signaling,
            chat,
            dateien,
            metriken,
            health,
        })
    }

    /// Baut den Haupt-Router: WebSocket, Chat-API, Uploads, Metriken, Health
    ///
    /// Ohne statisches Verzeichnis antwortet der Fallback mit 404.
    pub fn router(&self, config: &ServerConfig, shutdown_rx: watch::Receiver<bool>) -> Router {
        let mut app = Router::new()
            .merge(signaling_router(Arc::clone(&self.signaling), shutdown_rx))
            .merge(chat_router(ChatHttpState {
                chat: Arc::clone(&self.chat),
                dateien: Arc::clone(&self.dateien),
            }))
            .merge(metrics_router(self.metriken.clone()))
            .merge(health_router(self.health.clone()));

        if let Some(verzeichnis) = &config.netzwerk.statisch_verzeichnis {
            tracing::info!(verzeichnis = %verzeichnis, "Statische Dateien aktiviert");
            app = app.fallback_service(ServeDir::new(verzeichnis));
        }

        app.layer(axum::middleware::from_fn_with_state(
            self.metriken.clone(),
            timing_middleware,
        ))
        .layer(request_timing_layer())
    }
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Dienste erstellen (Metriken, Chat, Uploads, Vermittlung)
    /// 2. Upload-Aufraeum-Task starten
    /// 3. Optionalen Observability-Server starten
    /// 4. HTTP/WebSocket-Listener starten
    /// 5. Auf Ctrl-C warten, dann geordnet herunterfahren
    pub async fn starten(self) -> Result<()> {
        let adresse: SocketAddr = self
            .config
            .bind_adresse()
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.config.bind_adresse()))?;

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            max_clients = self.config.signaling.max_clients,
            "Server startet"
        );

        let dienste = Dienste::erstellen(&self.config)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let aufraeumen = Arc::clone(&dienste.dateien)
            .aufraeumen_starten(AUFRAEUM_INTERVALL, shutdown_rx.clone());

        if self.config.observability.aktiviert {
            let obs_adresse: SocketAddr = self
                .config
                .observability_bind_adresse()
                .parse()
                .context("Ungueltige Observability-Adresse")?;
            let metriken = dienste.metriken.clone();
            let health = dienste.health.clone();
            let rx = shutdown_rx.clone();
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(obs_adresse, metriken, health, rx).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        let app = dienste.router(&self.config, shutdown_rx.clone());
        let listener = tokio::net::TcpListener::bind(adresse)
            .await
            .with_context(|| format!("Bind auf {adresse} fehlgeschlagen"))?;
        tracing::info!(adresse = %adresse, "HTTP/WebSocket bereit");

        let mut server_rx = shutdown_rx;
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            while server_rx.changed().await.is_ok() {
                if *server_rx.borrow() {
                    break;
                }
            }
        });
        let server_task = tokio::spawn(async move { server.await });

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
        let _ = shutdown_tx.send(true);

        server_task.await??;
        aufraeumen.await?;
        tracing::info!("Server beendet");
        Ok(())
    }
}
