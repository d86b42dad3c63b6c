//! Storage-Backend fuer Datei-Uploads
//!
//! Das `StorageBackend`-Trait abstrahiert den konkreten Speicher. Der
//! `FileService` haelt es als `Arc<dyn StorageBackend>`, deshalb `async_trait`.

use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{ChatError, ChatResult};

/// Abstraktes Speicher-Backend fuer Dateien
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Datei unter dem angegebenen Schluessel speichern
    async fn store(&self, key: &str, data: &[u8]) -> ChatResult<()>;

    /// Datei laden
    async fn retrieve(&self, key: &str) -> ChatResult<Vec<u8>>;

    /// Datei loeschen (nicht vorhanden ist kein Fehler)
    async fn delete(&self, key: &str) -> ChatResult<()>;
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Fluechtiger Speicher im Prozess (Standard)
#[derive(Debug, Default)]
pub struct MemoryStorage {
    dateien: DashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Anzahl gespeicherter Dateien
    pub fn anzahl(&self) -> usize {
        self.dateien.len()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn store(&self, key: &str, data: &[u8]) -> ChatResult<()> {
        self.dateien.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> ChatResult<Vec<u8>> {
        self.dateien
            .get(key)
            .map(|d| d.value().clone())
            .ok_or_else(|| ChatError::DateiNichtGefunden(key.to_string()))
    }

    async fn delete(&self, key: &str) -> ChatResult<()> {
        self.dateien.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DiskStorage
// ---------------------------------------------------------------------------

/// Disk-basiertes Storage-Backend
///
/// Speichert Dateien unter `base_dir/<key>`.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    base_dir: PathBuf,
}

impl DiskStorage {
    /// Neues DiskStorage mit dem angegebenen Basisverzeichnis erstellen
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Vollstaendigen Dateipfad berechnen, Pfadtrenner im Schluessel sind verboten
    fn full_path(&self, key: &str) -> ChatResult<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
            return Err(ChatError::UngueltigeEingabe(format!(
                "Ungueltiger Speicher-Schluessel: {key}"
            )));
        }
        Ok(self.base_dir.join(key))
    }
}

#[async_trait]
impl StorageBackend for DiskStorage {
    async fn store(&self, key: &str, data: &[u8]) -> ChatResult<()> {
        let full = self.full_path(key)?;
        tokio::fs::create_dir_all(&self.base_dir).await?;
        tokio::fs::write(&full, data).await?;
        tracing::debug!(path = %full.display(), bytes = data.len(), "Datei gespeichert");
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> ChatResult<Vec<u8>> {
        let full = self.full_path(key)?;
        match tokio::fs::read(&full).await {
            Ok(data) => {
                tracing::debug!(path = %full.display(), bytes = data.len(), "Datei gelesen");
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ChatError::DateiNichtGefunden(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> ChatResult<()> {
        let full = self.full_path(key)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => {
                tracing::debug!(path = %full.display(), "Datei geloescht");
                Ok(())
            }
            // Bereits geloescht
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
