//! klingel-chat – Chat-Verlauf und Datei-Uploads
//!
//! Dieses Crate implementiert:
//! - ChatService: Nachrichten annehmen, begrenzter In-Memory-Verlauf, Lesebestaetigungen
//! - FileService: Uploads als Data-URL, Download, Ablauf nach TTL
//! - StorageBackend-Trait + MemoryStorage- und DiskStorage-Implementierung
//! - HTTP-Router fuer `/upload`, `/file/:id` und `/api/messages`
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use klingel_chat::{ChatService, FileService, MemoryStorage};
//!
//! let chat = ChatService::neu(200);
//! let dateien = FileService::neu(
//!     Arc::new(MemoryStorage::neu()),
//!     100 * 1024 * 1024,
//!     Duration::from_secs(3600),
//! );
//! ```

pub mod error;
pub mod file_service;
pub mod http;
pub mod service;
pub mod storage;
pub mod types;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use error::{ChatError, ChatResult};
pub use file_service::FileService;
pub use http::{chat_router, ChatHttpState};
pub use service::{ChatService, MAX_TEXT_LAENGE};
pub use types::{Anhang, ChatNachricht, DateiInfo, DateiUpload, Lesebestaetigung, NeueNachricht};
pub use storage::{DiskStorage, MemoryStorage, StorageBackend};
