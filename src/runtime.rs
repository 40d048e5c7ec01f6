//! Composition root.
//!
//! [`Services::from_config`] is the only place that decides which storage backend
//! and auth gate are in use. Everything else receives them as trait objects.

use crate::auth::{AuthGate, CredentialTable};
use crate::config::{Config, SessionConfig, StorageBackend};
use crate::domain::BoardId;
use crate::error::{BoardError, Result};
use crate::events::{EventSink, TracingSink};
use crate::session::BoardSession;
use crate::storage::{MemoryStorage, Storage};
use crate::surface::CommandSurface;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct Services {
    pub storage: Arc<dyn Storage>,
    pub auth: Arc<dyn AuthGate>,
    pub events: Arc<dyn EventSink>,
    pub session: SessionConfig,
}

impl Services {
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let storage = open_storage(config)?;
        storage.initialize().await?;

        if config.credentials.is_empty() {
            warn!("no credentials configured, the command surface will reject every request");
        }
        let auth = CredentialTable::from_config(&config.credentials)?;

        info!(backend = ?config.storage, credentials = auth.len(), "services ready");
        Ok(Self {
            storage,
            auth: Arc::new(auth),
            events: Arc::new(TracingSink),
            session: config.session,
        })
    }

    /// Replaces the event sink, e.g. with a channel feeding a webhook dispatcher
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthGate>) -> Self {
        self.auth = auth;
        self
    }

    pub fn command_surface(&self) -> CommandSurface {
        CommandSurface::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.auth),
            Arc::clone(&self.events),
        )
        .with_timeout(self.session.persistence_timeout())
    }

    pub async fn open_session(&self, board: BoardId) -> Result<BoardSession> {
        BoardSession::open(board, Arc::clone(&self.storage), self.session).await
    }
}

fn open_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let template = config.board.clone();

    match &config.storage {
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new().with_template(template))),
        #[cfg(feature = "file-storage")]
        StorageBackend::File { root } => Ok(Arc::new(
            crate::storage::FileStorage::new(root).with_template(template),
        )),
        #[cfg(feature = "sqlite-storage")]
        StorageBackend::Sqlite { path } => Ok(Arc::new(
            crate::storage::SqliteStorage::open(path)?.with_template(template),
        )),
        #[allow(unreachable_patterns)]
        other => Err(BoardError::ConfigError(format!(
            "storage backend {:?} is not compiled in",
            other
        ))),
    }
}
