//! Graph session lifecycle
//!
//! A [`GraphSessionManager`] owns at most one connected store. Connecting
//! builds the configured backend and pings it; failures surface as
//! [`Error::Connection`] and are not retried.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{StoreBackend, StoreConfig};
use crate::domain::graph::{GraphStore, ResetSummary};
use crate::error::{Error, Result};
use crate::storage::Database;

use super::memory::InMemoryGraphStore;
use super::sqlite::SqliteGraphStore;

enum StoreSource {
    Configured(StoreConfig),
    Provided(Arc<dyn GraphStore>),
}

/// Connection lifecycle around a single [`GraphStore`]
pub struct GraphSessionManager {
    source: StoreSource,
    store: Option<Arc<dyn GraphStore>>,
}

impl GraphSessionManager {
    /// Create a manager that builds its store from configuration on connect
    pub fn new(config: StoreConfig) -> Self {
        Self {
            source: StoreSource::Configured(config),
            store: None,
        }
    }

    /// Create a manager around an already constructed store
    pub fn with_store(store: Arc<dyn GraphStore>) -> Self {
        Self {
            source: StoreSource::Provided(store),
            store: None,
        }
    }

    /// Open the store and verify it answers
    pub async fn connect(&mut self) -> Result<()> {
        if self.store.is_some() {
            return Ok(());
        }

        let store = match &self.source {
            StoreSource::Provided(store) => Arc::clone(store),
            StoreSource::Configured(config) => open_store(config).await?,
        };

        store
            .ping()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        info!(backend = store.backend(), "Graph session connected");
        self.store = Some(store);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    /// Borrow the connected store
    pub fn store(&self) -> Result<&dyn GraphStore> {
        self.store.as_deref().ok_or(Error::NotConnected)
    }

    /// Shared handle to the connected store
    pub fn shared_store(&self) -> Result<Arc<dyn GraphStore>> {
        self.store.clone().ok_or(Error::NotConnected)
    }

    /// Detach-delete every node and edge
    pub async fn reset(&self) -> Result<ResetSummary> {
        let summary = self.store()?.delete_all().await?;
        info!(
            nodes = summary.nodes_deleted,
            edges = summary.edges_deleted,
            "Graph reset"
        );
        Ok(summary)
    }

    /// Release the store; safe to call repeatedly or without a connection
    pub async fn close(&mut self) -> Result<()> {
        let Some(store) = self.store.take() else {
            return Ok(());
        };

        if let Err(e) = store.close().await {
            warn!(backend = store.backend(), error = %e, "Error while closing graph session");
            return Err(e);
        }

        info!(backend = store.backend(), "Graph session closed");
        Ok(())
    }
}

async fn open_store(config: &StoreConfig) -> Result<Arc<dyn GraphStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryGraphStore::new())),
        StoreBackend::Sqlite => {
            let path = config.resolved_sqlite_path();
            let db = Database::open(&path)
                .await
                .map_err(|e| Error::Connection(format!("{:#}", e)))?;
            Ok(Arc::new(SqliteGraphStore::new(db.pool().clone())))
        }
        #[cfg(feature = "neo4j")]
        StoreBackend::Neo4j => Ok(Arc::new(
            super::neo4j::Neo4jGraphStore::connect(config).await?,
        )),
        #[cfg(not(feature = "neo4j"))]
        StoreBackend::Neo4j => Err(Error::Config(
            "the neo4j backend requires building with `--features neo4j`".to_string(),
        )),
    }
}
