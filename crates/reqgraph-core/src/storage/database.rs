//! SQLite pool bootstrap for the graph store

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tracing::debug;

use crate::storage::migrations;

const MAX_CONNECTIONS: u32 = 5;

/// Graph database file used when `store.sqlite_path` is unset
pub fn default_database_path() -> PathBuf {
    match dirs::data_dir() {
        Some(data_dir) => data_dir.join("reqgraph").join("graph.db"),
        None => PathBuf::from("reqgraph.db"),
    }
}

/// Migrated SQLite pool holding `graph_nodes` and `graph_edges`
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create the graph file at `path` and bring its schema up to date
    ///
    /// Missing parent directories are created. A parent that exists but is
    /// not a directory is an error.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create graph database directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open graph database: {}", path.display()))?;

        migrations::run_migrations(&pool)
            .await
            .context("Failed to migrate graph database")?;

        debug!(path = %path.display(), "Graph database ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_parent_dirs_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.db");

        let db = Database::open(&path).await.unwrap();

        assert!(path.exists());
        assert_eq!(
            migrations::schema_version(db.pool()).await.unwrap(),
            migrations::CURRENT_VERSION
        );
        db.pool().close().await;
    }

    #[tokio::test]
    async fn test_reopen_keeps_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");

        let db = Database::open(&path).await.unwrap();
        sqlx::query(
            "INSERT INTO graph_nodes (uid, kind, business_id, embedding_model, embedding_ts, created_at)
             VALUES ('n1', 'Concept', 'C001', 'm', 'ts', 'ts')",
        )
        .execute(db.pool())
        .await
        .unwrap();
        db.pool().close().await;

        let db = Database::open(&path).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM graph_nodes")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_open_under_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = Database::open(&blocker.join("graph.db")).await.unwrap_err();
        assert!(format!("{:#}", err).contains("graph"));
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("graph.db")).await.unwrap();

        let (enabled,): (i32,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
