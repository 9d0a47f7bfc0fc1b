//! Graph schema migrations
//!
//! Each entry in [`MIGRATIONS`] runs once, in version order, and is recorded
//! in `graph_schema`.

use sqlx::SqlitePool;
use tracing::{debug, info};

struct Migration {
    version: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "graph nodes and edges",
        // `business_id` is not unique; node creation is append-only.
        sql: r#"
            CREATE TABLE IF NOT EXISTS graph_nodes (
                uid TEXT PRIMARY KEY NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('Requirement', 'Technique', 'Instruction', 'Concept')),
                business_id TEXT NOT NULL,
                properties TEXT NOT NULL DEFAULT '{}',
                embedding TEXT NOT NULL DEFAULT '[]',
                embedding_model TEXT NOT NULL,
                embedding_ts TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_graph_nodes_kind_business_id ON graph_nodes(kind, business_id);

            CREATE TABLE IF NOT EXISTS graph_edges (
                uid TEXT PRIMARY KEY NOT NULL,
                kind TEXT NOT NULL,
                source_uid TEXT NOT NULL REFERENCES graph_nodes(uid) ON DELETE CASCADE,
                target_uid TEXT NOT NULL REFERENCES graph_nodes(uid) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        description: "edge lookup indexes",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_graph_edges_source_kind ON graph_edges(source_uid, kind);
            CREATE INDEX IF NOT EXISTS idx_graph_edges_target ON graph_edges(target_uid);
            CREATE INDEX IF NOT EXISTS idx_graph_edges_kind ON graph_edges(kind);
        "#,
    },
];

/// Latest graph schema version
pub const CURRENT_VERSION: i32 = 2;

/// Highest applied schema version, 0 for a fresh file
pub async fn schema_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS graph_schema (
            version INTEGER PRIMARY KEY NOT NULL,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await?;

    let (version,): (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM graph_schema")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Apply every pending migration inside its own transaction
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current = schema_version(pool).await?;
    if current >= CURRENT_VERSION {
        debug!(version = current, "Graph schema is up to date");
        return Ok(());
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(version = migration.version, description = migration.description, "Applying graph schema migration");

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(migration.sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO graph_schema (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool")
    }

    #[test]
    fn test_migrations_are_sequential() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, index as i32 + 1);
        }
        assert_eq!(MIGRATIONS.len() as i32, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let pool = create_test_pool().await;
        assert_eq!(schema_version(&pool).await.unwrap(), 0);

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        assert_eq!(schema_version(&pool).await.unwrap(), CURRENT_VERSION);
        let (applied,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM graph_schema")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_tables_created() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        for table in ["graph_nodes", "graph_edges"] {
            let result: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap_or_else(|_| panic!("Table {} should exist", table));
            assert_eq!(result.0, 0, "Table {} should be empty", table);
        }
    }

    #[tokio::test]
    async fn test_node_kind_is_checked() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO graph_nodes (uid, kind, business_id, embedding_model, embedding_ts, created_at)
             VALUES ('n1', 'Stakeholder', 'X', 'm', 'now', 'now')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
