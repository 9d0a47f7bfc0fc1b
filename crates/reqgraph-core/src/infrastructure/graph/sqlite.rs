//! SQLite implementation of the GraphStore
//!
//! Nodes and edges live in `graph_nodes` / `graph_edges`. Properties and
//! embeddings are stored as JSON text. Every trait call runs inside its own
//! transaction, committed on success and rolled back on drop otherwise.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::graph::{
    EdgePolicy, EdgeRequest, EdgeWrite, EntityKind, GraphNode, GraphStats, GraphStore, NewEntity,
    NodeRef, Properties, RelationshipKind, ResetSummary,
};
use crate::error::{Error, Result};

/// SQLite implementation of the graph store
#[derive(Clone)]
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    /// Create a new SQLite graph store over a migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn matching_uids(tx: &mut Transaction<'_, Sqlite>, node: &NodeRef) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT uid FROM graph_nodes WHERE kind = ? AND business_id = ? ORDER BY rowid",
        )
        .bind(node.kind.label())
        .bind(&node.id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(|(uid,)| uid).collect())
    }

    async fn connected(
        tx: &mut Transaction<'_, Sqlite>,
        kind: RelationshipKind,
        source_uid: &str,
        target_uid: &str,
    ) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM graph_edges WHERE kind = ? AND source_uid = ? AND target_uid = ?",
        )
        .bind(kind.as_str())
        .bind(source_uid)
        .bind(target_uid)
        .fetch_one(&mut **tx)
        .await?;

        Ok(count > 0)
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn create_node(&self, entity: &NewEntity) -> Result<GraphNode> {
        let node = GraphNode::stamp(entity);
        let properties_json = serde_json::to_string(&node.properties)?;
        let embedding_json = serde_json::to_string(&node.embedding)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO graph_nodes (
                uid, kind, business_id, properties, embedding,
                embedding_model, embedding_ts, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&node.uid)
        .bind(node.kind.label())
        .bind(&node.id)
        .bind(&properties_json)
        .bind(&embedding_json)
        .bind(&node.embedding_model)
        .bind(node.embedding_ts.to_rfc3339())
        .bind(node.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(kind = %node.kind, id = %node.id, uid = %node.uid, "Node saved");
        Ok(node)
    }

    async fn find_nodes(&self, node: &NodeRef) -> Result<Vec<GraphNode>> {
        let rows: Vec<NodeRow> = sqlx::query_as(
            "SELECT * FROM graph_nodes WHERE kind = ? AND business_id = ? ORDER BY rowid",
        )
        .bind(node.kind.label())
        .bind(&node.id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_node()).collect()
    }

    async fn list_nodes(&self, kind: EntityKind) -> Result<Vec<GraphNode>> {
        let rows: Vec<NodeRow> =
            sqlx::query_as("SELECT * FROM graph_nodes WHERE kind = ? ORDER BY rowid")
                .bind(kind.label())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(|r| r.into_node()).collect()
    }

    async fn create_edge(&self, request: &EdgeRequest, policy: EdgePolicy) -> Result<EdgeWrite> {
        let mut tx = self.pool.begin().await?;

        let sources = Self::matching_uids(&mut tx, &request.from).await?;
        if sources.is_empty() {
            return Ok(EdgeWrite::MissingEndpoint(request.from.clone()));
        }
        let targets = Self::matching_uids(&mut tx, &request.to).await?;
        if targets.is_empty() {
            return Ok(EdgeWrite::MissingEndpoint(request.to.clone()));
        }

        let mut created = 0u64;
        for source_uid in &sources {
            for target_uid in &targets {
                if policy == EdgePolicy::Deduplicate
                    && Self::connected(&mut tx, request.kind, source_uid, target_uid).await?
                {
                    continue;
                }

                sqlx::query(
                    r#"
                    INSERT INTO graph_edges (uid, kind, source_uid, target_uid, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(request.kind.as_str())
                .bind(source_uid)
                .bind(target_uid)
                .bind(Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
                created += 1;
            }
        }
        tx.commit().await?;

        debug!(edge = %request, created, "Edge request applied");
        if created == 0 {
            Ok(EdgeWrite::AlreadyExists)
        } else {
            Ok(EdgeWrite::Created(created))
        }
    }

    async fn edge_exists(&self, request: &EdgeRequest) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM graph_edges e
            JOIN graph_nodes s ON s.uid = e.source_uid
            JOIN graph_nodes t ON t.uid = e.target_uid
            WHERE e.kind = ?
              AND s.kind = ? AND s.business_id = ?
              AND t.kind = ? AND t.business_id = ?
            "#,
        )
        .bind(request.kind.as_str())
        .bind(request.from.kind.label())
        .bind(&request.from.id)
        .bind(request.to.kind.label())
        .bind(&request.to.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn stats(&self) -> Result<GraphStats> {
        let node_counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT kind, COUNT(*) FROM graph_nodes GROUP BY kind")
                .fetch_all(&self.pool)
                .await?;
        let edge_counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT kind, COUNT(*) FROM graph_edges GROUP BY kind")
                .fetch_all(&self.pool)
                .await?;

        let mut stats = GraphStats::default();
        for (kind, count) in node_counts {
            let kind = EntityKind::parse(&kind)
                .ok_or_else(|| Error::Other(format!("Invalid node kind: {}", kind)))?;
            stats.nodes_by_kind.insert(kind, count as u64);
        }
        for (kind, count) in edge_counts {
            let kind = RelationshipKind::parse(&kind)
                .ok_or_else(|| Error::Other(format!("Invalid relationship kind: {}", kind)))?;
            stats.edges_by_kind.insert(kind, count as u64);
        }

        Ok(stats)
    }

    async fn delete_all(&self) -> Result<ResetSummary> {
        let mut tx = self.pool.begin().await?;
        let edges = sqlx::query("DELETE FROM graph_edges").execute(&mut *tx).await?;
        let nodes = sqlx::query("DELETE FROM graph_nodes").execute(&mut *tx).await?;
        tx.commit().await?;

        let summary = ResetSummary {
            nodes_deleted: nodes.rows_affected(),
            edges_deleted: edges.rows_affected(),
        };
        info!(
            nodes = summary.nodes_deleted,
            edges = summary.edges_deleted,
            "Graph cleared"
        );
        Ok(summary)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

// ========== Row Types ==========

#[derive(Debug, FromRow)]
struct NodeRow {
    uid: String,
    kind: String,
    business_id: String,
    properties: String,
    embedding: String,
    embedding_model: String,
    embedding_ts: String,
    created_at: String,
}

impl NodeRow {
    fn into_node(self) -> Result<GraphNode> {
        let kind = EntityKind::parse(&self.kind)
            .ok_or_else(|| Error::Other(format!("Invalid node kind: {}", self.kind)))?;
        let properties: Properties = serde_json::from_str(&self.properties)?;
        let embedding: Vec<f64> = serde_json::from_str(&self.embedding)?;

        Ok(GraphNode {
            uid: self.uid,
            kind,
            id: self.business_id,
            properties,
            embedding,
            embedding_model: self.embedding_model,
            embedding_ts: parse_timestamp("embedding_ts", &self.embedding_ts)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("Invalid {} timestamp {:?}: {}", field, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{ConceptFields, InstructionFields, RequirementFields, TechniqueFields};
    use crate::storage::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqliteGraphStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool");

        run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        SqliteGraphStore::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_find_node() {
        let store = setup_test_db().await;
        let entity = NewEntity::requirement(
            "REQ_0001",
            RequirementFields::new("O sistema deve permitir login").with_domain("segurança"),
        )
        .with_embedding(vec![0.25, -1.5, 3.0e-4], "text-embedding-3-small");

        let saved = store.create_node(&entity).await.unwrap();
        let found = store.find_nodes(&NodeRef::requirement("REQ_0001")).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].uid, saved.uid);
        assert_eq!(found[0].embedding, vec![0.25, -1.5, 3.0e-4]);
        assert_eq!(found[0].property("domain"), Some("segurança"));
        assert_eq!(found[0].kind, EntityKind::Requirement);
    }

    #[tokio::test]
    async fn test_list_nodes_keeps_insertion_order() {
        let store = setup_test_db().await;
        for id in ["C003", "C001", "C002"] {
            store
                .create_node(&NewEntity::concept(id, ConceptFields::new(id)))
                .await
                .unwrap();
        }
        store
            .create_node(&NewEntity::technique("TECH001", TechniqueFields::new("Entrevistas")))
            .await
            .unwrap();

        let ids: Vec<String> = store
            .list_nodes(EntityKind::Concept)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["C003", "C001", "C002"]);
    }

    #[tokio::test]
    async fn test_create_edge_and_deduplicate() {
        let store = setup_test_db().await;
        store
            .create_node(&NewEntity::instruction("INST002", InstructionFields::new("Entrevistar stakeholders")))
            .await
            .unwrap();
        store
            .create_node(&NewEntity::technique("TECH001", TechniqueFields::new("Entrevistas")))
            .await
            .unwrap();

        let request = EdgeRequest::new(
            RelationshipKind::SuggestsTechnique,
            NodeRef::instruction("INST002"),
            NodeRef::technique("TECH001"),
        )
        .unwrap();

        assert!(!store.edge_exists(&request).await.unwrap());
        assert_eq!(
            store.create_edge(&request, EdgePolicy::Deduplicate).await.unwrap(),
            EdgeWrite::Created(1)
        );
        assert_eq!(
            store.create_edge(&request, EdgePolicy::Deduplicate).await.unwrap(),
            EdgeWrite::AlreadyExists
        );
        assert!(store.edge_exists(&request).await.unwrap());
        assert_eq!(store.stats().await.unwrap().edges(RelationshipKind::SuggestsTechnique), 1);
    }

    #[tokio::test]
    async fn test_missing_endpoint() {
        let store = setup_test_db().await;
        store
            .create_node(&NewEntity::requirement("REQ001", RequirementFields::new("login")))
            .await
            .unwrap();

        let request = EdgeRequest::new(
            RelationshipKind::ElicitedBy,
            NodeRef::requirement("REQ001"),
            NodeRef::technique("TECH404"),
        )
        .unwrap();

        let write = store.create_edge(&request, EdgePolicy::Append).await.unwrap();
        assert_eq!(write, EdgeWrite::MissingEndpoint(NodeRef::technique("TECH404")));
    }

    #[tokio::test]
    async fn test_delete_all() {
        let store = setup_test_db().await;

        let empty = store.delete_all().await.unwrap();
        assert_eq!(empty, ResetSummary::default());

        store
            .create_node(&NewEntity::requirement("REQ001", RequirementFields::new("login")))
            .await
            .unwrap();
        store
            .create_node(&NewEntity::concept("C002", ConceptFields::new("Autenticação")))
            .await
            .unwrap();
        let request = EdgeRequest::new(
            RelationshipKind::IsRelatedTo,
            NodeRef::requirement("REQ001"),
            NodeRef::concept("C002"),
        )
        .unwrap();
        store.create_edge(&request, EdgePolicy::Deduplicate).await.unwrap();

        let summary = store.delete_all().await.unwrap();
        assert_eq!(summary.nodes_deleted, 2);
        assert_eq!(summary.edges_deleted, 1);
        assert_eq!(store.stats().await.unwrap().total_nodes(), 0);
    }

    #[tokio::test]
    async fn test_embedding_keeps_full_precision() {
        let store = setup_test_db().await;
        let vector = vec![0.012345678901234567, -0.0023156791032, 0.30000000000000004];
        let entity = NewEntity::requirement("REQ_0001", RequirementFields::new("login"))
            .with_embedding(vector.clone(), "text-embedding-3-small");

        store.create_node(&entity).await.unwrap();
        let found = store.find_nodes(&NodeRef::requirement("REQ_0001")).await.unwrap();

        assert_eq!(found[0].embedding, vector);
    }

    #[tokio::test]
    async fn test_corrupt_timestamp_is_an_error() {
        let store = setup_test_db().await;
        sqlx::query(
            "INSERT INTO graph_nodes (uid, kind, business_id, embedding_model, embedding_ts, created_at)
             VALUES ('n1', 'Concept', 'C001', 'm', 'yesterday', 'yesterday')",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let err = store.find_nodes(&NodeRef::concept("C001")).await.unwrap_err();
        assert!(err.to_string().contains("yesterday"));
    }
}
