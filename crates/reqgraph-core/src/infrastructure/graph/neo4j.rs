//! Neo4j implementation of the GraphStore
//!
//! Labels and property names are interpolated only from the closed
//! [`EntityKind`] / [`RelationshipKind`] vocabularies; every value goes
//! through a query parameter. Each trait call issues auto-committed
//! statements on the shared connection pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{ConfigBuilder, Graph, Query, query};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::domain::graph::{
    EdgePolicy, EdgeRequest, EdgeWrite, EntityKind, GraphNode, GraphStats, GraphStore, NewEntity,
    NodeRef, Properties, RelationshipKind, ResetSummary,
};
use crate::error::{Error, Result};

fn store_error(e: neo4rs::Error) -> Error {
    Error::Other(format!("Neo4j error: {}", e))
}

/// Graph store backed by a Neo4j database
#[derive(Clone)]
pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    /// Open a connection pool from the store configuration
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let password = config.neo4j_password.clone().unwrap_or_default();
        let neo4j_config = ConfigBuilder::default()
            .uri(config.neo4j_uri.as_str())
            .user(config.neo4j_user.as_str())
            .password(password.as_str())
            .db(config.neo4j_database.as_str())
            .build()
            .map_err(|e| Error::Connection(e.to_string()))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        info!(uri = %config.neo4j_uri, database = %config.neo4j_database, "Connected to Neo4j");
        Ok(Self { graph })
    }

    async fn count(&self, q: Query, column: &str) -> Result<u64> {
        let mut stream = self.graph.execute(q).await.map_err(store_error)?;
        let mut total = 0u64;
        while let Some(row) = stream.next().await.map_err(store_error)? {
            total += row.get::<i64>(column).unwrap_or(0) as u64;
        }
        Ok(total)
    }

    async fn count_matches(&self, node: &NodeRef) -> Result<u64> {
        let q = query(&format!(
            "MATCH (n:{} {{{}: $id}}) RETURN count(n) AS matched",
            node.kind.label(),
            node.kind.id_property()
        ))
        .param("id", node.id.as_str());

        self.count(q, "matched").await
    }

    async fn fetch_nodes(&self, q: Query, kind: EntityKind) -> Result<Vec<GraphNode>> {
        let mut stream = self.graph.execute(q).await.map_err(store_error)?;
        let mut nodes = Vec::new();

        while let Some(row) = stream.next().await.map_err(store_error)? {
            let node: neo4rs::Node = row.get("n").map_err(|e| Error::Other(e.to_string()))?;

            let mut properties = Properties::new();
            for key in kind.text_properties() {
                properties.insert(key.to_string(), node.get::<String>(key).unwrap_or_default());
            }
            let embedding: Vec<f64> = node.get("embedding").unwrap_or_default();
            let embedding_ts: String = row.get("embedding_ts").unwrap_or_default();
            let created_at: String = row.get("created_at").unwrap_or_default();

            nodes.push(GraphNode {
                uid: node.get("uid").unwrap_or_default(),
                kind,
                id: node.get(kind.id_property()).unwrap_or_default(),
                properties,
                embedding,
                embedding_model: node.get("embedding_model").unwrap_or_default(),
                embedding_ts: parse_timestamp("embedding_ts", &embedding_ts)?,
                created_at: parse_timestamp("created_at", &created_at)?,
            });
        }

        Ok(nodes)
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    fn backend(&self) -> &'static str {
        "neo4j"
    }

    async fn ping(&self) -> Result<()> {
        self.graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| Error::Connection(e.to_string()))
    }

    async fn create_node(&self, entity: &NewEntity) -> Result<GraphNode> {
        let node = GraphNode::stamp(entity);
        let kind = node.kind;

        let assignments: Vec<String> = kind
            .text_properties()
            .iter()
            .map(|key| format!("{key}: ${key}"))
            .collect();
        let cypher = format!(
            "CREATE (n:{label} {{{id_prop}: $id, uid: $uid, {props}, \
             embedding: $embedding, embedding_model: $embedding_model, \
             embedding_ts: datetime($ts), created_at: datetime($ts)}})",
            label = kind.label(),
            id_prop = kind.id_property(),
            props = assignments.join(", "),
        );

        let mut q = query(&cypher)
            .param("id", node.id.as_str())
            .param("uid", node.uid.as_str())
            .param("embedding", node.embedding.clone())
            .param("embedding_model", node.embedding_model.as_str())
            .param("ts", node.created_at.to_rfc3339());
        for key in kind.text_properties() {
            q = q.param(key, node.property(key).unwrap_or_default());
        }

        self.graph.run(q).await.map_err(store_error)?;
        debug!(kind = %kind, id = %node.id, "Node saved");
        Ok(node)
    }

    async fn find_nodes(&self, node: &NodeRef) -> Result<Vec<GraphNode>> {
        let q = query(&format!(
            "MATCH (n:{} {{{}: $id}}) \
             RETURN n, toString(n.embedding_ts) AS embedding_ts, toString(n.created_at) AS created_at \
             ORDER BY n.created_at",
            node.kind.label(),
            node.kind.id_property()
        ))
        .param("id", node.id.as_str());

        self.fetch_nodes(q, node.kind).await
    }

    async fn list_nodes(&self, kind: EntityKind) -> Result<Vec<GraphNode>> {
        let q = query(&format!(
            "MATCH (n:{}) \
             RETURN n, toString(n.embedding_ts) AS embedding_ts, toString(n.created_at) AS created_at \
             ORDER BY n.created_at",
            kind.label()
        ));

        self.fetch_nodes(q, kind).await
    }

    async fn create_edge(&self, request: &EdgeRequest, policy: EdgePolicy) -> Result<EdgeWrite> {
        if self.count_matches(&request.from).await? == 0 {
            return Ok(EdgeWrite::MissingEndpoint(request.from.clone()));
        }
        if self.count_matches(&request.to).await? == 0 {
            return Ok(EdgeWrite::MissingEndpoint(request.to.clone()));
        }

        let guard = match policy {
            EdgePolicy::Deduplicate => format!("WHERE NOT (a)-[:{}]->(b) ", request.kind.as_str()),
            EdgePolicy::Append => String::new(),
        };
        let q = query(&format!(
            "MATCH (a:{from_label} {{{from_prop}: $from}}) \
             MATCH (b:{to_label} {{{to_prop}: $to}}) \
             {guard}CREATE (a)-[r:{kind} {{created_at: datetime()}}]->(b) \
             RETURN count(r) AS created",
            from_label = request.from.kind.label(),
            from_prop = request.from.kind.id_property(),
            to_label = request.to.kind.label(),
            to_prop = request.to.kind.id_property(),
            kind = request.kind.as_str(),
        ))
        .param("from", request.from.id.as_str())
        .param("to", request.to.id.as_str());

        let created = self.count(q, "created").await?;
        debug!(edge = %request, created, "Edge request applied");

        if created == 0 {
            Ok(EdgeWrite::AlreadyExists)
        } else {
            Ok(EdgeWrite::Created(created))
        }
    }

    async fn edge_exists(&self, request: &EdgeRequest) -> Result<bool> {
        let q = query(&format!(
            "MATCH (a:{} {{{}: $from}})-[r:{}]->(b:{} {{{}: $to}}) RETURN count(r) AS found",
            request.from.kind.label(),
            request.from.kind.id_property(),
            request.kind.as_str(),
            request.to.kind.label(),
            request.to.kind.id_property(),
        ))
        .param("from", request.from.id.as_str())
        .param("to", request.to.id.as_str());

        Ok(self.count(q, "found").await? > 0)
    }

    async fn stats(&self) -> Result<GraphStats> {
        let mut stats = GraphStats::default();

        for kind in EntityKind::all() {
            let q = query(&format!("MATCH (n:{}) RETURN count(n) AS total", kind.label()));
            let total = self.count(q, "total").await?;
            if total > 0 {
                stats.nodes_by_kind.insert(*kind, total);
            }
        }
        for kind in RelationshipKind::all() {
            let q = query(&format!("MATCH ()-[r:{}]->() RETURN count(r) AS total", kind.as_str()));
            let total = self.count(q, "total").await?;
            if total > 0 {
                stats.edges_by_kind.insert(*kind, total);
            }
        }

        Ok(stats)
    }

    async fn delete_all(&self) -> Result<ResetSummary> {
        let edges_deleted = self
            .count(query("MATCH ()-[r]->() RETURN count(r) AS total"), "total")
            .await?;
        let nodes_deleted = self
            .count(query("MATCH (n) RETURN count(n) AS total"), "total")
            .await?;

        self.graph
            .run(query("MATCH (n) DETACH DELETE n"))
            .await
            .map_err(store_error)?;

        info!(nodes = nodes_deleted, edges = edges_deleted, "Graph cleared");
        Ok(ResetSummary {
            nodes_deleted,
            edges_deleted,
        })
    }
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("Invalid {} timestamp {:?}: {}", field, value, e)))
}
