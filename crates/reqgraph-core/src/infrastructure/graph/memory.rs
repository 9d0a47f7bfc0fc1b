//! In-memory graph store
//!
//! Holds nodes and edges in insertion order behind a `tokio::sync::RwLock`.
//! The lock guard is the unit of work: each call takes it and drops it
//! before returning.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::graph::{
    EdgePolicy, EdgeRequest, EdgeWrite, EntityKind, GraphEdge, GraphNode, GraphStats, GraphStore,
    NewEntity, NodeRef, ResetSummary,
};
use crate::error::Result;

#[derive(Debug, Default)]
struct MemoryGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl MemoryGraph {
    fn matching_uids(&self, node: &NodeRef) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.matches(node))
            .map(|n| n.uid.clone())
            .collect()
    }

    fn connected(&self, request: &EdgeRequest, source_uid: &str, target_uid: &str) -> bool {
        self.edges.iter().any(|e| {
            e.kind == request.kind && e.source_uid == source_uid && e.target_uid == target_uid
        })
    }
}

/// Graph store kept entirely in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphStore {
    graph: Arc<RwLock<MemoryGraph>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored edge
    pub async fn edges(&self) -> Vec<GraphEdge> {
        self.graph.read().await.edges.clone()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn create_node(&self, entity: &NewEntity) -> Result<GraphNode> {
        let node = GraphNode::stamp(entity);
        self.graph.write().await.nodes.push(node.clone());
        Ok(node)
    }

    async fn find_nodes(&self, node: &NodeRef) -> Result<Vec<GraphNode>> {
        let graph = self.graph.read().await;
        Ok(graph.nodes.iter().filter(|n| n.matches(node)).cloned().collect())
    }

    async fn list_nodes(&self, kind: EntityKind) -> Result<Vec<GraphNode>> {
        let graph = self.graph.read().await;
        Ok(graph.nodes.iter().filter(|n| n.kind == kind).cloned().collect())
    }

    async fn create_edge(&self, request: &EdgeRequest, policy: EdgePolicy) -> Result<EdgeWrite> {
        let mut graph = self.graph.write().await;

        let sources = graph.matching_uids(&request.from);
        if sources.is_empty() {
            return Ok(EdgeWrite::MissingEndpoint(request.from.clone()));
        }
        let targets = graph.matching_uids(&request.to);
        if targets.is_empty() {
            return Ok(EdgeWrite::MissingEndpoint(request.to.clone()));
        }

        let mut created = 0u64;
        for source_uid in &sources {
            for target_uid in &targets {
                if policy == EdgePolicy::Deduplicate && graph.connected(request, source_uid, target_uid) {
                    continue;
                }
                graph.edges.push(GraphEdge {
                    uid: Uuid::new_v4().to_string(),
                    kind: request.kind,
                    source_uid: source_uid.clone(),
                    target_uid: target_uid.clone(),
                    created_at: Utc::now(),
                });
                created += 1;
            }
        }

        if created == 0 {
            Ok(EdgeWrite::AlreadyExists)
        } else {
            Ok(EdgeWrite::Created(created))
        }
    }

    async fn edge_exists(&self, request: &EdgeRequest) -> Result<bool> {
        let graph = self.graph.read().await;
        let sources = graph.matching_uids(&request.from);
        let targets = graph.matching_uids(&request.to);

        Ok(sources
            .iter()
            .any(|s| targets.iter().any(|t| graph.connected(request, s, t))))
    }

    async fn stats(&self) -> Result<GraphStats> {
        let graph = self.graph.read().await;
        let mut stats = GraphStats::default();

        for node in &graph.nodes {
            *stats.nodes_by_kind.entry(node.kind).or_insert(0) += 1;
        }
        for edge in &graph.edges {
            *stats.edges_by_kind.entry(edge.kind).or_insert(0) += 1;
        }

        Ok(stats)
    }

    async fn delete_all(&self) -> Result<ResetSummary> {
        let mut graph = self.graph.write().await;
        let summary = ResetSummary {
            nodes_deleted: graph.nodes.len() as u64,
            edges_deleted: graph.edges.len() as u64,
        };
        graph.nodes.clear();
        graph.edges.clear();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{ConceptFields, RelationshipKind, RequirementFields, TechniqueFields};

    async fn seeded_store() -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new();
        store
            .create_node(&NewEntity::requirement("REQ001", RequirementFields::new("login")))
            .await
            .unwrap();
        store
            .create_node(&NewEntity::technique("TECH001", TechniqueFields::new("Entrevistas")))
            .await
            .unwrap();
        store
            .create_node(&NewEntity::concept("C002", ConceptFields::new("Autenticação")))
            .await
            .unwrap();
        store
    }

    fn uses_interviews() -> EdgeRequest {
        EdgeRequest::new(
            RelationshipKind::UsesTechnique,
            NodeRef::requirement("REQ001"),
            NodeRef::technique("TECH001"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_edge_between_existing_nodes() {
        let store = seeded_store().await;

        let write = store.create_edge(&uses_interviews(), EdgePolicy::Deduplicate).await.unwrap();
        assert_eq!(write, EdgeWrite::Created(1));
        assert!(store.edge_exists(&uses_interviews()).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_endpoint_creates_nothing() {
        let store = seeded_store().await;
        let request = EdgeRequest::new(
            RelationshipKind::UsesTechnique,
            NodeRef::requirement("REQ001"),
            NodeRef::technique("TECH999"),
        )
        .unwrap();

        let write = store.create_edge(&request, EdgePolicy::Deduplicate).await.unwrap();
        assert_eq!(write, EdgeWrite::MissingEndpoint(NodeRef::technique("TECH999")));
        assert_eq!(store.stats().await.unwrap().total_edges(), 0);
    }

    #[tokio::test]
    async fn test_deduplicate_versus_append() {
        let store = seeded_store().await;
        let request = uses_interviews();

        store.create_edge(&request, EdgePolicy::Deduplicate).await.unwrap();
        let again = store.create_edge(&request, EdgePolicy::Deduplicate).await.unwrap();
        assert_eq!(again, EdgeWrite::AlreadyExists);
        assert_eq!(store.edges().await.len(), 1);

        let appended = store.create_edge(&request, EdgePolicy::Append).await.unwrap();
        assert_eq!(appended, EdgeWrite::Created(1));
        assert_eq!(store.edges().await.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_nodes_fan_out_edges() {
        let store = seeded_store().await;
        store
            .create_node(&NewEntity::requirement("REQ001", RequirementFields::new("duplicate")))
            .await
            .unwrap();

        assert_eq!(store.find_nodes(&NodeRef::requirement("REQ001")).await.unwrap().len(), 2);
        let write = store.create_edge(&uses_interviews(), EdgePolicy::Append).await.unwrap();
        assert_eq!(write, EdgeWrite::Created(2));
    }

    #[tokio::test]
    async fn test_delete_all_reports_counts() {
        let store = seeded_store().await;
        store.create_edge(&uses_interviews(), EdgePolicy::Deduplicate).await.unwrap();

        let summary = store.delete_all().await.unwrap();
        assert_eq!(summary.nodes_deleted, 3);
        assert_eq!(summary.edges_deleted, 1);

        let empty = store.delete_all().await.unwrap();
        assert_eq!(empty, ResetSummary::default());
        assert_eq!(store.stats().await.unwrap(), GraphStats::default());
    }
}
