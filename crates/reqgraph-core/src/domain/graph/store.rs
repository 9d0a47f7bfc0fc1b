//! Store trait for graph persistence
//!
//! The trait abstracts over the storage backends (in-memory, SQLite, Neo4j).
//! Every call is one scoped unit of work: implementations acquire and release
//! their connection or lock inside the call.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::entity::{EntityKind, GraphNode, NewEntity, NodeRef};
use super::relationship::{EdgeRequest, RelationshipKind};

/// How edge creation treats an already existing `(from, to, kind)` triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Skip pairs that are already connected by the same kind
    #[default]
    Deduplicate,
    /// Always insert a new edge
    Append,
}

impl EdgePolicy {
    pub fn from_deduplicate(deduplicate: bool) -> Self {
        if deduplicate {
            Self::Deduplicate
        } else {
            Self::Append
        }
    }
}

/// Outcome of an edge creation
///
/// Endpoints are matched by kind and business id, so duplicate nodes fan an
/// edge request out to every matching pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeWrite {
    /// This many edges were inserted
    Created(u64),
    /// Every matching pair was already connected
    AlreadyExists,
    /// No node matched this endpoint
    MissingEndpoint(NodeRef),
}

impl EdgeWrite {
    pub fn created(&self) -> u64 {
        match self {
            Self::Created(n) => *n,
            _ => 0,
        }
    }
}

/// Node and edge counts per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes_by_kind: BTreeMap<EntityKind, u64>,
    pub edges_by_kind: BTreeMap<RelationshipKind, u64>,
}

impl GraphStats {
    pub fn total_nodes(&self) -> u64 {
        self.nodes_by_kind.values().sum()
    }

    pub fn total_edges(&self) -> u64 {
        self.edges_by_kind.values().sum()
    }

    pub fn nodes(&self, kind: EntityKind) -> u64 {
        self.nodes_by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn edges(&self, kind: RelationshipKind) -> u64 {
        self.edges_by_kind.get(&kind).copied().unwrap_or(0)
    }
}

/// Counts removed by a reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    pub nodes_deleted: u64,
    pub edges_deleted: u64,
}

/// Store trait for graph persistence
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Short backend name for logs and reports
    fn backend(&self) -> &'static str;

    /// Verify the store is reachable
    async fn ping(&self) -> Result<()>;

    /// Insert a node; duplicate business ids are not rejected
    async fn create_node(&self, entity: &NewEntity) -> Result<GraphNode>;

    /// All nodes matching a kind and business id, in insertion order
    async fn find_nodes(&self, node: &NodeRef) -> Result<Vec<GraphNode>>;

    /// All nodes of a kind, in insertion order
    async fn list_nodes(&self, kind: EntityKind) -> Result<Vec<GraphNode>>;

    /// Connect every node matching `request.from` to every node matching `request.to`
    async fn create_edge(&self, request: &EdgeRequest, policy: EdgePolicy) -> Result<EdgeWrite>;

    /// Whether any matching pair is connected by the requested kind
    async fn edge_exists(&self, request: &EdgeRequest) -> Result<bool>;

    /// Count nodes and edges per kind
    async fn stats(&self) -> Result<GraphStats>;

    /// Detach-delete every node and edge
    async fn delete_all(&self) -> Result<ResetSummary>;

    /// Release backend resources
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
