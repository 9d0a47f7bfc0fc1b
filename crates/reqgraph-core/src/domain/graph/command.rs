//! Typed graph commands
//!
//! Creation requests are plain values dispatched to a [`GraphStore`]. Nothing
//! here builds query text; each adapter translates commands itself.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

use super::entity::{GraphNode, NewEntity};
use super::relationship::EdgeRequest;
use super::store::{EdgePolicy, EdgeWrite, GraphStore};

/// A write against the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum GraphCommand {
    CreateEntity(NewEntity),
    CreateEdge(EdgeRequest),
}

/// Result of applying a [`GraphCommand`]
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Node(GraphNode),
    Edge(EdgeWrite),
}

impl From<NewEntity> for GraphCommand {
    fn from(entity: NewEntity) -> Self {
        Self::CreateEntity(entity)
    }
}

impl From<EdgeRequest> for GraphCommand {
    fn from(request: EdgeRequest) -> Self {
        Self::CreateEdge(request)
    }
}

/// Dispatch a command to the store
pub async fn apply_command(
    store: &dyn GraphStore,
    command: &GraphCommand,
    policy: EdgePolicy,
) -> Result<CommandOutcome> {
    match command {
        GraphCommand::CreateEntity(entity) => {
            let node = store.create_node(entity).await?;
            debug!(kind = %node.kind, id = %node.id, "Created node");
            Ok(CommandOutcome::Node(node))
        }
        GraphCommand::CreateEdge(request) => {
            let write = store.create_edge(request, policy).await?;
            debug!(edge = %request, outcome = ?write, "Applied edge request");
            Ok(CommandOutcome::Edge(write))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{NodeRef, RelationshipKind, TechniqueFields};
    use crate::infrastructure::graph::InMemoryGraphStore;

    #[tokio::test]
    async fn test_apply_commands_in_order() {
        let store = InMemoryGraphStore::new();
        let policy = EdgePolicy::default();

        let technique: GraphCommand =
            NewEntity::technique("TECH001", TechniqueFields::new("Entrevistas")).into();
        let CommandOutcome::Node(node) = apply_command(&store, &technique, policy).await.unwrap() else {
            panic!("expected a node");
        };
        assert_eq!(node.id, "TECH001");
        assert_eq!(node.property("name"), Some("Entrevistas"));

        let edge: GraphCommand = EdgeRequest::new(
            RelationshipKind::UsesTechnique,
            NodeRef::requirement("REQ001"),
            NodeRef::technique("TECH001"),
        )
        .unwrap()
        .into();
        let outcome = apply_command(&store, &edge, policy).await.unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Edge(EdgeWrite::MissingEndpoint(NodeRef::requirement("REQ001")))
        );
    }

    #[test]
    fn test_command_serializes_with_tag() {
        let command = GraphCommand::from(
            EdgeRequest::new(
                RelationshipKind::RefersTo,
                NodeRef::instruction("INST001"),
                NodeRef::concept("C001"),
            )
            .unwrap(),
        );
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["command"], "create_edge");
    }
}
