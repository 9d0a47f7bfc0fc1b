//! Entity types for the requirements knowledge graph
//!
//! Four entity kinds exist. Each is identified by a business identifier held
//! in a kind-specific property (`req_id`, `tech_id`, `instr_id`,
//! `concept_id`). Nodes are write-once: there are no update operations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DEFAULT_EMBEDDING_MODEL;

/// Text attributes of a stored node, keyed by property name
pub type Properties = BTreeMap<String, String>;

/// Kinds of entities in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A requirement, usually one dataset row
    Requirement,
    /// An elicitation/specification/validation technique
    Technique,
    /// A guideline from the literature
    Instruction,
    /// A requirements-engineering concept
    Concept,
}

impl EntityKind {
    /// Graph label of this kind
    pub fn label(&self) -> &'static str {
        match self {
            Self::Requirement => "Requirement",
            Self::Technique => "Technique",
            Self::Instruction => "Instruction",
            Self::Concept => "Concept",
        }
    }

    /// Property holding the business identifier
    pub fn id_property(&self) -> &'static str {
        match self {
            Self::Requirement => "req_id",
            Self::Technique => "tech_id",
            Self::Instruction => "instr_id",
            Self::Concept => "concept_id",
        }
    }

    /// Text properties carried by nodes of this kind
    pub fn text_properties(&self) -> &'static [&'static str] {
        match self {
            Self::Requirement => &["text", "summary", "type", "source", "domain"],
            Self::Technique => &["name", "description", "category", "source"],
            Self::Instruction => &["text", "context", "source"],
            Self::Concept => &["name", "definition", "source"],
        }
    }

    /// Parse from a label (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "requirement" | "req" => Some(Self::Requirement),
            "technique" | "tech" => Some(Self::Technique),
            "instruction" | "instr" => Some(Self::Instruction),
            "concept" => Some(Self::Concept),
            _ => None,
        }
    }

    /// Get all entity kinds
    pub fn all() -> &'static [EntityKind] {
        &[
            Self::Requirement,
            Self::Technique,
            Self::Instruction,
            Self::Concept,
        ]
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Reference to a node by kind and business identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub kind: EntityKind,
    pub id: String,
}

impl NodeRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn requirement(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Requirement, id)
    }

    pub fn technique(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Technique, id)
    }

    pub fn instruction(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Instruction, id)
    }

    pub fn concept(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Concept, id)
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind, self.id)
    }
}

/// Attributes of a Requirement node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementFields {
    pub text: String,
    pub summary: String,
    pub requirement_type: String,
    pub source: String,
    pub domain: String,
}

impl RequirementFields {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_type(mut self, requirement_type: impl Into<String>) -> Self {
        self.requirement_type = requirement_type.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }
}

/// Attributes of a Technique node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechniqueFields {
    pub name: String,
    pub description: String,
    pub category: String,
    pub source: String,
}

impl TechniqueFields {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Attributes of an Instruction node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionFields {
    pub text: String,
    pub context: String,
    pub source: String,
}

impl InstructionFields {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Attributes of a Concept node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptFields {
    pub name: String,
    pub definition: String,
    pub source: String,
}

impl ConceptFields {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = definition.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Kind-specific attributes of a node to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EntityFields {
    Requirement(RequirementFields),
    Technique(TechniqueFields),
    Instruction(InstructionFields),
    Concept(ConceptFields),
}

impl EntityFields {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Requirement(_) => EntityKind::Requirement,
            Self::Technique(_) => EntityKind::Technique,
            Self::Instruction(_) => EntityKind::Instruction,
            Self::Concept(_) => EntityKind::Concept,
        }
    }

    /// Flatten into the property map persisted on the node
    pub fn properties(&self) -> Properties {
        let pairs: Vec<(&str, &str)> = match self {
            Self::Requirement(f) => vec![
                ("text", &f.text),
                ("summary", &f.summary),
                ("type", &f.requirement_type),
                ("source", &f.source),
                ("domain", &f.domain),
            ],
            Self::Technique(f) => vec![
                ("name", &f.name),
                ("description", &f.description),
                ("category", &f.category),
                ("source", &f.source),
            ],
            Self::Instruction(f) => vec![
                ("text", &f.text),
                ("context", &f.context),
                ("source", &f.source),
            ],
            Self::Concept(f) => vec![
                ("name", &f.name),
                ("definition", &f.definition),
                ("source", &f.source),
            ],
        };

        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl From<RequirementFields> for EntityFields {
    fn from(fields: RequirementFields) -> Self {
        Self::Requirement(fields)
    }
}

impl From<TechniqueFields> for EntityFields {
    fn from(fields: TechniqueFields) -> Self {
        Self::Technique(fields)
    }
}

impl From<InstructionFields> for EntityFields {
    fn from(fields: InstructionFields) -> Self {
        Self::Instruction(fields)
    }
}

impl From<ConceptFields> for EntityFields {
    fn from(fields: ConceptFields) -> Self {
        Self::Concept(fields)
    }
}

/// A node-creation command
///
/// The embedding defaults to an empty vector and is never absent in the
/// persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    pub id: String,
    pub fields: EntityFields,
    pub embedding: Vec<f64>,
    pub embedding_model: String,
}

impl NewEntity {
    /// Create a new entity command
    pub fn new(id: impl Into<String>, fields: impl Into<EntityFields>) -> Self {
        Self {
            id: id.into(),
            fields: fields.into(),
            embedding: Vec::new(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    pub fn requirement(id: impl Into<String>, fields: RequirementFields) -> Self {
        Self::new(id, fields)
    }

    pub fn technique(id: impl Into<String>, fields: TechniqueFields) -> Self {
        Self::new(id, fields)
    }

    pub fn instruction(id: impl Into<String>, fields: InstructionFields) -> Self {
        Self::new(id, fields)
    }

    pub fn concept(id: impl Into<String>, fields: ConceptFields) -> Self {
        Self::new(id, fields)
    }

    /// Set the embedding vector and the model that produced it
    pub fn with_embedding(mut self, embedding: Vec<f64>, model: impl Into<String>) -> Self {
        self.embedding = embedding;
        self.embedding_model = model.into();
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.fields.kind()
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.kind(), self.id.clone())
    }
}

/// A node as persisted by a graph store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Store-internal identity; distinct even for duplicate business ids
    pub uid: String,
    pub kind: EntityKind,
    /// Business identifier
    pub id: String,
    pub properties: Properties,
    pub embedding: Vec<f64>,
    pub embedding_model: String,
    pub embedding_ts: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl GraphNode {
    /// Stamp a creation command with a fresh uid and insert timestamps
    pub fn stamp(entity: &NewEntity) -> Self {
        let now = Utc::now();

        Self {
            uid: Uuid::new_v4().to_string(),
            kind: entity.kind(),
            id: entity.id.clone(),
            properties: entity.fields.properties(),
            embedding: entity.embedding.clone(),
            embedding_model: entity.embedding_model.clone(),
            embedding_ts: now,
            created_at: now,
        }
    }

    /// Look up a text property
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.kind, self.id.clone())
    }

    pub fn matches(&self, node: &NodeRef) -> bool {
        self.kind == node.kind && self.id == node.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_defaults() {
        let entity =
            NewEntity::requirement("REQ_0001", RequirementFields::new("O sistema deve permitir login"));

        assert_eq!(entity.kind(), EntityKind::Requirement);
        assert!(entity.embedding.is_empty());
        assert_eq!(entity.embedding_model, DEFAULT_EMBEDDING_MODEL);

        let props = entity.fields.properties();
        assert_eq!(props.get("text").unwrap(), "O sistema deve permitir login");
        assert_eq!(props.get("type").unwrap(), "");
        assert_eq!(props.get("summary").unwrap(), "");
    }

    #[test]
    fn test_properties_follow_kind_schema() {
        let samples: Vec<EntityFields> = vec![
            RequirementFields::new("t").into(),
            TechniqueFields::new("Entrevistas").with_category("Elicitação").into(),
            InstructionFields::new("Validar requisitos").with_context("Validação").into(),
            ConceptFields::new("Stakeholder").with_definition("d").into(),
        ];

        for fields in samples {
            let props = fields.properties();
            let keys: Vec<&str> = props.keys().map(String::as_str).collect();
            let mut expected: Vec<&str> = fields.kind().text_properties().to_vec();
            expected.sort();
            assert_eq!(keys, expected, "schema mismatch for {}", fields.kind());
        }
    }

    #[test]
    fn test_stamp_assigns_distinct_uids() {
        let entity = NewEntity::concept("C001", ConceptFields::new("Requisito Funcional"))
            .with_embedding(vec![0.311, -0.244, 0.665], "custom-model");

        let a = GraphNode::stamp(&entity);
        let b = GraphNode::stamp(&entity);

        assert_ne!(a.uid, b.uid);
        assert_eq!(a.id, b.id);
        assert_eq!(a.embedding, vec![0.311, -0.244, 0.665]);
        assert_eq!(a.embedding_model, "custom-model");
        assert_eq!(a.property("name"), Some("Requisito Funcional"));
        assert!(a.matches(&NodeRef::concept("C001")));
        assert!(!a.matches(&NodeRef::technique("C001")));
    }

    #[test]
    fn test_entity_kind_parsing() {
        assert_eq!(EntityKind::parse("requirement"), Some(EntityKind::Requirement));
        assert_eq!(EntityKind::parse("TECH"), Some(EntityKind::Technique));
        assert_eq!(EntityKind::parse("Concept"), Some(EntityKind::Concept));
        assert_eq!(EntityKind::parse("stakeholder"), None);
        assert_eq!(EntityKind::Instruction.id_property(), "instr_id");
    }

    #[test]
    fn test_node_ref_display() {
        assert_eq!(NodeRef::technique("TECH001").to_string(), "Technique(TECH001)");
    }
}
