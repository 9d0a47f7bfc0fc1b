//! Inference rules and rule sets
//!
//! A [`Rule`] maps a predicate over nodes of one entity kind to an edge
//! towards a fixed target. A [`RuleSet`] validates a table of rules and fixes
//! their evaluation order.

use std::collections::{BTreeSet, HashMap, HashSet};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::domain::graph::{EntityKind, GraphNode, NodeRef, RelationshipKind};
use crate::error::{Error, Result};

/// Condition evaluated against each source node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Case-insensitive regex match on any of the listed text properties
    TextMatches { fields: Vec<String>, pattern: String },
    /// The source node already has this edge
    HasEdge {
        relationship: RelationshipKind,
        target: NodeRef,
    },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn text(fields: &[&str], pattern: impl Into<String>) -> Self {
        Self::TextMatches {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            pattern: pattern.into(),
        }
    }

    pub fn has_edge(relationship: RelationshipKind, target: NodeRef) -> Self {
        Self::HasEdge {
            relationship,
            target,
        }
    }

    /// Compile every pattern; fails on the first invalid regex
    pub fn compile(&self) -> Result<CompiledPredicate> {
        Ok(match self {
            Self::TextMatches { fields, pattern } => CompiledPredicate::Text {
                fields: fields.clone(),
                regex: RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::InvalidInput(format!("bad pattern {:?}: {}", pattern, e)))?,
            },
            Self::HasEdge {
                relationship,
                target,
            } => CompiledPredicate::Edge {
                relationship: *relationship,
                target: target.clone(),
            },
            Self::All(parts) => {
                CompiledPredicate::All(parts.iter().map(Predicate::compile).collect::<Result<_>>()?)
            }
            Self::Any(parts) => {
                CompiledPredicate::Any(parts.iter().map(Predicate::compile).collect::<Result<_>>()?)
            }
        })
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Predicate)) {
        f(self);
        if let Self::All(parts) | Self::Any(parts) = self {
            for part in parts {
                part.visit(f);
            }
        }
    }
}

/// A predicate with its patterns compiled
#[derive(Debug, Clone)]
pub enum CompiledPredicate {
    Text { fields: Vec<String>, regex: Regex },
    Edge {
        relationship: RelationshipKind,
        target: NodeRef,
    },
    All(Vec<CompiledPredicate>),
    Any(Vec<CompiledPredicate>),
}

/// Edge facts known for the node under evaluation
pub trait EdgeFacts {
    fn has_edge(&self, node: &GraphNode, relationship: RelationshipKind, target: &NodeRef) -> bool;
}

impl CompiledPredicate {
    /// Every `(relationship, target)` pair the predicate asks about
    pub fn edge_queries(&self) -> Vec<(RelationshipKind, NodeRef)> {
        let mut out = Vec::new();
        self.collect_edges(&mut out);
        out
    }

    fn collect_edges(&self, out: &mut Vec<(RelationshipKind, NodeRef)>) {
        match self {
            Self::Text { .. } => {}
            Self::Edge {
                relationship,
                target,
            } => {
                if !out.iter().any(|(r, t)| r == relationship && t == target) {
                    out.push((*relationship, target.clone()));
                }
            }
            Self::All(parts) | Self::Any(parts) => {
                for part in parts {
                    part.collect_edges(out);
                }
            }
        }
    }

    pub fn evaluate(&self, node: &GraphNode, facts: &dyn EdgeFacts) -> bool {
        match self {
            Self::Text { fields, regex } => fields
                .iter()
                .filter_map(|field| node.property(field))
                .any(|value| regex.is_match(value)),
            Self::Edge {
                relationship,
                target,
            } => facts.has_edge(node, *relationship, target),
            Self::All(parts) => parts.iter().all(|p| p.evaluate(node, facts)),
            Self::Any(parts) => parts.iter().any(|p| p.evaluate(node, facts)),
        }
    }
}

/// One inference rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub description: String,
    /// Kind of the nodes the predicate is evaluated on
    pub source: EntityKind,
    pub predicate: Predicate,
    pub relationship: RelationshipKind,
    pub target: NodeRef,
    /// Rules that must run before this one
    pub depends_on: Vec<String>,
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        source: EntityKind,
        predicate: Predicate,
        relationship: RelationshipKind,
        target: NodeRef,
    ) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            source,
            predicate,
            relationship,
            target,
            depends_on: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn depends_on(mut self, rule_id: impl Into<String>) -> Self {
        self.depends_on.push(rule_id.into());
        self
    }

    fn check(&self) -> std::result::Result<(), String> {
        if !self.relationship.allows(self.source, self.target.kind) {
            return Err(format!(
                "rule '{}': {} cannot connect {} to {}",
                self.id, self.relationship, self.source, self.target.kind
            ));
        }

        let mut problem = None;
        self.predicate.visit(&mut |p| {
            if problem.is_some() {
                return;
            }
            match p {
                Predicate::TextMatches { fields, .. } => {
                    if fields.is_empty() {
                        problem = Some(format!("rule '{}': text predicate without fields", self.id));
                    } else if let Some(unknown) = fields
                        .iter()
                        .find(|f| !self.source.text_properties().contains(&f.as_str()))
                    {
                        problem = Some(format!(
                            "rule '{}': {} has no text property '{}'",
                            self.id, self.source, unknown
                        ));
                    }
                }
                Predicate::HasEdge {
                    relationship,
                    target,
                } if !relationship.allows(self.source, target.kind) => {
                    problem = Some(format!(
                        "rule '{}': a {} node cannot have {} to {}",
                        self.id, self.source, relationship, target.kind
                    ));
                }
                _ => {}
            }
        });

        problem.map_or(Ok(()), Err)
    }
}

/// A validated, ordered table of rules
///
/// Rules run in topological order of `depends_on`; independent rules keep
/// their declaration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        let mut position: HashMap<&str, usize> = HashMap::new();
        for (i, rule) in rules.iter().enumerate() {
            if position.insert(rule.id.as_str(), i).is_some() {
                return Err(Error::InvalidRuleSet(format!("duplicate rule id '{}'", rule.id)));
            }
        }

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); rules.len()];
        let mut in_degree = vec![0usize; rules.len()];
        for (i, rule) in rules.iter().enumerate() {
            rule.check().map_err(Error::InvalidRuleSet)?;

            let mut seen = HashSet::new();
            for dep in &rule.depends_on {
                let Some(&d) = position.get(dep.as_str()) else {
                    return Err(Error::InvalidRuleSet(format!(
                        "rule '{}' depends on unknown rule '{}'",
                        rule.id, dep
                    )));
                };
                if seen.insert(d) {
                    dependents[d].push(i);
                    in_degree[i] += 1;
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..rules.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(rules.len());
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &next in &dependents[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() < rules.len() {
            let stuck: Vec<&str> = (0..rules.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| rules[i].id.as_str())
                .collect();
            return Err(Error::InvalidRuleSet(format!(
                "dependency cycle among rules: {}",
                stuck.join(", ")
            )));
        }

        let mut slots: Vec<Option<Rule>> = rules.into_iter().map(Some).collect();
        let rules = order.into_iter().filter_map(|i| slots[i].take()).collect();
        Ok(Self { rules })
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every fixed target the rules point at, including edge predicates
    pub fn targets(&self) -> Vec<NodeRef> {
        let mut out: Vec<NodeRef> = Vec::new();
        for rule in &self.rules {
            let mut push = |node: &NodeRef| {
                if !out.contains(node) {
                    out.push(node.clone());
                }
            };
            push(&rule.target);
            rule.predicate.visit(&mut |p| {
                if let Predicate::HasEdge { target, .. } = p {
                    push(target);
                }
            });
        }
        out
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
