//! Relationship inference engine
//!
//! Two modes share one report: explicit links between named nodes, and rule
//! evaluation over the current node set. Missing endpoints and failing rules
//! are counted, never propagated. Only fatal store errors escape.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::graph::{
    EdgePolicy, EdgeRequest, EdgeWrite, GraphNode, GraphStore, NodeRef, RelationshipKind,
};
use crate::error::{Error, Result};

use super::rule::{CompiledPredicate, EdgeFacts, Rule, RuleSet};

/// Per-rule outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub matches: usize,
    pub edges_created: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A link that could not be made because an endpoint does not exist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchFailure {
    pub request: String,
    pub missing: NodeRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

/// An explicit link the store rejected with a recoverable error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkFailure {
    pub kind: RelationshipKind,
    pub from: NodeRef,
    pub to: NodeRef,
    pub error: String,
}

/// Counters for one inference pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InferenceReport {
    pub rules_attempted: usize,
    /// Rules that ran to completion, whether or not anything matched
    pub rules_applied: usize,
    pub rules_failed: usize,
    pub rules: Vec<RuleOutcome>,
    pub explicit_links: usize,
    pub edges_by_kind: BTreeMap<RelationshipKind, u64>,
    pub match_failures: Vec<MatchFailure>,
    pub link_failures: Vec<LinkFailure>,
}

impl InferenceReport {
    pub fn total_edges(&self) -> u64 {
        self.edges_by_kind.values().sum()
    }

    pub fn match_failure_count(&self) -> usize {
        self.match_failures.len()
    }

    pub fn outcome(&self, rule_id: &str) -> Option<&RuleOutcome> {
        self.rules.iter().find(|o| o.rule == rule_id)
    }

    fn record_write(&mut self, request: &EdgeRequest, write: &EdgeWrite, rule: Option<&str>) {
        match write {
            EdgeWrite::Created(n) => {
                *self.edges_by_kind.entry(request.kind).or_insert(0) += n;
            }
            EdgeWrite::AlreadyExists => {}
            EdgeWrite::MissingEndpoint(missing) => {
                warn!(edge = %request, missing = %missing, "No node to match, edge skipped");
                self.match_failures.push(MatchFailure {
                    request: request.to_string(),
                    missing: missing.clone(),
                    rule: rule.map(str::to_string),
                });
            }
        }
    }
}

/// Edge facts prefetched from the store for one rule run
struct PrefetchedEdges(HashSet<(String, RelationshipKind, NodeRef)>);

impl EdgeFacts for PrefetchedEdges {
    fn has_edge(&self, node: &GraphNode, relationship: RelationshipKind, target: &NodeRef) -> bool {
        self.0.contains(&(node.id.clone(), relationship, target.clone()))
    }
}

/// Relationship inference over a graph store
pub struct InferenceEngine<'a> {
    store: &'a dyn GraphStore,
    policy: EdgePolicy,
    report: InferenceReport,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self {
            store,
            policy: EdgePolicy::default(),
            report: InferenceReport::default(),
        }
    }

    pub fn with_policy(mut self, policy: EdgePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn report(&self) -> &InferenceReport {
        &self.report
    }

    pub fn into_report(self) -> InferenceReport {
        self.report
    }

    /// Connect two named nodes if both exist
    ///
    /// A missing endpoint is recorded as a match failure and returned as
    /// [`EdgeWrite::MissingEndpoint`]; it is not an error.
    pub async fn link(&mut self, request: &EdgeRequest) -> Result<EdgeWrite> {
        let write = self.store.create_edge(request, self.policy).await?;
        debug!(edge = %request, outcome = ?write, "Explicit link");

        if write.created() > 0 {
            self.report.explicit_links += 1;
        }
        self.report.record_write(request, &write, None);
        Ok(write)
    }

    /// Link every request in order, stopping only on fatal errors
    ///
    /// Recoverable store errors are kept in [`InferenceReport::link_failures`].
    pub async fn link_all(&mut self, requests: &[EdgeRequest]) -> Result<()> {
        for request in requests {
            if let Err(e) = self.link(request).await {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(edge = %request, error = %e, "Explicit link failed");
                self.report.link_failures.push(LinkFailure {
                    kind: request.kind,
                    from: request.from.clone(),
                    to: request.to.clone(),
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run a whole rule set in its evaluation order
    pub async fn run_rules(&mut self, rules: &RuleSet) -> Result<()> {
        info!(rules = rules.len(), "Running inference rules");

        for rule in rules {
            self.run_rule(rule).await?;
        }

        info!(
            applied = self.report.rules_applied,
            failed = self.report.rules_failed,
            edges = self.report.total_edges(),
            match_failures = self.report.match_failure_count(),
            "Inference finished"
        );
        Ok(())
    }

    /// Run a single rule over the current nodes of its source kind
    ///
    /// Returns `Err` only for fatal store errors. Anything else fails this
    /// rule alone and is recorded in the report.
    pub async fn run_rule(&mut self, rule: &Rule) -> Result<()> {
        self.report.rules_attempted += 1;
        let mut outcome = RuleOutcome {
            rule: rule.id.clone(),
            ..Default::default()
        };

        match self.evaluate(rule, &mut outcome).await {
            Ok(()) => {
                self.report.rules_applied += 1;
                debug!(
                    rule = %rule.id,
                    matches = outcome.matches,
                    edges = outcome.edges_created,
                    "Rule applied"
                );
            }
            Err(e) if e.is_fatal() => {
                self.report.rules_failed += 1;
                outcome.error = Some(e.to_string());
                self.report.rules.push(outcome);
                return Err(e);
            }
            Err(e) => {
                let failure = Error::RuleExecution {
                    rule: rule.id.clone(),
                    reason: e.to_string(),
                };
                warn!(rule = %rule.id, error = %failure, "Rule failed, continuing");
                self.report.rules_failed += 1;
                outcome.error = Some(failure.to_string());
            }
        }

        self.report.rules.push(outcome);
        Ok(())
    }

    async fn evaluate(&mut self, rule: &Rule, outcome: &mut RuleOutcome) -> Result<()> {
        let predicate: CompiledPredicate = rule.predicate.compile()?;
        let nodes = self.store.list_nodes(rule.source).await?;
        let facts = self.prefetch(&predicate, &nodes).await?;

        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.id.as_str()) || !predicate.evaluate(node, &facts) {
                continue;
            }
            outcome.matches += 1;

            let request = EdgeRequest {
                kind: rule.relationship,
                from: node.node_ref(),
                to: rule.target.clone(),
            };
            let write = self.store.create_edge(&request, self.policy).await?;
            outcome.edges_created += write.created();
            self.report.record_write(&request, &write, Some(&rule.id));
        }

        Ok(())
    }

    async fn prefetch(
        &self,
        predicate: &CompiledPredicate,
        nodes: &[GraphNode],
    ) -> Result<PrefetchedEdges> {
        let mut facts = HashSet::new();

        for (relationship, target) in predicate.edge_queries() {
            for node in nodes {
                let request = EdgeRequest {
                    kind: relationship,
                    from: node.node_ref(),
                    to: target.clone(),
                };
                if self.store.edge_exists(&request).await? {
                    facts.insert((node.id.clone(), relationship, target.clone()));
                }
            }
        }

        Ok(PrefetchedEdges(facts))
    }
}
