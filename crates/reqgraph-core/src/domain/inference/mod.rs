//! Relationship inference
//!
//! - [`rule`]: predicates, rules and validated rule sets
//! - [`rules`]: the default classification table
//! - [`engine`]: explicit linking and rule evaluation against a store

pub mod engine;
pub mod rule;
pub mod rules;

pub use engine::{InferenceEngine, InferenceReport, LinkFailure, MatchFailure, RuleOutcome};
pub use rule::{CompiledPredicate, EdgeFacts, Predicate, Rule, RuleSet};
pub use rules::default_rules;
