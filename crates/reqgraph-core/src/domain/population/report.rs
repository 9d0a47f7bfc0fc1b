//! Population stages and the end-of-run report

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::graph::{EntityKind, GraphStats, RelationshipKind, ResetSummary};
use crate::domain::inference::InferenceReport;
use crate::domain::ingest::ReadStats;
use crate::error::Error;

/// Lifecycle of a population run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationStage {
    #[default]
    Idle,
    Connected,
    Cleared,
    EntitiesSeeded,
    RequirementsLoaded,
    RelationshipsInferred,
    Reported,
    Closed,
}

impl PopulationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connected => "connected",
            Self::Cleared => "cleared",
            Self::EntitiesSeeded => "entities_seeded",
            Self::RequirementsLoaded => "requirements_loaded",
            Self::RelationshipsInferred => "relationships_inferred",
            Self::Reported => "reported",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for PopulationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary of one population run
#[derive(Debug, Clone, Serialize)]
pub struct PopulationReport {
    /// `sample` or the dataset path
    pub source: String,
    pub backend: String,
    /// Last stage reached before the session was closed
    pub final_stage: PopulationStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleared: Option<ResetSummary>,
    pub nodes_created: BTreeMap<EntityKind, u64>,
    pub read: ReadStats,
    /// Entities the store refused
    pub write_failures: usize,
    /// Recoverable store errors outside rule evaluation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub store_errors: Vec<String>,
    pub inference: InferenceReport,
    /// Graph contents after the run
    pub graph: GraphStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PopulationReport {
    pub(crate) fn new(source: String, backend: String) -> Self {
        let now = Utc::now();
        Self {
            source,
            backend,
            final_stage: PopulationStage::Idle,
            cleared: None,
            nodes_created: BTreeMap::new(),
            read: ReadStats::default(),
            write_failures: 0,
            store_errors: Vec::new(),
            inference: InferenceReport::default(),
            graph: GraphStats::default(),
            started_at: now,
            finished_at: now,
        }
    }

    pub(crate) fn count_node(&mut self, kind: EntityKind) {
        *self.nodes_created.entry(kind).or_insert(0) += 1;
    }

    pub(crate) fn record_write_failure(&mut self, error: &Error) {
        self.write_failures += 1;
        self.store_errors.push(error.to_string());
    }

    pub fn nodes(&self, kind: EntityKind) -> u64 {
        self.nodes_created.get(&kind).copied().unwrap_or(0)
    }

    pub fn edges_created(&self) -> &BTreeMap<RelationshipKind, u64> {
        &self.inference.edges_by_kind
    }

    pub fn edges(&self, kind: RelationshipKind) -> u64 {
        self.inference.edges_by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn match_failures(&self) -> usize {
        self.inference.match_failure_count()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
