//! Population orchestrator
//!
//! Drives one full population: open the dataset, connect, clear, seed the
//! reference vocabularies, load requirements, infer relationships and report.
//! The session is closed on every exit path.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::graph::{
    CommandOutcome, EdgePolicy, EdgeRequest, EntityKind, GraphCommand, GraphStats, GraphStore,
    NewEntity, ResetSummary, apply_command,
};
use crate::domain::inference::{InferenceEngine, RuleSet, default_rules};
use crate::domain::ingest::EmbeddingSourceReader;
use crate::error::{Error, Result};
use crate::infrastructure::graph::GraphSessionManager;

use super::report::{PopulationReport, PopulationStage};
use super::seed;

/// Where requirements come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulationSource {
    /// Semicolon separated dataset with user stories and embeddings
    Dataset(PathBuf),
    /// Built-in sample requirements and their curated links
    Sample,
}

impl PopulationSource {
    pub fn label(&self) -> String {
        match self {
            Self::Dataset(path) => path.display().to_string(),
            Self::Sample => "sample".to_string(),
        }
    }
}

/// Sequences a population run against one graph session
pub struct PopulationOrchestrator {
    config: Config,
    session: GraphSessionManager,
    rules: RuleSet,
    links: Vec<EdgeRequest>,
    stage: PopulationStage,
}

impl PopulationOrchestrator {
    /// Build an orchestrator whose session follows `config.store`
    pub fn new(config: Config) -> Result<Self> {
        let session = GraphSessionManager::new(config.store.clone());
        Self::with_session(config, session)
    }

    /// Build an orchestrator around an existing session
    pub fn with_session(config: Config, session: GraphSessionManager) -> Result<Self> {
        Ok(Self {
            config,
            session,
            rules: default_rules()?,
            links: Vec::new(),
            stage: PopulationStage::Idle,
        })
    }

    /// Replace the default rule table
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Extra explicit links applied after requirements are loaded
    pub fn with_links(mut self, links: Vec<EdgeRequest>) -> Self {
        self.links = links;
        self
    }

    pub fn stage(&self) -> PopulationStage {
        self.stage
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn policy(&self) -> EdgePolicy {
        EdgePolicy::from_deduplicate(self.config.edges.deduplicate)
    }

    fn advance(&mut self, stage: PopulationStage) {
        debug!(from = %self.stage, to = %stage, "Population stage");
        self.stage = stage;
    }

    /// Run a full population and report what was written
    ///
    /// Only unrecoverable failures return `Err`: an unreadable dataset, a
    /// failed connection, or a fatal store error. In every case the session
    /// is closed and the stage ends at [`PopulationStage::Closed`].
    pub async fn run(&mut self, source: PopulationSource) -> Result<PopulationReport> {
        self.stage = PopulationStage::Idle;
        info!(source = %source.label(), backend = self.config.store.backend.as_str(), "Starting population");

        let reader = match &source {
            PopulationSource::Dataset(path) => {
                match EmbeddingSourceReader::open(path, &self.config.ingest) {
                    Ok(reader) => Some(reader),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Dataset rejected");
                        self.advance(PopulationStage::Closed);
                        return Err(e);
                    }
                }
            }
            PopulationSource::Sample => None,
        };

        let mut report = PopulationReport::new(
            source.label(),
            self.config.store.backend.as_str().to_string(),
        );

        let outcome = self.execute(reader, &mut report).await;
        let closed = self.session.close().await;
        self.advance(PopulationStage::Closed);

        outcome?;
        if let Err(e) = closed {
            warn!(error = %e, "Population finished but the session did not close cleanly");
        }

        report.finished_at = Utc::now();
        info!(
            nodes = report.graph.total_nodes(),
            edges = report.graph.total_edges(),
            match_failures = report.match_failures(),
            duration_ms = report.duration_ms(),
            "Population complete"
        );
        Ok(report)
    }

    async fn execute(
        &mut self,
        reader: Option<EmbeddingSourceReader>,
        report: &mut PopulationReport,
    ) -> Result<()> {
        self.session.connect().await?;
        self.advance(PopulationStage::Connected);
        let store = self.session.shared_store()?;
        report.backend = store.backend().to_string();

        if self.config.population.clear_before_load {
            report.cleared = Some(self.session.reset().await?);
            self.advance(PopulationStage::Cleared);
        }

        let policy = self.policy();
        let mut engine = InferenceEngine::new(store.as_ref()).with_policy(policy);

        if self.config.population.seed_reference_data {
            let entities = seed::reference_entities();
            create_entities(store.as_ref(), &entities, policy, report).await?;
            engine.link_all(&seed::reference_links()?).await?;
            info!(entities = entities.len(), "Reference data seeded");
        }
        self.advance(PopulationStage::EntitiesSeeded);

        match reader {
            Some(reader) => self.load_dataset(store.as_ref(), reader, policy, report).await?,
            None => {
                create_entities(store.as_ref(), &seed::sample_requirements(), policy, report).await?;
                engine.link_all(&seed::sample_links()?).await?;
            }
        }
        engine.link_all(&self.links).await?;
        info!(
            requirements = report.nodes(EntityKind::Requirement),
            bad_vectors = report.read.bad_vectors,
            failed_rows = report.read.failed_rows,
            "Requirements loaded"
        );
        self.advance(PopulationStage::RequirementsLoaded);

        if self.config.population.infer_relationships {
            engine.run_rules(&self.rules).await?;
            self.advance(PopulationStage::RelationshipsInferred);
        }

        report.inference = engine.into_report();
        match store.stats().await {
            Ok(stats) => report.graph = stats,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Graph counts unavailable");
                report.store_errors.push(e.to_string());
            }
        }
        self.advance(PopulationStage::Reported);
        report.final_stage = PopulationStage::Reported;
        Ok(())
    }

    async fn load_dataset(
        &self,
        store: &dyn GraphStore,
        reader: EmbeddingSourceReader,
        policy: EdgePolicy,
        report: &mut PopulationReport,
    ) -> Result<()> {
        let mut records = reader.records();

        for record in records.by_ref() {
            if let Some(reason) = &record.embedding_error {
                debug!(row = record.index, reason = %reason, "Stored row with empty embedding");
            }
            let entity = record.to_entity(&self.config.ingest);
            match create_entity(store, &entity, policy).await {
                Ok(()) => report.count_node(entity.kind()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(row = record.index, error = %e, "Requirement not stored");
                    report.record_write_failure(&e);
                }
            }
        }

        report.read = records.stats();
        Ok(())
    }

    /// Delete every node and edge in the configured store
    pub async fn reset(&mut self) -> Result<ResetSummary> {
        let outcome = self.with_connection(|store| async move { store.delete_all().await }).await;
        if let Ok(summary) = &outcome {
            info!(
                nodes = summary.nodes_deleted,
                edges = summary.edges_deleted,
                "Graph reset"
            );
        }
        outcome
    }

    /// Current node and edge counts in the configured store
    pub async fn stats(&mut self) -> Result<GraphStats> {
        self.with_connection(|store| async move { store.stats().await }).await
    }

    async fn with_connection<F, Fut, T>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn GraphStore>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let outcome: Result<T> = async {
            self.session.connect().await?;
            self.advance(PopulationStage::Connected);
            op(self.session.shared_store()?).await
        }
        .await;

        let closed = self.session.close().await;
        self.advance(PopulationStage::Closed);
        let value = outcome?;
        closed?;
        Ok(value)
    }
}

async fn create_entity(store: &dyn GraphStore, entity: &NewEntity, policy: EdgePolicy) -> Result<()> {
    let command = GraphCommand::CreateEntity(entity.clone());
    match apply_command(store, &command, policy).await? {
        CommandOutcome::Node(_) => Ok(()),
        CommandOutcome::Edge(_) => Err(Error::Other(
            "entity command produced an edge".to_string(),
        )),
    }
}

async fn create_entities(
    store: &dyn GraphStore,
    entities: &[NewEntity],
    policy: EdgePolicy,
    report: &mut PopulationReport,
) -> Result<()> {
    for entity in entities {
        match create_entity(store, entity, policy).await {
            Ok(()) => report.count_node(entity.kind()),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(entity = %entity.node_ref(), error = %e, "Entity not stored");
                report.record_write_failure(&e);
            }
        }
    }
    Ok(())
}
