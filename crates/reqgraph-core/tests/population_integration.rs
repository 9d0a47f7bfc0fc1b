//! Reqgraph Core Integration Tests

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqgraph_core::{
    Error,
    config::{Config, DEFAULT_EMBEDDING_MODEL, StoreBackend},
    domain::graph::{EdgeRequest, GraphStore, NodeRef, RelationshipKind},
    domain::inference::{InferenceEngine, default_rules},
    domain::ingest::{EmbeddingSourceReader, parse_embedding},
    domain::population::{PopulationOrchestrator, PopulationSource, PopulationStage},
    infrastructure::{GraphSessionManager, InMemoryGraphStore},
};
use tempfile::TempDir;

const DATASET: &str = "\
user_story;acceptance_criteria;embedding
O sistema deve permitir login;;
Como usuário, quero gerar relatórios de vendas;Dado que estou logado, quando peço o relatório, então vejo as vendas;[0.1, -0.2, 0.3]
;;[0.5, 0.5]
A interface deve ser fácil de usar;;[not, a, vector]
";

fn write_dataset(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("stories.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn memory_orchestrator(store: &InMemoryGraphStore) -> PopulationOrchestrator {
    let mut config = Config::default();
    config.store.backend = StoreBackend::Memory;
    let session = GraphSessionManager::with_store(Arc::new(store.clone()));
    PopulationOrchestrator::with_session(config, session).unwrap()
}

fn sqlite_config(db: &Path) -> Config {
    let mut config = Config::default();
    config.store.backend = StoreBackend::Sqlite;
    config.store.sqlite_path = Some(db.to_path_buf());
    config
}

#[test]
fn test_vectors_round_trip() {
    let vector = vec![0.123_f64, -0.456, 0.789, 1e-3, -2.5];
    let literal = format!(
        "[{}]",
        vector.iter().map(f64::to_string).collect::<Vec<_>>().join(", ")
    );
    assert_eq!(parse_embedding(&literal, 1).unwrap(), vector);
    assert!(parse_embedding("  ", 1).unwrap().is_empty());
    assert!(parse_embedding("0.1 0.2", 1).is_err());
}

#[test]
fn test_reader_assigns_row_ids() {
    let dir = TempDir::new().unwrap();
    let path = write_dataset(&dir, DATASET);
    let config = Config::default();

    let mut records = EmbeddingSourceReader::open(&path, &config.ingest)
        .unwrap()
        .records();
    let ids: Vec<String> = records.by_ref().map(|r| r.requirement_id()).collect();

    assert_eq!(ids, vec!["REQ_0001", "REQ_0002", "REQ_0004"]);
    let stats = records.stats();
    assert_eq!(stats.rows_read, 3);
    assert_eq!(stats.bad_vectors, 1);
    assert_eq!(stats.failed_rows, 1);
}

#[tokio::test]
async fn test_dataset_population_in_memory() {
    let dir = TempDir::new().unwrap();
    let path = write_dataset(&dir, DATASET);
    let store = InMemoryGraphStore::new();
    let mut orchestrator = memory_orchestrator(&store);

    let report = orchestrator
        .run(PopulationSource::Dataset(path))
        .await
        .unwrap();

    assert_eq!(report.final_stage, PopulationStage::Reported);
    assert_eq!(report.read.rows_read, 3);
    assert_eq!(report.read.bad_vectors, 1);
    assert_eq!(report.read.failed_rows, 1);
    assert_eq!(report.match_failures(), 0);

    let login = store.find_nodes(&NodeRef::requirement("REQ_0001")).await.unwrap();
    assert_eq!(login.len(), 1);
    assert!(login[0].embedding.is_empty());
    assert_eq!(login[0].embedding_model, DEFAULT_EMBEDDING_MODEL);
    assert_eq!(login[0].property("type"), Some(""));
    let is_functional = EdgeRequest::new(
        RelationshipKind::IsA,
        NodeRef::requirement("REQ_0001"),
        NodeRef::concept("C001"),
    )
    .unwrap();
    assert!(store.edge_exists(&is_functional).await.unwrap());

    let reports = store.find_nodes(&NodeRef::requirement("REQ_0002")).await.unwrap();
    assert_eq!(reports[0].embedding, vec![0.1, -0.2, 0.3]);
    let supported = EdgeRequest::new(
        RelationshipKind::SupportedBy,
        NodeRef::requirement("REQ_0002"),
        NodeRef::instruction("INST001"),
    )
    .unwrap();
    assert!(store.edge_exists(&supported).await.unwrap());

    let usability = store.find_nodes(&NodeRef::requirement("REQ_0004")).await.unwrap();
    assert!(usability[0].embedding.is_empty());
    let prototyped = EdgeRequest::new(
        RelationshipKind::ElicitedBy,
        NodeRef::requirement("REQ_0004"),
        NodeRef::technique("TECH003"),
    )
    .unwrap();
    assert!(store.edge_exists(&prototyped).await.unwrap());

    assert!(store.find_nodes(&NodeRef::requirement("REQ_0003")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_repeated_runs_produce_identical_edges() {
    let dir = TempDir::new().unwrap();
    let path = write_dataset(&dir, DATASET);
    let config = sqlite_config(&dir.path().join("graph.db"));

    let mut first = PopulationOrchestrator::new(config.clone()).unwrap();
    let first = first
        .run(PopulationSource::Dataset(path.clone()))
        .await
        .unwrap();

    let mut second = PopulationOrchestrator::new(config).unwrap();
    let second = second.run(PopulationSource::Dataset(path)).await.unwrap();

    assert_eq!(first.backend, "sqlite");
    assert_eq!(first.graph, second.graph);
    assert_eq!(first.edges_created(), second.edges_created());
    assert_eq!(
        second.cleared.unwrap().nodes_deleted,
        first.graph.total_nodes()
    );
}

#[tokio::test]
async fn test_rule_order_controls_dependent_matches() {
    let store = InMemoryGraphStore::new();
    let mut config = Config::default();
    config.store.backend = StoreBackend::Memory;
    config.population.infer_relationships = false;
    let session = GraphSessionManager::with_store(Arc::new(store.clone()));
    let mut orchestrator = PopulationOrchestrator::with_session(config, session).unwrap();
    orchestrator.run(PopulationSource::Sample).await.unwrap();

    let rules = default_rules().unwrap();
    let dependent = rules.get("functional_uses_interviews").unwrap();
    let prerequisite = rules.get("classify_functional").unwrap();

    let mut engine = InferenceEngine::new(&store);
    engine.run_rule(dependent).await.unwrap();
    engine.run_rule(prerequisite).await.unwrap();
    assert_eq!(engine.report().rules[0].matches, 0);
    assert_eq!(engine.report().rules[1].matches, 2);

    let mut ordered = InferenceEngine::new(&store);
    ordered.run_rules(&rules).await.unwrap();
    let outcome = ordered.report().outcome("functional_uses_interviews").unwrap();
    assert_eq!(outcome.matches, 2);
}

#[tokio::test]
async fn test_link_to_missing_technique_is_soft() {
    let dir = TempDir::new().unwrap();
    let config = sqlite_config(&dir.path().join("graph.db"));
    let missing = EdgeRequest::new(
        RelationshipKind::UsesTechnique,
        NodeRef::requirement("REQ001"),
        NodeRef::technique("TECH404"),
    )
    .unwrap();

    let mut orchestrator = PopulationOrchestrator::new(config)
        .unwrap()
        .with_links(vec![missing]);
    let report = orchestrator.run(PopulationSource::Sample).await.unwrap();

    assert_eq!(report.final_stage, PopulationStage::Reported);
    assert_eq!(report.match_failures(), 1);
    assert_eq!(report.inference.match_failures[0].missing, NodeRef::technique("TECH404"));
    assert_eq!(orchestrator.stage(), PopulationStage::Closed);
}

#[tokio::test]
async fn test_reset_on_empty_graph() {
    let dir = TempDir::new().unwrap();
    let mut orchestrator =
        PopulationOrchestrator::new(sqlite_config(&dir.path().join("graph.db"))).unwrap();

    let summary = orchestrator.reset().await.unwrap();
    assert_eq!(summary.nodes_deleted, 0);
    assert_eq!(summary.edges_deleted, 0);
}

#[tokio::test]
async fn test_missing_text_column_aborts_before_writes() {
    let dir = TempDir::new().unwrap();
    let path = write_dataset(&dir, "title;embedding\nLogin;[0.1]\n");
    let store = InMemoryGraphStore::new();
    let mut orchestrator = memory_orchestrator(&store);

    let err = orchestrator
        .run(PopulationSource::Dataset(path))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(orchestrator.stage(), PopulationStage::Closed);
    assert_eq!(store.stats().await.unwrap().total_nodes(), 0);
}
