//! Reqgraph CLI - populate and inspect the requirements knowledge graph

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use reqgraph_core::config::{Config, StoreBackend};
use reqgraph_core::domain::graph::{EntityKind, GraphStats, RelationshipKind};
use reqgraph_core::domain::inference::default_rules;
use reqgraph_core::domain::population::{
    PopulationOrchestrator, PopulationReport, PopulationSource,
};
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "reqgraph")]
#[command(author, version, about = "Requirements knowledge graph population engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Store selection shared by every command that touches the graph
#[derive(Args, Clone, Default)]
struct StoreArgs {
    /// Store backend (memory, sqlite, neo4j)
    #[arg(long)]
    store: Option<String>,

    /// SQLite database file
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph from a dataset or the built-in samples
    Populate {
        /// Semicolon separated dataset with user stories and embeddings
        #[arg(short, long, conflicts_with = "sample", required_unless_present = "sample")]
        dataset: Option<PathBuf>,
        /// Load the built-in sample requirements instead of a dataset
        #[arg(long)]
        sample: bool,
        /// Keep existing nodes and edges
        #[arg(long)]
        no_clear: bool,
        /// Skip reference vocabularies
        #[arg(long)]
        no_seed: bool,
        /// Skip rule-based inference
        #[arg(long)]
        no_infer: bool,
        /// Allow duplicate edges between the same nodes
        #[arg(long)]
        append_edges: bool,
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Delete every node and edge
    Reset {
        /// Required, the operation cannot be undone
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Show node and edge counts
    Stats {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// List inference rules in evaluation order
    Rules,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: could not load .env: {}", e);
        }
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reqgraph=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Populate {
            dataset,
            sample,
            no_clear,
            no_seed,
            no_infer,
            append_edges,
            store,
        } => {
            let mut config = load_config(&store)?;
            config.population.clear_before_load &= !no_clear;
            config.population.seed_reference_data &= !no_seed;
            config.population.infer_relationships &= !no_infer;
            config.edges.deduplicate &= !append_edges;

            let source = match dataset {
                Some(path) if !sample => PopulationSource::Dataset(path),
                _ => PopulationSource::Sample,
            };
            cmd_populate(config, source, cli.format, cli.quiet).await
        }

        Commands::Reset { force, store } => {
            cmd_reset(load_config(&store)?, force, cli.format, cli.quiet).await
        }

        Commands::Stats { store } => cmd_stats(load_config(&store)?, cli.format).await,

        Commands::Rules => cmd_rules(cli.format),

        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

fn load_config(args: &StoreArgs) -> anyhow::Result<Config> {
    let mut config = Config::load().context("Failed to load configuration")?;

    if let Some(store) = &args.store {
        config.store.backend = StoreBackend::parse(store).ok_or_else(|| {
            anyhow::anyhow!("Invalid store backend: {}. Valid options: memory, sqlite, neo4j", store)
        })?;
    }
    if let Some(db) = &args.db {
        config.store.sqlite_path = Some(db.clone());
    }

    debug!(backend = config.store.backend.as_str(), "Configuration loaded");
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_populate(
    config: Config,
    source: PopulationSource,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    if matches!(config.store.backend, StoreBackend::Memory) && !quiet {
        warn!("The memory store is discarded when the command exits");
    }

    let mut orchestrator = PopulationOrchestrator::new(config)?;
    let report = orchestrator.run(source).await.map_err(|e| match e.suggestion() {
        Some(hint) => anyhow::anyhow!("{} [{}]\n  hint: {}", e, e.code(), hint),
        None => anyhow::anyhow!("{} [{}]", e, e.code()),
    })?;

    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            if !quiet {
                print_report(&report);
            }
            Ok(())
        }
    }
}

fn print_report(report: &PopulationReport) {
    println!("Population complete");
    println!("===================");
    println!("Source:  {}", report.source);
    println!("Backend: {}", report.backend);
    println!("Stage:   {}", report.final_stage);
    if let Some(cleared) = report.cleared {
        println!(
            "Cleared: {} nodes, {} edges",
            cleared.nodes_deleted, cleared.edges_deleted
        );
    }
    println!();

    println!("Rows read:      {}", report.read.rows_read);
    println!("Bad vectors:    {}", report.read.bad_vectors);
    println!("Failed rows:    {}", report.read.failed_rows);
    println!("Write failures: {}", report.write_failures);
    println!("Match failures: {}", report.match_failures());
    println!("Link failures:  {}", report.inference.link_failures.len());
    println!(
        "Rules:          {} attempted, {} applied, {} failed",
        report.inference.rules_attempted,
        report.inference.rules_applied,
        report.inference.rules_failed
    );
    println!();

    println!("Nodes created:");
    for kind in EntityKind::all() {
        println!("  {:<12} {}", kind.label(), report.nodes(*kind));
    }
    println!("Edges created:");
    for kind in RelationshipKind::all() {
        let count = report.edges(*kind);
        if count > 0 {
            println!("  {:<20} {}", kind.as_str(), count);
        }
    }

    for outcome in report.inference.rules.iter().filter(|o| o.error.is_some()) {
        println!(
            "  rule {} failed: {}",
            outcome.rule,
            outcome.error.as_deref().unwrap_or_default()
        );
    }
    for failure in &report.inference.match_failures {
        println!("  missing {} for {}", failure.missing, failure.request);
    }
    for failure in &report.inference.link_failures {
        println!(
            "  link {} -[{}]-> {} failed: {}",
            failure.from, failure.kind, failure.to, failure.error
        );
    }
    for error in &report.store_errors {
        println!("  store error: {}", error);
    }
    println!();

    print_stats(&report.graph);
    println!();
    println!("Finished in {} ms", report.duration_ms());
}

fn print_stats(stats: &GraphStats) {
    println!("Graph: {} nodes, {} edges", stats.total_nodes(), stats.total_edges());
    for kind in EntityKind::all() {
        println!("  {:<20} {}", kind.label(), stats.nodes(*kind));
    }
    for kind in RelationshipKind::all() {
        println!("  {:<20} {}", kind.as_str(), stats.edges(*kind));
    }
}

async fn cmd_reset(
    config: Config,
    force: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    if !force {
        anyhow::bail!(
            "Refusing to delete the {} graph without --force",
            config.store.backend.as_str()
        );
    }

    let mut orchestrator = PopulationOrchestrator::new(config)?;
    let summary = orchestrator.reset().await?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text if !quiet => println!(
            "Deleted {} nodes and {} edges.",
            summary.nodes_deleted, summary.edges_deleted
        ),
        OutputFormat::Text => {}
    }
    Ok(())
}

async fn cmd_stats(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let mut orchestrator = PopulationOrchestrator::new(config)?;
    let stats = orchestrator.stats().await?;

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Text => print_stats(&stats),
    }
    Ok(())
}

fn cmd_rules(format: OutputFormat) -> anyhow::Result<()> {
    let rules = default_rules()?;

    if let OutputFormat::Json = format {
        return print_json(&rules.rules());
    }

    for (position, rule) in rules.iter().enumerate() {
        println!(
            "{:>2}. {} : {} -[{}]-> {}",
            position + 1,
            rule.id,
            rule.source.label(),
            rule.relationship,
            rule.target
        );
        if !rule.description.is_empty() {
            println!("    {}", rule.description);
        }
        if !rule.depends_on.is_empty() {
            println!("    after: {}", rule.depends_on.join(", "));
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_populate_requires_a_source() {
        assert!(Cli::try_parse_from(["reqgraph", "populate"]).is_err());
        assert!(Cli::try_parse_from(["reqgraph", "populate", "--sample"]).is_ok());
        assert!(
            Cli::try_parse_from(["reqgraph", "populate", "--sample", "--dataset", "a.csv"]).is_err()
        );
    }

    #[test]
    fn test_store_flags_parse() {
        let cli = Cli::try_parse_from([
            "reqgraph", "stats", "--store", "memory", "--db", "/tmp/g.db", "--format", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Stats { store } => {
                assert_eq!(store.store.as_deref(), Some("memory"));
                assert_eq!(store.db, Some(PathBuf::from("/tmp/g.db")));
            }
            _ => panic!("expected stats"),
        }
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
