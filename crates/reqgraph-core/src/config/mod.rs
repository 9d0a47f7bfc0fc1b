//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Embedding model tag stamped on nodes when no other model is known
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Reqgraph configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub ingest: IngestConfig,
    pub population: PopulationConfig,
    pub edges: EdgeConfig,
}

/// Which graph store adapter a session connects to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store, discarded on close
    Memory,
    /// SQLite file through the storage layer
    #[default]
    Sqlite,
    /// Neo4j server (requires the `neo4j` feature)
    Neo4j,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::Neo4j => "neo4j",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Some(Self::Memory),
            "sqlite" => Some(Self::Sqlite),
            "neo4j" => Some(Self::Neo4j),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// SQLite file; falls back to the platform data dir when unset
    pub sqlite_path: Option<PathBuf>,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_database: String,
    #[serde(skip)]
    pub neo4j_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Single-byte field delimiter
    pub delimiter: String,
    /// Candidate names for the free-text column, first present wins
    pub text_columns: Vec<String>,
    pub summary_columns: Vec<String>,
    pub embedding_columns: Vec<String>,
    pub embedding_model: String,
    /// `type` stamped on every dataset row; empty leaves rows unclassified
    pub requirement_type: String,
    pub source: String,
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Detach-delete the whole graph before loading
    pub clear_before_load: bool,
    /// Create the static Concept/Technique/Instruction vocabularies
    pub seed_reference_data: bool,
    /// Run the rule table after loading requirements
    pub infer_relationships: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Skip an edge when the same (from, to, kind) already exists
    pub deduplicate: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sqlite_path: None,
            neo4j_uri: "bolt://localhost:7687".to_string(),
            neo4j_user: "neo4j".to_string(),
            neo4j_database: "neo4j".to_string(),
            neo4j_password: None,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            delimiter: ";".to_string(),
            text_columns: vec![
                "user_story".to_string(),
                "user_story_pt".to_string(),
                "text".to_string(),
            ],
            summary_columns: vec![
                "acceptance_criteria".to_string(),
                "acceptance_criteria_pt".to_string(),
                "summary".to_string(),
            ],
            embedding_columns: vec!["embedding".to_string()],
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            requirement_type: String::new(),
            source: "dataset_user_embeddings".to_string(),
            domain: String::new(),
        }
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            clear_before_load: true,
            seed_reference_data: true,
            infer_relationships: true,
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self { deduplicate: true }
    }
}

impl IngestConfig {
    /// The delimiter as the byte the CSV reader expects
    pub fn delimiter_byte(&self) -> anyhow::Result<u8> {
        match self.delimiter.as_bytes() {
            [b] => Ok(*b),
            _ => Err(anyhow!(
                "ingest.delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            )),
        }
    }
}

impl StoreConfig {
    /// Resolved SQLite file path
    pub fn resolved_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(crate::storage::default_database_path)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("REQGRAPH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("reqgraph")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file (or defaults), then apply env overrides
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        let mut config = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str::<Config>(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Config::default()
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment-like lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("REQGRAPH_STORE") {
            self.store.backend = StoreBackend::parse(&backend)
                .ok_or_else(|| anyhow!("Invalid REQGRAPH_STORE value: {}", backend))?;
        }
        if let Some(path) = lookup("REQGRAPH_DB_PATH") {
            self.store.sqlite_path = Some(PathBuf::from(path));
        }
        if let Some(uri) = lookup("NEO4J_URL") {
            self.store.neo4j_uri = uri;
        }
        if let Some(user) = lookup("NEO4J_USERNAME") {
            self.store.neo4j_user = user;
        }
        if let Some(database) = lookup("NEO4J_DATABASE") {
            self.store.neo4j_database = database;
        }
        self.store.neo4j_password = lookup("NEO4J_PASSWORD");
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.ingest.delimiter_byte()?;
        if self.ingest.text_columns.is_empty() {
            return Err(anyhow!("ingest.text_columns must name at least one column"));
        }
        if self.ingest.embedding_model.trim().is_empty() {
            return Err(anyhow!("ingest.embedding_model must not be empty"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "store.backend" => Ok(self.store.backend.as_str().to_string()),
            "store.sqlite_path" => Ok(self.store.resolved_sqlite_path().display().to_string()),
            "store.neo4j_uri" => Ok(self.store.neo4j_uri.clone()),
            "store.neo4j_user" => Ok(self.store.neo4j_user.clone()),
            "store.neo4j_database" => Ok(self.store.neo4j_database.clone()),
            "store.neo4j_password" => Ok(match self.store.neo4j_password {
                Some(_) => "***".to_string(),
                None => "(not set - use NEO4J_PASSWORD env var)".to_string(),
            }),

            "ingest.delimiter" => Ok(self.ingest.delimiter.clone()),
            "ingest.text_columns" => Ok(self.ingest.text_columns.join(", ")),
            "ingest.summary_columns" => Ok(self.ingest.summary_columns.join(", ")),
            "ingest.embedding_columns" => Ok(self.ingest.embedding_columns.join(", ")),
            "ingest.embedding_model" => Ok(self.ingest.embedding_model.clone()),
            "ingest.requirement_type" => Ok(self.ingest.requirement_type.clone()),
            "ingest.source" => Ok(self.ingest.source.clone()),
            "ingest.domain" => Ok(self.ingest.domain.clone()),

            "population.clear_before_load" => Ok(self.population.clear_before_load.to_string()),
            "population.seed_reference_data" => Ok(self.population.seed_reference_data.to_string()),
            "population.infer_relationships" => Ok(self.population.infer_relationships.to_string()),

            "edges.deduplicate" => Ok(self.edges.deduplicate.to_string()),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `reqgraph config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "store.backend" => {
                self.store.backend = StoreBackend::parse(value).ok_or_else(|| {
                    anyhow!("Invalid store backend: {}. Valid options: memory, sqlite, neo4j", value)
                })?;
            }
            "store.sqlite_path" => self.store.sqlite_path = Some(PathBuf::from(value)),
            "store.neo4j_uri" => self.store.neo4j_uri = value.to_string(),
            "store.neo4j_user" => self.store.neo4j_user = value.to_string(),
            "store.neo4j_database" => self.store.neo4j_database = value.to_string(),
            "store.neo4j_password" => {
                return Err(anyhow!(
                    "Passwords cannot be stored in configuration. Set the NEO4J_PASSWORD environment variable instead."
                ));
            }

            "ingest.delimiter" => {
                let previous = std::mem::replace(&mut self.ingest.delimiter, value.to_string());
                if let Err(e) = self.ingest.delimiter_byte() {
                    self.ingest.delimiter = previous;
                    return Err(e);
                }
            }
            "ingest.text_columns" => self.ingest.text_columns = split_list(value),
            "ingest.summary_columns" => self.ingest.summary_columns = split_list(value),
            "ingest.embedding_columns" => self.ingest.embedding_columns = split_list(value),
            "ingest.embedding_model" => self.ingest.embedding_model = value.to_string(),
            "ingest.requirement_type" => self.ingest.requirement_type = value.to_string(),
            "ingest.source" => self.ingest.source = value.to_string(),
            "ingest.domain" => self.ingest.domain = value.to_string(),

            "population.clear_before_load" => {
                self.population.clear_before_load = parse_bool(key, value)?;
            }
            "population.seed_reference_data" => {
                self.population.seed_reference_data = parse_bool(key, value)?;
            }
            "population.infer_relationships" => {
                self.population.infer_relationships = parse_bool(key, value)?;
            }

            "edges.deduplicate" => self.edges.deduplicate = parse_bool(key, value)?,

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `reqgraph config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        CONFIG_KEYS
            .iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

const CONFIG_KEYS: &[&str] = &[
    "store.backend",
    "store.sqlite_path",
    "store.neo4j_uri",
    "store.neo4j_user",
    "store.neo4j_database",
    "store.neo4j_password",
    "ingest.delimiter",
    "ingest.text_columns",
    "ingest.summary_columns",
    "ingest.embedding_columns",
    "ingest.embedding_model",
    "ingest.requirement_type",
    "ingest.source",
    "ingest.domain",
    "population.clear_before_load",
    "population.seed_reference_data",
    "population.infer_relationships",
    "edges.deduplicate",
];

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(key: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(anyhow!("Invalid boolean for {}: {}", key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert!(config.store.neo4j_password.is_none());
        assert_eq!(config.ingest.delimiter, ";");
        assert_eq!(config.ingest.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.ingest.text_columns[0], "user_story");
        assert!(config.ingest.requirement_type.is_empty());
        assert!(config.population.clear_before_load);
        assert!(config.population.seed_reference_data);
        assert!(config.edges.deduplicate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("REQGRAPH_STORE", "memory"),
            ("NEO4J_URL", "bolt://graph:7687"),
            ("NEO4J_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.neo4j_uri, "bolt://graph:7687");
        assert_eq!(config.store.neo4j_password.as_deref(), Some("secret"));
        assert_eq!(config.get("store.neo4j_password").unwrap(), "***");
    }

    #[test]
    fn test_invalid_backend_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == "REQGRAPH_STORE").then(|| "postgres".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();

        config.set("population.clear_before_load", "false").unwrap();
        config.set("edges.deduplicate", "no").unwrap();
        config.set("ingest.text_columns", "user_story_pt, text").unwrap();

        assert_eq!(config.get("population.clear_before_load").unwrap(), "false");
        assert!(!config.edges.deduplicate);
        assert_eq!(config.ingest.text_columns, vec!["user_story_pt", "text"]);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();

        assert!(config.set("ingest.delimiter", ";;").is_err());
        assert_eq!(config.ingest.delimiter, ";");
        assert!(config.set("store.neo4j_password", "hunter2").is_err());
        assert!(config.set("population.clear_before_load", "maybe").is_err());
        assert!(config.set("unknown.key", "x").is_err());
    }

    #[test]
    fn test_toml_roundtrip_skips_password() {
        let mut config = Config::default();
        config.store.neo4j_password = Some("secret".to_string());
        config.store.backend = StoreBackend::Neo4j;

        let text = toml::to_string_pretty(&config).unwrap();
        assert!(!text.contains("secret"));

        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.store.backend, StoreBackend::Neo4j);
        assert!(parsed.store.neo4j_password.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: Config = toml::from_str("[population]\nclear_before_load = false\n").unwrap();
        assert!(!parsed.population.clear_before_load);
        assert!(parsed.population.seed_reference_data);
        assert_eq!(parsed.ingest.delimiter, ";");
    }

    #[test]
    fn test_list_covers_all_keys() {
        let config = Config::default();
        let listed = config.list().unwrap();
        assert_eq!(listed.len(), CONFIG_KEYS.len());
    }
}
