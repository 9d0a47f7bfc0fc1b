//! Embedding source reader
//!
//! Reads a delimited dataset with a header row into [`SourceRecord`]s. The
//! header is validated up front; row-level problems never abort the read.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::IngestConfig;
use crate::domain::graph::{NewEntity, RequirementFields};
use crate::error::{Error, Result};

/// Identifier of the requirement created from a 1-based data row
pub fn requirement_id(row: usize) -> String {
    format!("REQ_{:04}", row)
}

/// Parse a vector literal such as `[0.1, -0.2]` or `(0.1, -0.2)`
///
/// Blank input is an empty vector. Anything that is not a bracketed list of
/// finite numbers is a [`Error::RowParse`] for `row`.
pub fn parse_embedding(raw: &str, row: usize) -> Result<Vec<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let fail = |reason: String| Error::RowParse { row, reason };

    let inner = match (trimmed.chars().next(), trimmed.chars().last()) {
        (Some('['), Some(']')) | (Some('('), Some(')')) if trimmed.len() >= 2 => {
            &trimmed[1..trimmed.len() - 1]
        }
        _ => return Err(fail("expected a `[...]` or `(...)` literal".to_string())),
    };

    let inner = inner.trim();
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    let inner = inner.strip_suffix(',').unwrap_or(inner);

    inner
        .split(',')
        .enumerate()
        .map(|(i, token)| {
            let token = token.trim();
            let value: f64 = token
                .parse()
                .map_err(|_| fail(format!("element {} is not a number: {:?}", i, token)))?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(fail(format!("element {} is not finite: {:?}", i, token)))
            }
        })
        .collect()
}

/// Header positions resolved from the configured candidate names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub text: usize,
    pub text_name: String,
    pub summary: Option<usize>,
    pub embedding: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &csv::StringRecord, config: &IngestConfig) -> Result<Self> {
        let names: Vec<&str> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim())
            .collect();
        let find = |candidates: &[String]| {
            candidates.iter().find_map(|candidate| {
                names
                    .iter()
                    .position(|name| *name == candidate.as_str())
                    .map(|pos| (pos, candidate.clone()))
            })
        };

        let (text, text_name) = find(&config.text_columns).ok_or_else(|| {
            Error::InvalidInput(format!(
                "dataset has no text column (expected one of: {}; found: {})",
                config.text_columns.join(", "),
                names.join(", ")
            ))
        })?;

        Ok(Self {
            text,
            text_name,
            summary: find(&config.summary_columns).map(|(pos, _)| pos),
            embedding: find(&config.embedding_columns).map(|(pos, _)| pos),
        })
    }
}

/// One dataset row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRecord {
    /// 1-based data row number
    pub index: usize,
    pub text: String,
    pub summary: Option<String>,
    pub raw_vector: Option<String>,
    /// Parsed vector; empty when absent or malformed
    pub embedding: Vec<f64>,
    pub embedding_error: Option<String>,
}

impl SourceRecord {
    pub fn requirement_id(&self) -> String {
        requirement_id(self.index)
    }

    /// Build the requirement creation command for this row
    pub fn to_entity(&self, config: &IngestConfig) -> NewEntity {
        let fields = RequirementFields::new(self.text.clone())
            .with_summary(self.summary.clone().unwrap_or_default())
            .with_type(config.requirement_type.clone())
            .with_source(config.source.clone())
            .with_domain(config.domain.clone());

        NewEntity::requirement(self.requirement_id(), fields)
            .with_embedding(self.embedding.clone(), config.embedding_model.clone())
    }
}

/// Counters accumulated while reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    /// Rows emitted as records
    pub rows_read: usize,
    /// Emitted rows whose vector could not be parsed
    pub bad_vectors: usize,
    /// Rows skipped because they could not be decoded
    pub failed_rows: usize,
}

/// Reader over an embedding dataset
pub struct EmbeddingSourceReader<R: Read = File> {
    inner: csv::Reader<R>,
    columns: ColumnMap,
    path: Option<PathBuf>,
}

impl EmbeddingSourceReader<File> {
    /// Open a dataset file and validate its header
    pub fn open(path: impl AsRef<Path>, config: &IngestConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::InvalidInput(format!("cannot open dataset {}: {}", path.display(), e))
        })?;

        let mut reader = Self::from_reader(file, config)?;
        reader.path = Some(path.to_path_buf());
        debug!(path = %path.display(), text_column = %reader.columns.text_name, "Dataset opened");
        Ok(reader)
    }
}

impl<R: Read> EmbeddingSourceReader<R> {
    /// Wrap any byte source and validate its header
    pub fn from_reader(source: R, config: &IngestConfig) -> Result<Self> {
        let delimiter = config
            .delimiter_byte()
            .map_err(|e| Error::Config(e.to_string()))?;

        let mut inner = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let headers = inner.headers()?.clone();
        let columns = ColumnMap::resolve(&headers, config)?;

        Ok(Self {
            inner,
            columns,
            path: None,
        })
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Consume the reader into a single-pass record iterator
    pub fn records(self) -> SourceRecords<R> {
        SourceRecords {
            rows: self.inner.into_records(),
            columns: self.columns,
            index: 0,
            stats: ReadStats::default(),
        }
    }
}

/// Lazy iterator over dataset rows
///
/// Every data row consumes an index, including rows that are skipped, so
/// identifiers stay tied to row positions.
pub struct SourceRecords<R: Read> {
    rows: csv::StringRecordsIntoIter<R>,
    columns: ColumnMap,
    index: usize,
    stats: ReadStats,
}

impl<R: Read> SourceRecords<R> {
    pub fn stats(&self) -> ReadStats {
        self.stats
    }

    fn decode(&mut self, row: &csv::StringRecord) -> Option<SourceRecord> {
        let index = self.index;

        let text = match row.get(self.columns.text).map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => {
                warn!(row = index, "Skipping row without requirement text");
                self.stats.failed_rows += 1;
                return None;
            }
        };

        let summary = self
            .columns
            .summary
            .and_then(|pos| row.get(pos))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let raw_vector = self
            .columns
            .embedding
            .and_then(|pos| row.get(pos))
            .map(str::to_string);

        let (embedding, embedding_error) = match raw_vector.as_deref() {
            None => (Vec::new(), None),
            Some(raw) => match parse_embedding(raw, index) {
                Ok(vector) => (vector, None),
                Err(e) => {
                    warn!(row = index, error = %e, "Malformed embedding, storing empty vector");
                    self.stats.bad_vectors += 1;
                    (Vec::new(), Some(e.to_string()))
                }
            },
        };

        self.stats.rows_read += 1;
        Some(SourceRecord {
            index,
            text,
            summary,
            raw_vector,
            embedding,
            embedding_error,
        })
    }
}

impl<R: Read> Iterator for SourceRecords<R> {
    type Item = SourceRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = self.rows.next()?;
            self.index += 1;

            match row {
                Ok(row) => {
                    if let Some(record) = self.decode(&row) {
                        return Some(record);
                    }
                }
                Err(e) => {
                    warn!(row = self.index, error = %e, "Skipping undecodable row");
                    self.stats.failed_rows += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EMBEDDING_MODEL;
    use std::io::Cursor;

    fn reader(data: &str) -> Result<EmbeddingSourceReader<Cursor<Vec<u8>>>> {
        EmbeddingSourceReader::from_reader(Cursor::new(data.as_bytes().to_vec()), &IngestConfig::default())
    }

    #[test]
    fn test_parse_embedding_forms() {
        assert_eq!(parse_embedding("", 1).unwrap(), Vec::<f64>::new());
        assert_eq!(parse_embedding("   ", 1).unwrap(), Vec::<f64>::new());
        assert_eq!(parse_embedding("[]", 1).unwrap(), Vec::<f64>::new());
        assert_eq!(parse_embedding("[0.5, -1.25, 3]", 1).unwrap(), vec![0.5, -1.25, 3.0]);
        assert_eq!(parse_embedding("(0.5, 1e-05,)", 1).unwrap(), vec![0.5, 1e-5]);
    }

    #[test]
    fn test_parse_embedding_rejects_garbage() {
        for raw in ["0.1, 0.2", "[0.1, abc]", "[0.1, 0.2", "{0.1}", "[nan, 0.1]"] {
            let err = parse_embedding(raw, 7).unwrap_err();
            assert!(matches!(err, Error::RowParse { row: 7, .. }), "accepted {:?}", raw);
        }
    }

    #[test]
    fn test_well_formed_vectors_round_trip() {
        let values = vec![0.311_f64, -0.244, 0.665, 1.0e-7, 12345.678];
        let literal = format!(
            "[{}]",
            values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
        );
        assert_eq!(parse_embedding(&literal, 1).unwrap(), values);

        let precise = parse_embedding("[0.012345678901234567, -0.0023156791032]", 1).unwrap();
        assert_eq!(precise, vec![0.012345678901234567, -0.0023156791032]);
    }

    #[test]
    fn test_records_with_bad_vector_are_still_emitted() {
        let data = "user_story;acceptance_criteria;embedding\n\
                    O sistema deve permitir login;Dado um usuário;[0.1, 0.2]\n\
                    O sistema deve gerar relatórios;;not a vector\n\
                    O sistema deve responder rápido;;\n";
        let mut records = reader(data).unwrap().records();

        let first = records.next().unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(first.requirement_id(), "REQ_0001");
        assert_eq!(first.embedding, vec![0.1, 0.2]);
        assert_eq!(first.summary.as_deref(), Some("Dado um usuário"));

        let second = records.next().unwrap();
        assert_eq!(second.index, 2);
        assert!(second.embedding.is_empty());
        assert!(second.embedding_error.is_some());
        assert_eq!(second.summary, None);

        let third = records.next().unwrap();
        assert!(third.embedding.is_empty());
        assert!(third.embedding_error.is_none());

        assert!(records.next().is_none());
        assert_eq!(
            records.stats(),
            ReadStats {
                rows_read: 3,
                bad_vectors: 1,
                failed_rows: 0
            }
        );
    }

    #[test]
    fn test_rows_without_text_are_skipped_but_keep_index() {
        let data = "user_story;embedding\n;[0.1]\nsegunda linha;\n";
        let mut records = reader(data).unwrap().records();

        let only = records.next().unwrap();
        assert_eq!(only.index, 2);
        assert_eq!(only.text, "segunda linha");
        assert!(records.next().is_none());
        assert_eq!(records.stats().failed_rows, 1);
    }

    #[test]
    fn test_candidate_columns_resolve_in_order() {
        let data = "id;user_story_pt;acceptance_criteria_pt\n1;Como usuário, quero entrar;critério\n";
        let reader = reader(data).unwrap();
        assert_eq!(reader.columns().text, 1);
        assert_eq!(reader.columns().text_name, "user_story_pt");
        assert_eq!(reader.columns().summary, Some(2));
        assert_eq!(reader.columns().embedding, None);
    }

    #[test]
    fn test_missing_text_column_is_rejected() {
        let err = reader("title;embedding\nx;[]\n").err().unwrap();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("user_story"));
    }

    #[test]
    fn test_open_missing_file() {
        let err = EmbeddingSourceReader::open("/nonexistent/dataset.csv", &IngestConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_to_entity_uses_ingest_defaults() {
        let record = SourceRecord {
            index: 12,
            text: "O sistema deve permitir login".to_string(),
            summary: None,
            raw_vector: None,
            embedding: Vec::new(),
            embedding_error: None,
        };

        let entity = record.to_entity(&IngestConfig::default());
        assert_eq!(entity.id, "REQ_0012");
        assert!(entity.embedding.is_empty());
        assert_eq!(entity.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(entity.fields.properties().get("type").unwrap(), "");
    }

    #[test]
    fn test_configured_requirement_type_is_stamped() {
        let record = SourceRecord {
            index: 3,
            text: "O sistema deve responder em 2 segundos".to_string(),
            summary: Some("Performance".to_string()),
            raw_vector: None,
            embedding: Vec::new(),
            embedding_error: None,
        };
        let config = IngestConfig {
            requirement_type: "não-funcional".to_string(),
            ..IngestConfig::default()
        };

        let entity = record.to_entity(&config);
        let props = entity.fields.properties();
        assert_eq!(props.get("type").unwrap(), "não-funcional");
        assert_eq!(props.get("summary").unwrap(), "Performance");
    }
}
