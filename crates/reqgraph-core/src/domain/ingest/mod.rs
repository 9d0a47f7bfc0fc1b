//! Dataset ingestion
//!
//! Turns a delimited dataset of user stories and embedding vectors into
//! requirement creation commands.

pub mod reader;

pub use reader::{
    ColumnMap, EmbeddingSourceReader, ReadStats, SourceRecord, SourceRecords, parse_embedding,
    requirement_id,
};
