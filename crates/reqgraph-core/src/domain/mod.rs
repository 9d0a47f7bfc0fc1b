//! Domain layer
//!
//! Graph model, dataset ingestion, relationship inference and the
//! population workflow built on top of them.

pub mod graph;
pub mod inference;
pub mod ingest;
pub mod population;
