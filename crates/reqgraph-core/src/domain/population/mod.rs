//! Graph population
//!
//! - [`seed`]: reference vocabularies and sample requirements
//! - [`orchestrator`]: the staged population run
//! - [`report`]: stages and the end-of-run report

pub mod orchestrator;
pub mod report;
pub mod seed;

pub use orchestrator::{PopulationOrchestrator, PopulationSource};
pub use report::{PopulationReport, PopulationStage};
