//! SQLite storage for the graph store
//!
//! - `database`: opens the graph file and migrates it
//! - `migrations`: versioned graph schema

pub mod database;
pub mod migrations;

pub use database::{Database, default_database_path};
pub use migrations::{CURRENT_VERSION, run_migrations, schema_version};
