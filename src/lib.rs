// Risk Monitor Loader - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;    // Config file + env overrides
pub mod db;        // Store access, schema setup, verification
pub mod entities;  // Typed read models over the loaded tables
pub mod error;     // PipelineError + exit codes
pub mod loader;    // Clear + insert one table, run deadline
pub mod pipeline;  // One-transaction full reload
pub mod schema;    // Table catalog + FK load order
pub mod snapshot;  // Per-customer dashboard view
pub mod source;    // CSV reader + field coercion

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{Config, DatabaseConfig, RunConfig, SourceConfig};
pub use db::{
    configure, open_store, open_store_read_only, orphan_count, setup_database, store_fingerprint,
    table_counts, table_fingerprint, verify_count, TableCount,
};
pub use entities::{get_customer, list_customers, Customer, CustomerSummary};
pub use error::{PipelineError, Result};
pub use loader::{Deadline, TableLoader};
pub use pipeline::{LoadSummary, Pipeline, TableSummary};
pub use schema::{Catalog, ColumnSpec, ColumnType, ForeignKey, TableSpec, RISK_MONITOR_TABLES};
pub use snapshot::{load_snapshot, CustomerSnapshot, RiskIndicators};
pub use source::{read_source, Record, SourceReader, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
