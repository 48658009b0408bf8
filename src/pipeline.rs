// 🚀 Pipeline Orchestrator - full reload inside one transaction
// Customers first, dependents after; commit once at the end or roll back
// everything. The connection lives only as long as one run.

use crate::config::Config;
use crate::db::{open_store, open_store_read_only, setup_database};
use crate::error::{PipelineError, Result};
use crate::loader::{Deadline, TableLoader};
use crate::schema::Catalog;
use crate::source::read_source;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// SUMMARY
// ============================================================================

/// Rows loaded from one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub file: PathBuf,
    pub rows: usize,
}

/// Result of a committed run
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub source_dir: PathBuf,
    /// In load order
    pub tables: Vec<TableSummary>,
}

impl LoadSummary {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }

    pub fn rows_for(&self, table: &str) -> Option<usize> {
        self.tables.iter().find(|t| t.table == table).map(|t| t.rows)
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    config: Config,
    catalog: Catalog,
}

impl Pipeline {
    /// Pipeline over the eight risk-monitoring tables
    pub fn new(config: Config) -> Result<Self> {
        Self::with_catalog(config, Catalog::risk_monitor()?)
    }

    pub fn with_catalog(config: Config, catalog: Catalog) -> Result<Self> {
        config.validate()?;
        Ok(Pipeline { config, catalog })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Open a connection to the configured destination store.
    pub fn connect(&self) -> Result<Connection> {
        open_store(&self.config.database)
    }

    /// Open the existing store without changing it.
    pub fn connect_read_only(&self) -> Result<Connection> {
        open_store_read_only(&self.config.database)
    }

    /// Create the destination tables if they do not exist yet.
    pub fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        setup_database(&conn, &self.catalog)
    }

    /// Reload from the configured source directory.
    pub fn run_configured(&self) -> Result<LoadSummary> {
        self.run(&self.config.source.directory)
    }

    /// Replace every table's contents with the files in `source_dir`.
    ///
    /// Either every table is refreshed and committed together, or the store
    /// is left exactly as it was before the call.
    pub fn run(&self, source_dir: &Path) -> Result<LoadSummary> {
        self.run_with_deadline(source_dir, Deadline::from_limit(self.config.pipeline.timeout()))
    }

    /// Same as [`Pipeline::run`], bounded by an explicit deadline.
    pub fn run_with_deadline(&self, source_dir: &Path, deadline: Deadline) -> Result<LoadSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(
            %run_id,
            "🚀 Starting reload of {} tables from {}",
            self.catalog.len(),
            source_dir.display()
        );

        let mut conn = match self.connect() {
            Ok(conn) => conn,
            Err(e) => {
                error!(%run_id, "❌ Destination unreachable, nothing loaded: {}", e);
                return Err(e);
            }
        };

        let outcome = self.load_all(&mut conn, source_dir, &deadline);
        drop(conn);
        info!(%run_id, "🔒 Destination connection closed");

        let tables = outcome?;
        let summary = LoadSummary {
            run_id,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            source_dir: source_dir.to_path_buf(),
            tables,
        };

        info!(
            %run_id,
            rows = summary.total_rows(),
            "✅ Reload committed: {} rows across {} tables in {} ms",
            summary.total_rows(),
            summary.tables.len(),
            summary.duration_ms
        );
        Ok(summary)
    }

    /// Read and type-check every source file without touching the store.
    pub fn check(&self, source_dir: &Path) -> Result<Vec<TableSummary>> {
        self.catalog
            .load_order()
            .iter()
            .map(|table| {
                let file = source_dir.join(table.file_name);
                let rows = read_source(&file, table)?.len();
                info!("✓ {} ok ({} records)", table.file_name, rows);
                Ok(TableSummary {
                    table: table.name.to_string(),
                    file,
                    rows,
                })
            })
            .collect()
    }

    fn load_all(
        &self,
        conn: &mut Connection,
        source_dir: &Path,
        deadline: &Deadline,
    ) -> Result<Vec<TableSummary>> {
        // IMMEDIATE takes the write lock now, so a busy store fails before any table is touched.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| PipelineError::Connection {
                message: "cannot begin run transaction".to_string(),
                source: Some(e),
            })?;

        match self.load_tables(&tx, source_dir, deadline) {
            Ok(tables) => {
                tx.commit()
                    .map_err(|e| PipelineError::database("committing run", e))?;
                Ok(tables)
            }
            Err(e) => {
                warn!("↩️  Rolling back run: {}", e);
                if let Err(rollback_err) = tx.rollback() {
                    error!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    fn load_tables(
        &self,
        conn: &Connection,
        source_dir: &Path,
        deadline: &Deadline,
    ) -> Result<Vec<TableSummary>> {
        setup_database(conn, &self.catalog)?;

        let mut tables = Vec::with_capacity(self.catalog.len());
        for table in self.catalog.load_order() {
            let file = source_dir.join(table.file_name);
            deadline.check(&format!("reading {}", table.file_name))?;

            info!("📂 Loading {} from {}", table.name, file.display());
            let records = read_source(&file, table)?;
            let rows = TableLoader::new(table).load(conn, &records, deadline)?;

            tables.push(TableSummary {
                table: table.name.to_string(),
                file,
                rows,
            });
        }

        Ok(tables)
    }
}
