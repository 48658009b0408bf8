// 📥 Table Loader - replace one destination table's contents
// Clear, then insert every record in order. Errors are never swallowed here:
// the caller owns the transaction and decides to roll back.

use crate::error::{PipelineError, Result};
use crate::schema::TableSpec;
use crate::source::{Record, Value};
use rusqlite::{params_from_iter, Connection};
use std::time::{Duration, Instant};
use tracing::{debug, info};

// ============================================================================
// DEADLINE
// ============================================================================

/// Optional wall-clock limit shared by every step of a run.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn none() -> Self {
        Deadline {
            started: Instant::now(),
            limit: None,
        }
    }

    pub fn after(limit: Duration) -> Self {
        Deadline {
            started: Instant::now(),
            limit: Some(limit),
        }
    }

    pub fn from_limit(limit: Option<Duration>) -> Self {
        limit.map_or_else(Deadline::none, Deadline::after)
    }

    pub fn is_expired(&self) -> bool {
        self.limit.is_some_and(|limit| self.started.elapsed() >= limit)
    }

    /// Expiry counts as a connection-class failure.
    pub fn check(&self, step: &str) -> Result<()> {
        match self.limit {
            Some(limit) if self.is_expired() => Err(PipelineError::connection(format!(
                "run deadline of {:?} exceeded while {}",
                limit, step
            ))),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// TABLE LOADER
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct TableLoader {
    table: &'static TableSpec,
}

impl TableLoader {
    pub fn new(table: &'static TableSpec) -> Self {
        TableLoader { table }
    }

    /// Delete every row. On the root table the foreign keys cascade the
    /// delete into all dependent tables.
    pub fn clear(&self, conn: &Connection) -> Result<usize> {
        let deleted = conn
            .execute(&format!("DELETE FROM {}", self.table.name), [])
            .map_err(|e| PipelineError::from_write(self.table.name, 0, e))?;

        debug!("Cleared {} rows from {}", deleted, self.table.name);
        Ok(deleted)
    }

    /// Replace the table's contents with `records`, preserving their order.
    ///
    /// Returns the number of rows inserted, which always equals
    /// `records.len()` on success.
    pub fn load(&self, conn: &Connection, records: &[Record], deadline: &Deadline) -> Result<usize> {
        let name = self.table.name;
        deadline.check(&format!("clearing {}", name))?;
        self.clear(conn)?;

        let mut stmt = conn
            .prepare_cached(&self.table.insert_sql())
            .map_err(|e| PipelineError::database(format!("preparing insert into {}", name), e))?;

        let step = format!("loading {}", name);
        let mut inserted = 0;
        for record in records {
            deadline.check(&step)?;

            // Bound by declared column name; an absent field binds NULL and
            // is left for the NOT NULL constraint to reject.
            let values = self
                .table
                .columns
                .iter()
                .map(|column| record.get(column.name).unwrap_or(&Value::Null));

            stmt.execute(params_from_iter(values))
                .map_err(|e| PipelineError::from_write(name, record.line(), e))?;
            inserted += 1;
        }

        info!(table = name, rows = inserted, "✓ Loaded {} rows into {}", inserted, name);
        Ok(inserted)
    }
}
