use crate::config::DatabaseConfig;
use crate::error::{PipelineError, Result};
use crate::schema::{Catalog, TableSpec};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Open the destination store described by `config`.
///
/// Foreign keys are switched on here because SQLite ignores the pragma once a
/// transaction is open. The probe query makes unreadable files (not a
/// database, permission denied) fail now rather than mid-run.
pub fn open_store(config: &DatabaseConfig) -> Result<Connection> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if config.create_if_missing {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }

    let conn =
        Connection::open_with_flags(&config.path, flags).map_err(PipelineError::from_open)?;
    conn.busy_timeout(config.busy_timeout())
        .map_err(PipelineError::from_open)?;
    configure(&conn)?;

    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(PipelineError::from_open)?;

    debug!("Opened destination store at {}", config.path.display());
    Ok(conn)
}

/// Open an existing store for inspection only.
///
/// No pragma writes: the journal mode is left as found and no `-wal`/`-shm`
/// files are created for a store that is not already in WAL mode.
pub fn open_store_read_only(config: &DatabaseConfig) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    let conn =
        Connection::open_with_flags(&config.path, flags).map_err(PipelineError::from_open)?;
    conn.busy_timeout(config.busy_timeout())
        .map_err(PipelineError::from_open)?;

    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(PipelineError::from_open)?;

    debug!("Opened destination store read-only at {}", config.path.display());
    Ok(conn)
}

/// Session settings every destination connection needs.
pub fn configure(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        .map_err(PipelineError::from_open)?;
    conn.pragma_update(None, "foreign_keys", true)
        .map_err(PipelineError::from_open)?;
    Ok(())
}

/// Create every catalog table (and its foreign-key index) if absent.
pub fn setup_database(conn: &Connection, catalog: &Catalog) -> Result<()> {
    for table in catalog.load_order() {
        conn.execute(&table.create_sql(), [])
            .map_err(|e| PipelineError::database(format!("creating table {}", table.name), e))?;

        if let Some(index) = table.index_sql() {
            conn.execute(&index, []).map_err(|e| {
                PipelineError::database(format!("indexing table {}", table.name), e)
            })?;
        }
    }

    info!("Schema ready ({} tables)", catalog.len());
    Ok(())
}

/// Row count of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

pub fn verify_count(conn: &Connection, table: &TableSpec) -> Result<i64> {
    let count: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {}", table.name), [], |row| {
            row.get(0)
        })
        .map_err(|e| PipelineError::database(format!("counting rows in {}", table.name), e))?;

    Ok(count)
}

/// Row counts for every table, in load order
pub fn table_counts(conn: &Connection, catalog: &Catalog) -> Result<Vec<TableCount>> {
    catalog
        .load_order()
        .iter()
        .map(|table| {
            Ok(TableCount {
                table: table.name.to_string(),
                rows: verify_count(conn, table)?,
            })
        })
        .collect()
}

/// Rows whose foreign key points at a missing parent, summed over all tables.
///
/// Always zero while foreign keys are enforced; useful against stores written
/// by other tools.
pub fn orphan_count(conn: &Connection, catalog: &Catalog) -> Result<i64> {
    let mut total = 0;

    for table in catalog.load_order() {
        let Some(fk) = table.foreign_key else {
            continue;
        };
        let sql = format!(
            "SELECT COUNT(*) FROM {child} c
             WHERE NOT EXISTS (SELECT 1 FROM {parent} p WHERE p.{pcol} = c.{col})",
            child = table.name,
            parent = fk.parent_table,
            pcol = fk.parent_column,
            col = fk.column,
        );
        let orphans: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| PipelineError::database(format!("checking orphans in {}", table.name), e))?;
        total += orphans;
    }

    Ok(total)
}

/// SHA-256 over a table's rows in insertion (rowid) order, every column included.
pub fn table_fingerprint(conn: &Connection, table: &TableSpec) -> Result<String> {
    let context = || format!("fingerprinting {}", table.name);

    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {} ORDER BY rowid", table.name))
        .map_err(|e| PipelineError::database(context(), e))?;
    let width = stmt.column_count();
    let mut rows = stmt.query([]).map_err(|e| PipelineError::database(context(), e))?;

    let mut hasher = Sha256::new();
    while let Some(row) = rows.next().map_err(|e| PipelineError::database(context(), e))? {
        for i in 0..width {
            let value = row
                .get_ref(i)
                .map_err(|e| PipelineError::database(context(), e))?;
            hash_value(&mut hasher, value);
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint of the whole store: every table in load order.
pub fn store_fingerprint(conn: &Connection, catalog: &Catalog) -> Result<String> {
    let mut hasher = Sha256::new();
    for table in catalog.load_order() {
        hasher.update(table.name.as_bytes());
        hasher.update(table_fingerprint(conn, table)?.as_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn hash_value(hasher: &mut Sha256, value: ValueRef<'_>) {
    match value {
        ValueRef::Null => hasher.update([0u8]),
        ValueRef::Integer(i) => {
            hasher.update([1u8]);
            hasher.update(i.to_le_bytes());
        }
        ValueRef::Real(f) => {
            hasher.update([2u8]);
            hasher.update(f.to_bits().to_le_bytes());
        }
        ValueRef::Text(bytes) => {
            hasher.update([3u8]);
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        ValueRef::Blob(bytes) => {
            hasher.update([4u8]);
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
    }
}
