//! Error types for the reload pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::schema::ColumnType;

/// Every failure the pipeline can surface to its caller.
///
/// Nothing below the orchestrator recovers from these; they bubble up so the
/// run's transaction can be rolled back as a whole.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Destination unreachable, busy past its timeout, or run deadline expired
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// Source file does not exist
    #[error("Source file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Source file is structurally unusable (headers, row shape, encoding)
    #[error("Malformed source file {}: {reason}", path.display())]
    SourceMalformed { path: PathBuf, reason: String },

    /// A cell could not be coerced to its declared column type
    #[error(
        "Type error in {} line {line}, column '{column}': cannot read {value:?} as {expected}",
        path.display()
    )]
    FieldTypeError {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
        expected: ColumnType,
    },

    /// Destination rejected a row (foreign key, NOT NULL, STRICT type, unique)
    #[error("Constraint violation in table {table} (source line {line}): {message}")]
    ConstraintViolation {
        table: String,
        line: u64,
        message: String,
    },

    /// Configuration error (invalid TOML, empty paths, bad overrides)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Table catalog is inconsistent (unknown parent, cycle, duplicate)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Any other destination failure, with the step it happened in
    #[error("Database error while {context}: {source}")]
    Database {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create a Connection error without an underlying driver error
    pub fn connection(message: impl Into<String>) -> Self {
        PipelineError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Database error tagged with what was being attempted
    pub fn database(context: impl Into<String>, source: rusqlite::Error) -> Self {
        PipelineError::Database {
            context: context.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::SourceMalformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Classify a driver error raised while writing `table` from `line`.
    pub fn from_write(table: &str, line: u64, err: rusqlite::Error) -> Self {
        match sqlite_code(&err) {
            Some(rusqlite::ErrorCode::ConstraintViolation) => PipelineError::ConstraintViolation {
                table: table.to_string(),
                line,
                message: err.to_string(),
            },
            Some(code) if is_connection_code(code) => PipelineError::Connection {
                message: format!("lost destination while writing {}", table),
                source: Some(err),
            },
            _ => PipelineError::database(format!("writing {} (source line {})", table, line), err),
        }
    }

    /// Classify a driver error raised while acquiring or probing the store.
    pub fn from_open(err: rusqlite::Error) -> Self {
        PipelineError::Connection {
            message: "cannot open destination store".to_string(),
            source: Some(err),
        }
    }

    /// Whether the error belongs to the connection class (including deadlines).
    pub fn is_connection(&self) -> bool {
        matches!(self, PipelineError::Connection { .. })
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Connection { .. } => 2,
            PipelineError::SourceNotFound { .. }
            | PipelineError::SourceMalformed { .. }
            | PipelineError::FieldTypeError { .. } => 3,
            PipelineError::ConstraintViolation { .. } => 4,
            PipelineError::Config(_) => 5,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

fn sqlite_code(err: &rusqlite::Error) -> Option<rusqlite::ErrorCode> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => Some(e.code),
        _ => None,
    }
}

fn is_connection_code(code: rusqlite::ErrorCode) -> bool {
    matches!(
        code,
        rusqlite::ErrorCode::CannotOpen
            | rusqlite::ErrorCode::NotADatabase
            | rusqlite::ErrorCode::DatabaseBusy
            | rusqlite::ErrorCode::DatabaseLocked
            | rusqlite::ErrorCode::SystemIoFailure
            | rusqlite::ErrorCode::PermissionDenied
            | rusqlite::ErrorCode::ReadOnly
    )
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_foreign_key_failure_classified_as_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent (id TEXT PRIMARY KEY);
             CREATE TABLE child (pid TEXT NOT NULL REFERENCES parent(id));",
        )
        .unwrap();

        let err = conn
            .execute("INSERT INTO child (pid) VALUES ('missing')", [])
            .unwrap_err();
        let classified = PipelineError::from_write("child", 2, err);

        match classified {
            PipelineError::ConstraintViolation { table, line, .. } => {
                assert_eq!(table, "child");
                assert_eq!(line, 2);
            }
            other => panic!("expected constraint violation, got {:?}", other),
        }
    }

    #[test]
    fn test_unrelated_failure_classified_as_database() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("INSERT INTO nowhere VALUES (1)", []).unwrap_err();

        let classified = PipelineError::from_write("nowhere", 1, err);
        assert!(matches!(classified, PipelineError::Database { .. }));
        assert_eq!(classified.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes_by_class() {
        assert_eq!(PipelineError::connection("down").exit_code(), 2);
        assert_eq!(
            PipelineError::SourceNotFound { path: "a.csv".into() }.exit_code(),
            3
        );
        assert_eq!(PipelineError::malformed("a.csv", "no header").exit_code(), 3);
        assert_eq!(
            PipelineError::ConstraintViolation {
                table: "alerts".into(),
                line: 3,
                message: "FOREIGN KEY constraint failed".into(),
            }
            .exit_code(),
            4
        );
        assert_eq!(PipelineError::Config("empty".into()).exit_code(), 5);
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("NOT SQL", []).unwrap_err();
        let wrapped = PipelineError::database("probing", err);

        let detailed = wrapped.format_detailed();
        assert!(detailed.starts_with("Error: Database error while probing"));
        assert!(detailed.contains("Caused by:"));
    }
}
