// 📐 Shape Layer - Table Catalog
// Declares every destination table once: file name, typed columns, keys.
// Load order and DDL are derived from these declarations.

use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// COLUMN TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Timestamp,
}

impl ColumnType {
    /// SQLite storage type (tables are STRICT, so this is enforced)
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text | ColumnType::Timestamp => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Real => "float",
            ColumnType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
}

const fn col(name: &'static str, column_type: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        column_type,
        nullable: false,
    }
}

const fn opt(name: &'static str, column_type: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        column_type,
        nullable: true,
    }
}

/// `column` references `parent_table(parent_column)`; deleting the parent
/// row deletes the referencing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub parent_table: &'static str,
    pub parent_column: &'static str,
}

// ============================================================================
// TABLE SPEC
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    /// Destination table name
    pub name: &'static str,

    /// Source file name inside the input directory
    pub file_name: &'static str,

    /// Natural primary key column; `None` means a surrogate `id` rowid alias
    /// is added, which restarts from 1 after the table is emptied
    pub primary_key: Option<&'static str>,

    pub foreign_key: Option<ForeignKey>,

    /// Declared columns, in source header and insert order
    pub columns: &'static [ColumnSpec],
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Tables referencing this one cascade on delete
    pub fn is_root(&self) -> bool {
        self.foreign_key.is_none()
    }

    pub fn create_sql(&self) -> String {
        let mut parts = Vec::with_capacity(self.columns.len() + 2);

        if self.primary_key.is_none() {
            parts.push("id INTEGER PRIMARY KEY".to_string());
        }

        for column in self.columns {
            let mut def = format!("{} {}", column.name, column.column_type.sql_type());
            if Some(column.name) == self.primary_key {
                def.push_str(" PRIMARY KEY");
            }
            if !column.nullable {
                def.push_str(" NOT NULL");
            }
            parts.push(def);
        }

        if let Some(fk) = &self.foreign_key {
            parts.push(format!(
                "FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE CASCADE",
                fk.column, fk.parent_table, fk.parent_column
            ));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n) STRICT",
            self.name,
            parts.join(",\n    ")
        )
    }

    pub fn insert_sql(&self) -> String {
        let placeholders: Vec<String> = (1..=self.columns.len()).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            self.column_names().join(", "),
            placeholders.join(", ")
        )
    }

    pub fn index_sql(&self) -> Option<String> {
        self.foreign_key.map(|fk| {
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{}_{} ON {}({})",
                self.name, fk.column, self.name, fk.column
            )
        })
    }
}

// ============================================================================
// RISK MONITOR TABLES
// ============================================================================

use ColumnType::{Integer, Real, Text, Timestamp};

const CUSTOMER_FK: ForeignKey = ForeignKey {
    column: "customer_user_id",
    parent_table: "customers",
    parent_column: "user_id",
};

pub const CUSTOMERS: TableSpec = TableSpec {
    name: "customers",
    file_name: "customers.csv",
    primary_key: Some("user_id"),
    foreign_key: None,
    columns: &[
        col("user_id", Text),
        col("name", Text),
        opt("email", Text),
        opt("phone", Text),
        col("account_number", Text),
        col("credit_score", Integer),
        col("credit_score_status", Text),
        col("status", Text),
        col("total_assets", Real),
        col("total_liabilities", Real),
        col("total_debt", Real),
        col("net_worth", Real),
        col("monthly_income", Real),
        col("monthly_expenses", Real),
        col("risk_score", Integer),
        col("risk_percentage", Real),
        col("stress_level", Text),
        col("date_joined", Timestamp),
        col("last_updated", Timestamp),
    ],
};

pub const TRANSACTIONS: TableSpec = TableSpec {
    name: "transactions",
    file_name: "transactions.csv",
    primary_key: None,
    foreign_key: Some(CUSTOMER_FK),
    columns: &[
        col("customer_user_id", Text),
        col("transaction_date", Timestamp),
        col("description", Text),
        col("amount", Real),
        col("type", Text),
        opt("category", Text),
    ],
};

pub const CASH_FLOW_RECORDS: TableSpec = TableSpec {
    name: "cash_flow_records",
    file_name: "cash_flow_records.csv",
    primary_key: None,
    foreign_key: Some(CUSTOMER_FK),
    columns: &[
        col("customer_user_id", Text),
        col("month", Text),
        col("year", Integer),
        col("total_income", Real),
        col("total_expenses", Real),
    ],
};

pub const CREDIT_SCORE_HISTORY: TableSpec = TableSpec {
    name: "credit_score_history",
    file_name: "credit_score_history.csv",
    primary_key: None,
    foreign_key: Some(CUSTOMER_FK),
    columns: &[
        col("customer_user_id", Text),
        col("month", Text),
        col("year", Integer),
        col("score", Integer),
    ],
};

pub const PAYMENT_HISTORY: TableSpec = TableSpec {
    name: "payment_history",
    file_name: "payment_history.csv",
    primary_key: None,
    foreign_key: Some(CUSTOMER_FK),
    columns: &[
        col("customer_user_id", Text),
        col("month", Text),
        col("year", Integer),
        col("on_time_percentage", Real),
        col("late_percentage", Real),
    ],
};

pub const SPENDING_CATEGORIES: TableSpec = TableSpec {
    name: "spending_categories",
    file_name: "spending_categories.csv",
    primary_key: None,
    foreign_key: Some(CUSTOMER_FK),
    columns: &[
        col("customer_user_id", Text),
        col("category", Text),
        col("percentage", Real),
        col("amount", Real),
        col("month", Text),
    ],
};

pub const ALERTS: TableSpec = TableSpec {
    name: "alerts",
    file_name: "alerts.csv",
    primary_key: None,
    foreign_key: Some(CUSTOMER_FK),
    columns: &[
        col("customer_user_id", Text),
        col("type", Text),
        col("message", Text),
        col("created_at", Timestamp),
    ],
};

pub const LIQUIDITY_DATA: TableSpec = TableSpec {
    name: "liquidity_data",
    file_name: "liquidity_data.csv",
    primary_key: None,
    foreign_key: Some(CUSTOMER_FK),
    columns: &[
        col("customer_user_id", Text),
        col("month", Text),
        col("year", Integer),
        col("amount", Real),
    ],
};

/// Declaration order doubles as the tie-breaker for the topological sort.
pub const RISK_MONITOR_TABLES: &[TableSpec] = &[
    CUSTOMERS,
    TRANSACTIONS,
    CASH_FLOW_RECORDS,
    CREDIT_SCORE_HISTORY,
    PAYMENT_HISTORY,
    SPENDING_CATEGORIES,
    ALERTS,
    LIQUIDITY_DATA,
];

// ============================================================================
// CATALOG
// ============================================================================

/// Validated set of tables plus the load order derived from their
/// foreign keys. Built once and reused for every run.
#[derive(Debug, Clone)]
pub struct Catalog {
    load_order: Vec<&'static TableSpec>,
}

impl Catalog {
    /// The eight risk-monitoring tables
    pub fn risk_monitor() -> Result<Self> {
        Catalog::new(RISK_MONITOR_TABLES)
    }

    /// Validate `tables` and compute a parents-first order (Kahn's algorithm,
    /// ties broken by declaration order).
    pub fn new(tables: &'static [TableSpec]) -> Result<Self> {
        let mut position: HashMap<&str, usize> = HashMap::new();
        for (i, table) in tables.iter().enumerate() {
            if position.insert(table.name, i).is_some() {
                return Err(PipelineError::Schema(format!(
                    "table '{}' declared twice",
                    table.name
                )));
            }
        }

        let mut indegree = vec![0usize; tables.len()];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];

        for (i, table) in tables.iter().enumerate() {
            if let Some(fk) = &table.foreign_key {
                if table.column(fk.column).is_none() {
                    return Err(PipelineError::Schema(format!(
                        "table '{}' has no column '{}' for its foreign key",
                        table.name, fk.column
                    )));
                }
                let parent = *position.get(fk.parent_table).ok_or_else(|| {
                    PipelineError::Schema(format!(
                        "table '{}' references unknown table '{}'",
                        table.name, fk.parent_table
                    ))
                })?;
                indegree[i] += 1;
                children[parent].push(i);
            }
        }

        let mut ready: Vec<usize> = (0..tables.len()).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(tables.len());

        while !ready.is_empty() {
            ready.sort_unstable();
            let next = ready.remove(0);
            order.push(&tables[next]);
            for &child in &children[next] {
                indegree[child] -= 1;
                if indegree[child] == 0 {
                    ready.push(child);
                }
            }
        }

        if order.len() != tables.len() {
            let stuck: Vec<&str> = tables
                .iter()
                .enumerate()
                .filter(|(i, _)| indegree[*i] > 0)
                .map(|(_, t)| t.name)
                .collect();
            return Err(PipelineError::Schema(format!(
                "foreign keys form a cycle through: {}",
                stuck.join(", ")
            )));
        }

        Ok(Catalog { load_order: order })
    }

    /// Tables in dependency order, parents first
    pub fn load_order(&self) -> &[&'static TableSpec] {
        &self.load_order
    }

    pub fn len(&self) -> usize {
        self.load_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.load_order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_monitor_load_order() {
        let catalog = Catalog::risk_monitor().unwrap();
        let names: Vec<&str> = catalog.load_order().iter().map(|t| t.name).collect();

        assert_eq!(
            names,
            vec![
                "customers",
                "transactions",
                "cash_flow_records",
                "credit_score_history",
                "payment_history",
                "spending_categories",
                "alerts",
                "liquidity_data",
            ]
        );
    }

    #[test]
    fn test_parent_declared_after_child_still_loads_first() {
        const PARENT: TableSpec = TableSpec {
            name: "parent",
            file_name: "parent.csv",
            primary_key: Some("key"),
            foreign_key: None,
            columns: &[col("key", Text)],
        };
        const CHILD: TableSpec = TableSpec {
            name: "child",
            file_name: "child.csv",
            primary_key: None,
            foreign_key: Some(ForeignKey {
                column: "parent_key",
                parent_table: "parent",
                parent_column: "key",
            }),
            columns: &[col("parent_key", Text)],
        };
        const TABLES: &[TableSpec] = &[CHILD, PARENT];

        let catalog = Catalog::new(TABLES).unwrap();
        let names: Vec<&str> = catalog.load_order().iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["parent", "child"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        const A: TableSpec = TableSpec {
            name: "a",
            file_name: "a.csv",
            primary_key: None,
            foreign_key: Some(ForeignKey {
                column: "b_ref",
                parent_table: "b",
                parent_column: "id",
            }),
            columns: &[col("b_ref", Integer)],
        };
        const B: TableSpec = TableSpec {
            name: "b",
            file_name: "b.csv",
            primary_key: None,
            foreign_key: Some(ForeignKey {
                column: "a_ref",
                parent_table: "a",
                parent_column: "id",
            }),
            columns: &[col("a_ref", Integer)],
        };
        const TABLES: &[TableSpec] = &[A, B];

        let err = Catalog::new(TABLES).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(ref msg) if msg.contains("cycle")));
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        const ORPHAN: TableSpec = TableSpec {
            name: "orphan",
            file_name: "orphan.csv",
            primary_key: None,
            foreign_key: Some(CUSTOMER_FK),
            columns: &[col("customer_user_id", Text)],
        };
        const TABLES: &[TableSpec] = &[ORPHAN];

        let err = Catalog::new(TABLES).unwrap_err();
        assert!(err.to_string().contains("unknown table 'customers'"));
    }

    #[test]
    fn test_duplicate_table_is_rejected() {
        const TABLES: &[TableSpec] = &[CUSTOMERS, CUSTOMERS];
        assert!(Catalog::new(TABLES).is_err());
    }

    #[test]
    fn test_create_sql_for_dependent_table() {
        let sql = CREDIT_SCORE_HISTORY.create_sql();

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS credit_score_history"));
        assert!(sql.contains("id INTEGER PRIMARY KEY,"));
        assert!(sql.contains("score INTEGER NOT NULL"));
        assert!(sql.contains(
            "FOREIGN KEY (customer_user_id) REFERENCES customers(user_id) ON DELETE CASCADE"
        ));
        assert!(sql.ends_with("STRICT"));
    }

    #[test]
    fn test_create_sql_for_root_table() {
        let sql = CUSTOMERS.create_sql();

        assert!(sql.contains("user_id TEXT PRIMARY KEY NOT NULL"));
        assert!(sql.contains("email TEXT,"));
        assert!(sql.contains("date_joined TEXT NOT NULL"));
        assert!(!sql.contains("id INTEGER PRIMARY KEY"));
        assert!(!sql.contains("FOREIGN KEY"));
    }

    #[test]
    fn test_insert_sql_lists_declared_columns() {
        assert_eq!(
            LIQUIDITY_DATA.insert_sql(),
            "INSERT INTO liquidity_data (customer_user_id, month, year, amount) VALUES (?1, ?2, ?3, ?4)"
        );
    }

    #[test]
    fn test_every_dependent_table_references_customers() {
        for table in RISK_MONITOR_TABLES.iter().filter(|t| !t.is_root()) {
            let fk = table.foreign_key.unwrap();
            assert_eq!(fk.parent_table, "customers", "{}", table.name);
            assert!(table.column(fk.column).is_some(), "{}", table.name);
            assert!(table.index_sql().is_some());
        }
    }
}
