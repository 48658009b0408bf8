//! Shared fixture for integration tests: a temp dir holding the eight source
//! files and a destination database path.

#![allow(dead_code)]

use risk_monitor_loader::{Catalog, Config, DatabaseConfig, Pipeline, SourceConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const CUSTOMERS_CSV: &str = "\
user_id,name,email,phone,account_number,credit_score,credit_score_status,status,total_assets,total_liabilities,total_debt,net_worth,monthly_income,monthly_expenses,risk_score,risk_percentage,stress_level,date_joined,last_updated
USR-001,Aryan Mehta,aryan.mehta@email.com,+91-9876543210,ACC123456789,650,Fair,Critical,450000,380000,250000,70000,45000,52000,85,85.0,High Stress,2019-03-01,2026-02-14 10:00:00
USR-002,Priya Nair,,,ACC987654321,742,Good,Low,900000,200000,150000,700000,120000,60000,22,22.0,Low Stress,2020-07-15,2026-02-14T10:00:00Z
";

pub const TRANSACTIONS_CSV: &str = "\
customer_user_id,transaction_date,description,amount,type,category
USR-001,2026-02-14 00:00:00,Salary Credit - Delayed,45000,credit,Income
USR-001,2026-02-10 00:00:00,Quick Loan - KreditBee,-8000,debit,
USR-001,2026-02-06 00:00:00,Payday Loan - MoneyTap,-20000,debit,Loans
USR-002,2026-02-01 00:00:00,Salary Credit,120000,credit,Income
";

pub const CASH_FLOW_CSV: &str = "\
customer_user_id,month,year,total_income,total_expenses
USR-001,Jan,2026,48000,50000
USR-001,Feb,2026,45000,52000
USR-002,Feb,2026,120000,60000
";

pub const CREDIT_SCORE_CSV: &str = "\
customer_user_id,month,year,score
USR-001,Jan,2026,672
USR-001,Feb,2026,650
USR-002,Feb,2026,742
";

pub const PAYMENT_HISTORY_CSV: &str = "\
customer_user_id,month,year,on_time_percentage,late_percentage
USR-001,Jan,2026,80,20
USR-001,Feb,2026,60,40
";

pub const SPENDING_CSV: &str = "\
customer_user_id,category,percentage,amount,month
USR-001,Loan EMIs,45.5,23660,Feb
USR-001,Rent,30,15600,Feb
";

pub const ALERTS_CSV: &str = "\
customer_user_id,type,message,created_at
USR-001,critical,Missed EMI payment,2026-02-12 09:00:00
USR-001,warning,Salary credited late,2026-02-14 10:00:00
";

pub const LIQUIDITY_CSV: &str = "\
customer_user_id,month,year,amount
USR-001,Jan,2026,12000
USR-001,Feb,2026,3500
USR-002,Feb,2026,250000
";

/// Every source file with its well-formed contents, in load order.
pub const SOURCE_FILES: &[(&str, &str)] = &[
    ("customers.csv", CUSTOMERS_CSV),
    ("transactions.csv", TRANSACTIONS_CSV),
    ("cash_flow_records.csv", CASH_FLOW_CSV),
    ("credit_score_history.csv", CREDIT_SCORE_CSV),
    ("payment_history.csv", PAYMENT_HISTORY_CSV),
    ("spending_categories.csv", SPENDING_CSV),
    ("alerts.csv", ALERTS_CSV),
    ("liquidity_data.csv", LIQUIDITY_CSV),
];

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// Temp dir with all eight well-formed source files.
    pub fn new() -> Self {
        let fixture = Self::empty();
        for (file, contents) in SOURCE_FILES {
            fixture.write(file, contents);
        }
        fixture
    }

    /// Temp dir with an empty source directory.
    pub fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        Fixture { dir }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("risk_monitor.db")
    }

    pub fn write(&self, file: &str, contents: &str) {
        fs::write(self.source_dir().join(file), contents).unwrap();
    }

    /// Source file with only its header line.
    pub fn write_header_only(&self, file: &str) {
        let contents = SOURCE_FILES
            .iter()
            .find(|(name, _)| *name == file)
            .map(|(_, contents)| contents.lines().next().unwrap())
            .unwrap();
        self.write(file, &format!("{}\n", contents));
    }

    /// Append a row with the wrong number of fields.
    pub fn corrupt(&self, file: &str) {
        let path = self.source_dir().join(file);
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str("USR-001,truncated\n");
        fs::write(path, contents).unwrap();
    }

    pub fn config(&self) -> Config {
        Config {
            database: DatabaseConfig {
                path: self.db_path(),
                busy_timeout_ms: 200,
                ..DatabaseConfig::default()
            },
            source: SourceConfig {
                directory: self.source_dir(),
            },
            ..Config::default()
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.config()).unwrap()
    }

    pub fn config_file(&self) -> PathBuf {
        let path = self.dir.path().join("loader.toml");
        fs::write(
            &path,
            format!(
                "[database]\npath = {:?}\n\n[source]\ndirectory = {:?}\n",
                self.db_path().display().to_string(),
                self.source_dir().display().to_string()
            ),
        )
        .unwrap();
        path
    }
}

pub fn catalog() -> Catalog {
    Catalog::risk_monitor().unwrap()
}

pub fn data_lines(contents: &str) -> usize {
    contents.lines().skip(1).filter(|l| !l.is_empty()).count()
}

pub fn path_str(path: &Path) -> String {
    path.display().to_string()
}
