// 👤 Customer Entity - the referential root
// Every other table hangs off `user_id`.

use crate::error::{PipelineError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

// ============================================================================
// CUSTOMER
// ============================================================================

/// Identity plus the latest financial snapshot of one customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub user_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub account_number: String,

    pub credit_score: i64,
    pub credit_score_status: String,
    /// Risk band: Critical, High, Medium, Low
    pub status: String,

    pub total_assets: f64,
    pub total_liabilities: f64,
    pub total_debt: f64,
    pub net_worth: f64,
    pub monthly_income: f64,
    pub monthly_expenses: f64,

    pub risk_score: i64,
    pub risk_percentage: f64,
    pub stress_level: String,

    pub date_joined: String,
    pub last_updated: String,
}

const CUSTOMER_COLUMNS: &str = "user_id, name, email, phone, account_number,
    credit_score, credit_score_status, status,
    total_assets, total_liabilities, total_debt, net_worth,
    monthly_income, monthly_expenses, risk_score, risk_percentage,
    stress_level, date_joined, last_updated";

impl Customer {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Customer {
            user_id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            account_number: row.get(4)?,
            credit_score: row.get(5)?,
            credit_score_status: row.get(6)?,
            status: row.get(7)?,
            total_assets: row.get(8)?,
            total_liabilities: row.get(9)?,
            total_debt: row.get(10)?,
            net_worth: row.get(11)?,
            monthly_income: row.get(12)?,
            monthly_expenses: row.get(13)?,
            risk_score: row.get(14)?,
            risk_percentage: row.get(15)?,
            stress_level: row.get(16)?,
            date_joined: row.get(17)?,
            last_updated: row.get(18)?,
        })
    }

    /// Monthly debt burden: total debt over one month of income
    pub fn debt_to_income(&self) -> Option<f64> {
        (self.monthly_income > 0.0).then(|| self.total_debt / self.monthly_income)
    }

    /// Income left after expenses; negative when the customer runs a deficit
    pub fn monthly_surplus(&self) -> f64 {
        self.monthly_income - self.monthly_expenses
    }
}

/// Row of the customer list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSummary {
    pub user_id: String,
    pub name: String,
    pub status: String,
    pub credit_score: i64,
    pub risk_percentage: f64,
}

// ============================================================================
// QUERIES
// ============================================================================

pub fn get_customer(conn: &Connection, user_id: &str) -> Result<Option<Customer>> {
    conn.query_row(
        &format!("SELECT {} FROM customers WHERE user_id = ?1", CUSTOMER_COLUMNS),
        params![user_id],
        Customer::from_row,
    )
    .optional()
    .map_err(|e| PipelineError::database(format!("reading customer {}", user_id), e))
}

/// All customers in load order
pub fn list_customers(conn: &Connection) -> Result<Vec<CustomerSummary>> {
    let context = || "listing customers".to_string();

    let mut stmt = conn
        .prepare(
            "SELECT user_id, name, status, credit_score, risk_percentage
             FROM customers
             ORDER BY rowid",
        )
        .map_err(|e| PipelineError::database(context(), e))?;

    let customers = stmt
        .query_map([], |row| {
            Ok(CustomerSummary {
                user_id: row.get(0)?,
                name: row.get(1)?,
                status: row.get(2)?,
                credit_score: row.get(3)?,
                risk_percentage: row.get(4)?,
            })
        })
        .map_err(|e| PipelineError::database(context(), e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::database(context(), e))?;

    Ok(customers)
}
