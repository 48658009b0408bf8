// 📈 Customer History - monthly series, ledger entries, alerts
// Monthly series are read in insertion order, which is the source file order.

use crate::error::{PipelineError, Result};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

// ============================================================================
// MONTHLY SERIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowPoint {
    pub month: String,
    pub year: i64,
    pub total_income: f64,
    pub total_expenses: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditScorePoint {
    pub month: String,
    pub year: i64,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentPoint {
    pub month: String,
    pub year: i64,
    pub on_time_percentage: f64,
    pub late_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidityPoint {
    pub month: String,
    pub year: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingShare {
    pub category: String,
    pub percentage: f64,
    pub amount: f64,
    pub month: String,
}

/// Last `limit` rows of a per-customer table, oldest first. `None` keeps all rows.
fn recent_rows<T, F>(
    conn: &Connection,
    table: &str,
    columns: &str,
    user_id: &str,
    limit: Option<usize>,
    map: F,
) -> Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let context = || format!("reading {} for {}", table, user_id);
    let sql = format!(
        "SELECT {columns} FROM (
            SELECT id, {columns} FROM {table}
            WHERE customer_user_id = ?1
            ORDER BY id DESC
            LIMIT ?2
         ) ORDER BY id",
        columns = columns,
        table = table,
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| PipelineError::database(context(), e))?;
    // SQLite treats a negative LIMIT as unbounded
    let limit = limit.map_or(-1, |n| n as i64);
    let rows = stmt
        .query_map(params![user_id, limit], map)
        .map_err(|e| PipelineError::database(context(), e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::database(context(), e))?;

    Ok(rows)
}

pub fn get_cash_flow(conn: &Connection, user_id: &str, months: usize) -> Result<Vec<CashFlowPoint>> {
    recent_rows(
        conn,
        "cash_flow_records",
        "month, year, total_income, total_expenses",
        user_id,
        Some(months),
        |row| {
            Ok(CashFlowPoint {
                month: row.get(0)?,
                year: row.get(1)?,
                total_income: row.get(2)?,
                total_expenses: row.get(3)?,
            })
        },
    )
}

pub fn get_credit_scores(conn: &Connection, user_id: &str, months: usize) -> Result<Vec<CreditScorePoint>> {
    recent_rows(
        conn,
        "credit_score_history",
        "month, year, score",
        user_id,
        Some(months),
        |row| {
            Ok(CreditScorePoint {
                month: row.get(0)?,
                year: row.get(1)?,
                score: row.get(2)?,
            })
        },
    )
}

pub fn get_payment_history(conn: &Connection, user_id: &str, months: usize) -> Result<Vec<PaymentPoint>> {
    recent_rows(
        conn,
        "payment_history",
        "month, year, on_time_percentage, late_percentage",
        user_id,
        Some(months),
        |row| {
            Ok(PaymentPoint {
                month: row.get(0)?,
                year: row.get(1)?,
                on_time_percentage: row.get(2)?,
                late_percentage: row.get(3)?,
            })
        },
    )
}

pub fn get_liquidity(conn: &Connection, user_id: &str, months: usize) -> Result<Vec<LiquidityPoint>> {
    recent_rows(
        conn,
        "liquidity_data",
        "month, year, amount",
        user_id,
        Some(months),
        |row| {
            Ok(LiquidityPoint {
                month: row.get(0)?,
                year: row.get(1)?,
                amount: row.get(2)?,
            })
        },
    )
}

pub fn get_spending(conn: &Connection, user_id: &str) -> Result<Vec<SpendingShare>> {
    recent_rows(
        conn,
        "spending_categories",
        "category, percentage, amount, month",
        user_id,
        None,
        |row| {
            Ok(SpendingShare {
                category: row.get(0)?,
                percentage: row.get(1)?,
                amount: row.get(2)?,
                month: row.get(3)?,
            })
        },
    )
}

// ============================================================================
// LEDGER & ALERTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionEntry {
    pub transaction_date: String,
    pub description: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: String,
    pub message: String,
    pub created_at: String,
}

/// Most recent transactions first
pub fn get_recent_transactions(conn: &Connection, user_id: &str, limit: usize) -> Result<Vec<TransactionEntry>> {
    let context = || format!("reading transactions for {}", user_id);

    let mut stmt = conn
        .prepare(
            "SELECT transaction_date, description, amount, type, category
             FROM transactions
             WHERE customer_user_id = ?1
             ORDER BY transaction_date DESC, id DESC
             LIMIT ?2",
        )
        .map_err(|e| PipelineError::database(context(), e))?;

    let transactions = stmt
        .query_map(params![user_id, limit as i64], |row| {
            Ok(TransactionEntry {
                transaction_date: row.get(0)?,
                description: row.get(1)?,
                amount: row.get(2)?,
                transaction_type: row.get(3)?,
                category: row.get(4)?,
            })
        })
        .map_err(|e| PipelineError::database(context(), e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::database(context(), e))?;

    Ok(transactions)
}

/// Newest first
pub fn get_alerts(conn: &Connection, user_id: &str) -> Result<Vec<Alert>> {
    let context = || format!("reading alerts for {}", user_id);

    let mut stmt = conn
        .prepare(
            "SELECT type, message, created_at
             FROM alerts
             WHERE customer_user_id = ?1
             ORDER BY created_at DESC, id DESC",
        )
        .map_err(|e| PipelineError::database(context(), e))?;

    let alerts = stmt
        .query_map(params![user_id], |row| {
            Ok(Alert {
                alert_type: row.get(0)?,
                message: row.get(1)?,
                created_at: row.get(2)?,
            })
        })
        .map_err(|e| PipelineError::database(context(), e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::database(context(), e))?;

    Ok(alerts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_store, seed_alert, seed_credit_history, seed_customer, seed_transaction};

    #[test]
    fn test_recent_series_keeps_last_months_oldest_first() {
        let conn = memory_store();
        seed_customer(&conn, "USR-001", "Aryan Mehta");
        seed_credit_history(&conn, "USR-001");

        let scores = get_credit_scores(&conn, "USR-001", 6).unwrap();

        let months: Vec<&str> = scores.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(months, vec!["Jan", "Feb", "Mar", "Apr", "May", "Jun"]);
        assert_eq!(scores.first().unwrap().score, 690);
        assert_eq!(scores.last().unwrap().score, 665);
    }

    #[test]
    fn test_series_scoped_to_customer() {
        let conn = memory_store();
        seed_customer(&conn, "USR-001", "Aryan Mehta");
        seed_customer(&conn, "USR-002", "Priya Nair");
        seed_credit_history(&conn, "USR-002");

        assert!(get_credit_scores(&conn, "USR-001", 6).unwrap().is_empty());
        assert_eq!(get_credit_scores(&conn, "USR-002", 3).unwrap().len(), 3);
    }

    #[test]
    fn test_recent_transactions_newest_first() {
        let conn = memory_store();
        seed_customer(&conn, "USR-001", "Aryan Mehta");
        seed_transaction(&conn, "USR-001", "2026-02-06 00:00:00", "Payday Loan - MoneyTap", -20000.0);
        seed_transaction(&conn, "USR-001", "2026-02-14 00:00:00", "Salary Credit - Delayed", 45000.0);
        seed_transaction(&conn, "USR-001", "2026-02-10 00:00:00", "Quick Loan - KreditBee", -8000.0);

        let recent = get_recent_transactions(&conn, "USR-001", 2).unwrap();

        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].description, "Salary Credit - Delayed");
        assert_eq!(recent[0].transaction_type, "credit");
        assert_eq!(recent[1].description, "Quick Loan - KreditBee");
    }

    #[test]
    fn test_alerts_newest_first() {
        let conn = memory_store();
        seed_customer(&conn, "USR-001", "Aryan Mehta");
        seed_alert(&conn, "USR-001", "2026-02-01 09:00:00", "Salary delayed");
        seed_alert(&conn, "USR-001", "2026-02-12 09:00:00", "Missed EMI payment");

        let alerts = get_alerts(&conn, "USR-001").unwrap();
        assert_eq!(alerts[0].message, "Missed EMI payment");
        assert_eq!(alerts[1].message, "Salary delayed");
    }
}
