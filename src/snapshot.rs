// 🗂️ Customer Snapshot - everything a dashboard needs for one customer
// Assembled read-only from the last committed reload.

use crate::entities::{
    get_alerts, get_cash_flow, get_credit_scores, get_customer, get_liquidity,
    get_payment_history, get_recent_transactions, get_spending, Alert, CashFlowPoint,
    CreditScorePoint, Customer, LiquidityPoint, PaymentPoint, SpendingShare, TransactionEntry,
};
use crate::error::Result;
use rusqlite::Connection;
use serde::Serialize;

/// Months kept per monthly series
pub const SERIES_MONTHS: usize = 6;

/// Transactions kept in the recent ledger
pub const RECENT_TRANSACTIONS: usize = 5;

/// Figures derived from the loaded rows, served alongside them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskIndicators {
    /// `None` when the customer has no income on record
    pub debt_to_income: Option<f64>,
    pub monthly_surplus: f64,
    /// Credit score change across the series window
    pub credit_score_trend: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSnapshot {
    pub customer: Customer,
    pub indicators: RiskIndicators,
    pub cash_flow: Vec<CashFlowPoint>,
    pub credit_scores: Vec<CreditScorePoint>,
    pub payment_history: Vec<PaymentPoint>,
    pub liquidity: Vec<LiquidityPoint>,
    pub spending: Vec<SpendingShare>,
    pub recent_transactions: Vec<TransactionEntry>,
    pub alerts: Vec<Alert>,
}

fn credit_score_trend(scores: &[CreditScorePoint]) -> Option<i64> {
    let first = scores.first()?;
    let last = scores.last()?;
    Some(last.score - first.score)
}

/// `None` when the customer does not exist.
pub fn load_snapshot(conn: &Connection, user_id: &str) -> Result<Option<CustomerSnapshot>> {
    let customer = match get_customer(conn, user_id)? {
        Some(customer) => customer,
        None => return Ok(None),
    };

    let credit_scores = get_credit_scores(conn, user_id, SERIES_MONTHS)?;
    let indicators = RiskIndicators {
        debt_to_income: customer.debt_to_income(),
        monthly_surplus: customer.monthly_surplus(),
        credit_score_trend: credit_score_trend(&credit_scores),
    };

    Ok(Some(CustomerSnapshot {
        indicators,
        cash_flow: get_cash_flow(conn, user_id, SERIES_MONTHS)?,
        credit_scores,
        payment_history: get_payment_history(conn, user_id, SERIES_MONTHS)?,
        liquidity: get_liquidity(conn, user_id, SERIES_MONTHS)?,
        spending: get_spending(conn, user_id)?,
        recent_transactions: get_recent_transactions(conn, user_id, RECENT_TRANSACTIONS)?,
        alerts: get_alerts(conn, user_id)?,
        customer,
    }))
}
