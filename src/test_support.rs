//! Shared fixtures for unit tests: an in-memory store and seed rows.

use crate::db::{configure, setup_database};
use crate::schema::Catalog;
use rusqlite::{params, Connection};

pub fn memory_store() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    configure(&conn).unwrap();
    setup_database(&conn, &Catalog::risk_monitor().unwrap()).unwrap();
    conn
}

pub fn seed_customer(conn: &Connection, user_id: &str, name: &str) {
    conn.execute(
        "INSERT INTO customers (
            user_id, name, email, phone, account_number,
            credit_score, credit_score_status, status,
            total_assets, total_liabilities, total_debt, net_worth,
            monthly_income, monthly_expenses, risk_score, risk_percentage,
            stress_level, date_joined, last_updated
        ) VALUES (?1, ?2, ?3, NULL, 'ACC123456789', 650, 'Fair', 'Critical',
            450000.0, 380000.0, 250000.0, 70000.0,
            45000.0, 52000.0, 85, 85.0,
            'High Stress', '2019-03-01 00:00:00', '2026-02-14 10:00:00')",
        params![user_id, name, format!("{}@email.com", user_id.to_lowercase())],
    )
    .unwrap();
}

/// Eight months of credit scores, Nov through Jun, dropping 5 points a month.
pub fn seed_credit_history(conn: &Connection, user_id: &str) {
    let months = [
        ("Nov", 2025),
        ("Dec", 2025),
        ("Jan", 2026),
        ("Feb", 2026),
        ("Mar", 2026),
        ("Apr", 2026),
        ("May", 2026),
        ("Jun", 2026),
    ];
    for (i, (month, year)) in months.iter().enumerate() {
        conn.execute(
            "INSERT INTO credit_score_history (customer_user_id, month, year, score)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, month, year, 700 - 5 * i as i64],
        )
        .unwrap();
    }
}

pub fn seed_transaction(conn: &Connection, user_id: &str, date: &str, description: &str, amount: f64) {
    conn.execute(
        "INSERT INTO transactions (customer_user_id, transaction_date, description, amount, type, category)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
        params![
            user_id,
            date,
            description,
            amount,
            if amount >= 0.0 { "credit" } else { "debit" }
        ],
    )
    .unwrap();
}

pub fn seed_alert(conn: &Connection, user_id: &str, created_at: &str, message: &str) {
    conn.execute(
        "INSERT INTO alerts (customer_user_id, type, message, created_at)
         VALUES (?1, 'critical', ?2, ?3)",
        params![user_id, message, created_at],
    )
    .unwrap();
}
