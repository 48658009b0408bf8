// Entity Models - read side of the eight tables
//
// The loader writes rows generically from the catalog; these typed views are
// what downstream readers (snapshot, server) work with.

pub mod customer;
pub mod history;

pub use customer::{get_customer, list_customers, Customer, CustomerSummary};
pub use history::{
    get_alerts, get_cash_flow, get_credit_scores, get_liquidity, get_payment_history,
    get_recent_transactions, get_spending, Alert, CashFlowPoint, CreditScorePoint, LiquidityPoint,
    PaymentPoint, SpendingShare, TransactionEntry,
};
