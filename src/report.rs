//! [`FinancialReport`] — the end-of-period summary parsed from `C22`
//! records (spec.md §3, §4.6).

use rust_decimal::Decimal;

/// Aggregated totals from a `FinancialReport` operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FinancialReport {
    pub tickets_issued: u64,
    pub items_sold: u64,
    pub payment_amount: Decimal,
    pub inflow_amount: Decimal,
    pub outflow_amount: Decimal,
    pub drawer_amount: Decimal,
    pub payments_in_period: Decimal,
}
