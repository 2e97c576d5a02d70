//! **FinancialReport** (spec.md §4.6): aggregates the register's C22
//! record stream into totals.

use std::cell::RefCell;

use rust_decimal::Decimal;

use super::common::{a01_answerer, no_extra_checks};
use super::Operation;
use crate::console::{Console, Listener};
use crate::error::Smart3Error;
use crate::message::MessageData;
use crate::report::FinancialReport;

/// Sums fields [5, 7, 9, ...] up to (but excluding) the trailing operator
/// and document fields, each divided by 100 (spec.md §4.6).
fn sum_amount_fields(message: &MessageData) -> Decimal {
    let fields = message.fields();
    let amount_fields_end = fields.len().saturating_sub(2);
    let mut total = Decimal::ZERO;
    let mut index = 5;
    while index < amount_fields_end {
        if let Some(raw) = fields.get(index) {
            if let Ok(value) = raw.trim().parse::<Decimal>() {
                total += value;
            }
        }
        index += 2;
    }
    total / Decimal::ONE_HUNDRED
}

pub struct FinancialReportOp {
    report: FinancialReport,
}

impl FinancialReportOp {
    pub fn new() -> Self {
        Self { report: FinancialReport::default() }
    }

    pub fn report(&self) -> &FinancialReport {
        &self.report
    }

    pub fn into_report(self) -> FinancialReport {
        self.report
    }
}

impl Default for FinancialReportOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for FinancialReportOp {
    fn name(&self) -> &'static str {
        "FinancialReport"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn run(&mut self, console: &mut Console) -> Result<(), Smart3Error> {
        console.hello(false)?;
        let status = RefCell::new(None);
        console.answer(&mut a01_answerer(&status, "0;+2;*f", no_extra_checks))?;

        let report = RefCell::new(FinancialReport::default());
        let done = RefCell::new(false);
        let mut listener = Listener::new(vec!["C22"], |message| {
            let record_id = message.field(3).unwrap_or("");
            if record_id == "*" {
                *done.borrow_mut() = true;
                return Ok(());
            }
            let mut r = report.borrow_mut();
            match record_id {
                "0" => {
                    r.tickets_issued = message.field(1).and_then(|f| f.trim().parse().ok()).unwrap_or(0);
                    r.items_sold = message.field(2).and_then(|f| f.trim().parse().ok()).unwrap_or(0);
                }
                "4*" => r.payment_amount += sum_amount_fields(message),
                "6*" => r.inflow_amount += sum_amount_fields(message),
                "7*" => r.outflow_amount += sum_amount_fields(message),
                "8*" => r.drawer_amount += sum_amount_fields(message),
                "9*" => r.payments_in_period += sum_amount_fields(message),
                _ => {}
            }
            Ok(())
        });
        loop {
            console.listen(&mut listener)?;
            if *done.borrow() {
                break;
            }
        }
        self.report = report.into_inner();
        Ok(())
    }
}
