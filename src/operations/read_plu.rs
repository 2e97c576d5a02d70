//! **ReadPLUInfo** (spec.md §4.6): streams the register's PLU table for an
//! id range, C08 record by C08 record.

use std::cell::RefCell;

use rust_decimal::Decimal;

use super::common::{a01_answerer, no_extra_checks, report_progress, ProgressEvent, ProgressKind, ProgressSink};
use super::Operation;
use crate::console::{Console, Listener};
use crate::error::{ProtocolError, Smart3Error};
use crate::message::MessageData;
use crate::plu::PluInfo;

/// Inserts a decimal point two positions from the right of a digit run,
/// matching the register's fixed-point price encoding (spec.md §4.6).
fn parse_fixed_point_price(raw: &str) -> Option<Decimal> {
    if raw.len() < 3 {
        let padded = format!("{:0>3}", raw);
        return parse_fixed_point_price(&padded);
    }
    let (whole, cents) = raw.split_at(raw.len() - 2);
    format!("{whole}.{cents}").parse().ok()
}

fn record_from_message(message: &MessageData) -> Result<PluInfo, Smart3Error> {
    let field = |index: usize| {
        message.field(index).ok_or_else(|| {
            Smart3Error::Protocol(ProtocolError::UnparseableField {
                message_type: "C08".to_string(),
                field: index,
                value: "<missing>".to_string(),
            })
        })
    };
    let unparseable = |index: usize, value: &str| {
        Smart3Error::Protocol(ProtocolError::UnparseableField {
            message_type: "C08".to_string(),
            field: index,
            value: value.to_string(),
        })
    };

    let id = field(3)?;
    let price_raw = field(4)?;
    let department_raw = field(5)?;
    let name = field(6)?;
    let tax_raw = field(10)?;
    let macro_raw = field(11)?;

    let price = parse_fixed_point_price(price_raw).ok_or_else(|| unparseable(4, price_raw))?;
    let department: u32 = department_raw.trim().parse().map_err(|_| unparseable(5, department_raw))?;
    let tax: u32 = tax_raw.trim().parse().map_err(|_| unparseable(10, tax_raw))?;
    let macro_code: u32 = macro_raw.trim().parse().map_err(|_| unparseable(11, macro_raw))?;

    PluInfo::new(id, name, price, department, tax, macro_code, 1)
}

/// Reads every PLU record in `[from, to]` (ordinal-ascending), emitting a
/// progress event per record with an unknown (zero) total.
pub struct ReadPluInfo {
    from: String,
    to: String,
    progress: ProgressSink,
    results: Vec<PluInfo>,
}

impl ReadPluInfo {
    pub fn new(from: impl Into<String>, to: impl Into<String>, progress: ProgressSink) -> Self {
        let mut from = from.into();
        let mut to = to.into();
        if from > to {
            std::mem::swap(&mut from, &mut to);
        }
        Self { from, to, progress, results: Vec::new() }
    }

    pub fn results(&self) -> &[PluInfo] {
        &self.results
    }

    pub fn into_results(self) -> Vec<PluInfo> {
        self.results
    }
}

impl Operation for ReadPluInfo {
    fn name(&self) -> &'static str {
        "ReadPLUInfo"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn run(&mut self, console: &mut Console) -> Result<(), Smart3Error> {
        console.hello(false)?;
        let status = RefCell::new(None);
        let reply = format!("0;+4;&M{}:{}", self.from, self.to);
        console.answer(&mut a01_answerer(&status, reply, no_extra_checks))?;

        let results = RefCell::new(Vec::new());
        let done = RefCell::new(false);
        let mut count = 0usize;
        let progress = &mut self.progress;
        let mut listener = Listener::new(vec!["C08"], |message| {
            if message.field(3) == Some("*") {
                *done.borrow_mut() = true;
                return Ok(());
            }
            let plu = record_from_message(message)?;
            count += 1;
            report_progress(
                progress,
                ProgressEvent {
                    kind: ProgressKind::Reading,
                    current_item: Some(plu.id().to_string()),
                    current_count: count,
                    total_count: 0,
                },
            );
            results.borrow_mut().push(plu);
            Ok(())
        });
        loop {
            console.listen(&mut listener)?;
            if *done.borrow() {
                break;
            }
        }
        self.results = results.into_inner();
        Ok(())
    }
}
