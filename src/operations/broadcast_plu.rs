//! **BroadcastPLUInfo** (spec.md §4.6): bulk-loads PLU records over the
//! unaddressed broadcast channel, in blocks the register confirms with B99.

use std::cell::RefCell;
use std::collections::BTreeMap;

use super::common::{a01_answerer, no_extra_checks, report_progress, ProgressEvent, ProgressKind, ProgressSink};
use super::Operation;
use crate::console::{Answerer, Console};
use crate::error::Smart3Error;
use crate::message::MessageData;
use crate::plu::PluInfo;

const RECORD_LEN: usize = 61;

/// Packs one PLU into the fixed 61-byte broadcast record (spec.md §4.6).
fn encode_record(plu: &PluInfo) -> [u8; RECORD_LEN] {
    let mut record = [0u8; RECORD_LEN];

    let id = plu.id().as_bytes();
    record[0..id.len()].copy_from_slice(id);

    let price100 = plu.price_cents().to_le_bytes();
    record[13..17].copy_from_slice(&price100);

    record[17] = plu.department() as u8;

    let name = plu.name().as_bytes();
    record[18..18 + name.len()].copy_from_slice(name);

    // offsets 39..55 stay zero (unused).
    record[55] = (plu.tax() - 1) as u8;
    record[56] = plu.macro_code() as u8;
    // offsets 57..61 stay zero.

    record
}

/// Deduplicates by id (first occurrence wins) and sorts ordinal-ascending,
/// matching the ordering `PluInfo`'s `Ord` already gives by id alone.
fn prepare(plus: Vec<PluInfo>) -> Vec<PluInfo> {
    let mut by_id: BTreeMap<String, PluInfo> = BTreeMap::new();
    for plu in plus {
        by_id.entry(plu.id().to_string()).or_insert(plu);
    }
    by_id.into_values().collect()
}

pub struct BroadcastPluInfo {
    plus: Vec<PluInfo>,
    progress: ProgressSink,
    block_size: usize,
    settle_delay: std::time::Duration,
}

impl BroadcastPluInfo {
    pub fn new(
        plus: Vec<PluInfo>,
        progress: ProgressSink,
        block_size: usize,
        settle_delay: std::time::Duration,
    ) -> Self {
        Self { plus: prepare(plus), progress, block_size, settle_delay }
    }
}

impl Operation for BroadcastPluInfo {
    fn name(&self) -> &'static str {
        "BroadcastPLUInfo"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn run(&mut self, console: &mut Console) -> Result<(), Smart3Error> {
        console.hello(false)?;
        let status = RefCell::new(None);
        let total = self.plus.len();
        console.answer(&mut a01_answerer(&status, format!("0;+4;#z{total}"), no_extra_checks))?;

        let mut cursor = 0usize;
        let mut sent_overall = 0usize;
        loop {
            let remaining = total - cursor;
            if remaining == 0 {
                console.broadcast(&[b'*'])?;
                std::thread::sleep(self.settle_delay);
                return Ok(());
            }
            let sent = remaining.min(self.block_size);
            for plu in &self.plus[cursor..cursor + sent] {
                let record = encode_record(plu);
                console.broadcast(&record)?;
                sent_overall += 1;
                report_progress(
                    &mut self.progress,
                    ProgressEvent {
                        kind: ProgressKind::Writing,
                        current_item: Some(plu.id().to_string()),
                        current_count: sent_overall,
                        total_count: total,
                    },
                );
            }
            console.broadcast(&[b'?'])?;

            let new_cursor = RefCell::new(cursor);
            let mut answerer = Answerer::new(vec!["B99"], |message| {
                let accepted: usize = message.field(1).and_then(|f| f.trim().parse().ok()).unwrap_or(0);
                let confirmed = if accepted >= cursor + sent { cursor + sent } else { cursor };
                *new_cursor.borrow_mut() = confirmed;
                MessageData::from_command(&confirmed.to_string())
            });
            console.answer(&mut answerer)?;
            cursor = new_cursor.into_inner();
        }
    }
}
