//! **WritePLUInfo** (spec.md §4.6): drives the register's B81 interactivity
//! loop, handing over one queued PLU record per exchange.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::common::{a01_answerer, no_extra_checks, report_progress, ProgressEvent, ProgressKind, ProgressSink};
use super::Operation;
use crate::console::{Answerer, Console};
use crate::error::Smart3Error;
use crate::message::MessageData;
use crate::plu::PluInfo;

pub struct WritePluInfo {
    queue: VecDeque<PluInfo>,
    progress: ProgressSink,
}

impl WritePluInfo {
    pub fn new(plus: Vec<PluInfo>, progress: ProgressSink) -> Self {
        Self { queue: plus.into_iter().collect(), progress }
    }
}

impl Operation for WritePluInfo {
    fn name(&self) -> &'static str {
        "WritePLUInfo"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn run(&mut self, console: &mut Console) -> Result<(), Smart3Error> {
        console.hello(false)?;
        let status = RefCell::new(None);
        console.answer(&mut a01_answerer(&status, "0;+4;*G", no_extra_checks))?;

        let total = self.queue.len();
        let mut count = 0usize;
        loop {
            let done = RefCell::new(false);
            let queue = &mut self.queue;
            let progress = &mut self.progress;
            let mut answerer = Answerer::new(vec!["B81"], |_message| {
                match queue.pop_front() {
                    Some(plu) => {
                        count += 1;
                        report_progress(
                            progress,
                            ProgressEvent {
                                kind: ProgressKind::Writing,
                                current_item: Some(plu.id().to_string()),
                                current_count: count,
                                total_count: total,
                            },
                        );
                        MessageData::from_command(&format!(
                            "{}:{}:{}:{}:0:0:0:{}:{}",
                            plu.id(),
                            plu.price_cents(),
                            plu.department(),
                            plu.name(),
                            plu.tax(),
                            plu.macro_code(),
                        ))
                    }
                    None => {
                        *done.borrow_mut() = true;
                        MessageData::from_command("*")
                    }
                }
            });
            console.answer(&mut answerer)?;
            if *done.borrow() {
                break;
            }
        }
        Ok(())
    }
}
