//! **Shutdown** (spec.md §4.6): unlocks the keyboard, requests a final
//! hello, then waits out the register's own disconnection timer.

use std::cell::RefCell;
use std::time::Duration;

use log::debug;

use super::common::{a01_answerer, no_extra_checks};
use super::Operation;
use crate::console::{Answerer, Console};
use crate::error::Smart3Error;
use crate::message::MessageData;
use crate::status::ConnectabilityProgramming;

/// Runs once as a worker's session tears down (spec.md §4.7). Needs the
/// connectability record `Startup` read, so the manager threads it through.
pub struct Shutdown {
    connectability: Option<ConnectabilityProgramming>,
}

impl Shutdown {
    pub fn new(connectability: Option<ConnectabilityProgramming>) -> Self {
        Self { connectability }
    }
}

impl Operation for Shutdown {
    fn name(&self) -> &'static str {
        "Shutdown"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn run(&mut self, console: &mut Console) -> Result<(), Smart3Error> {
        console.hello(false)?;
        let status = RefCell::new(None);
        console.answer(&mut a01_answerer(&status, "0;+0;*3", no_extra_checks))?;
        console.answer(&mut Answerer::new(vec!["B23"], |_message| MessageData::from_command("0;#A")))?;

        let retransmissions = self.connectability.as_ref().map(|c| c.retransmission_count).unwrap_or(0);
        for _ in 0..=retransmissions {
            if let Err(e) = console.swallow() {
                debug!("shutdown: swallow absorbed nothing more ({e})");
                break;
            }
        }

        let timeout = self
            .connectability
            .as_ref()
            .map(|c| Duration::from_millis(c.timeout_milliseconds))
            .unwrap_or(Duration::from_millis(0));
        std::thread::sleep(timeout);
        Ok(())
    }
}
