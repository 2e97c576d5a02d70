//! **Startup** (spec.md §4.6): locks the keyboard, enters Programming mode,
//! and drains the register's connectability records.

use std::cell::RefCell;

use super::common::a01_answerer;
use super::Operation;
use crate::console::{Console, Listener};
use crate::error::{CashRegisterError, Smart3Error};
use crate::status::ConnectabilityProgramming;

/// Runs once at the start of a worker's session (spec.md §4.7).
#[derive(Default)]
pub struct Startup {
    connectability: Option<ConnectabilityProgramming>,
}

impl Startup {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last `C24` record read, once [`Operation::run`] has succeeded.
    /// `Shutdown` needs this to know how long to wait for disconnection.
    pub fn connectability(&self) -> Option<&ConnectabilityProgramming> {
        self.connectability.as_ref()
    }
}

fn reject_open_ticket(status: &crate::status::CashRegisterStatus) -> Result<(), Smart3Error> {
    if status.flags.ticket_open || status.flags.non_fiscal_ticket_open {
        return Err(CashRegisterError::TicketOpen.into());
    }
    if status.flags.key_striking_started {
        return Err(CashRegisterError::KeyStrikingStarted.into());
    }
    Ok(())
}

impl Operation for Startup {
    fn name(&self) -> &'static str {
        "Startup"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn run(&mut self, console: &mut Console) -> Result<(), Smart3Error> {
        console.hello(false)?;
        let status = RefCell::new(None);
        console.answer(&mut a01_answerer(&status, "0;*2;+4;&m", reject_open_ticket))?;

        let last = RefCell::new(None);
        let done = RefCell::new(false);
        let mut listener = Listener::new(vec!["C24"], |message| {
            if ConnectabilityProgramming::is_terminator(message) {
                *done.borrow_mut() = true;
                return Ok(());
            }
            *last.borrow_mut() = Some(ConnectabilityProgramming::parse(message)?);
            Ok(())
        });
        loop {
            console.listen(&mut listener)?;
            if *done.borrow() {
                break;
            }
        }
        self.connectability = last.into_inner();
        Ok(())
    }
}
