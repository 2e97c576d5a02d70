//! **FiscalClosing** (spec.md §4.6): closes the fiscal day, refusing if the
//! fiscal memory is already in a bad state.

use std::cell::RefCell;

use super::Operation;
use crate::console::{Answerer, Console};
use crate::error::{CashRegisterError, Smart3Error};
use crate::message::MessageData;
use crate::status::CashRegisterStatus;
use crate::operations::common::a01_answerer;

fn reject_fiscal_memory_faults(status: &CashRegisterStatus) -> Result<(), Smart3Error> {
    if status.flags.fiscal_memory_error {
        return Err(CashRegisterError::FiscalMemoryError.into());
    }
    if status.flags.fiscal_memory_full {
        return Err(CashRegisterError::FiscalMemoryFull.into());
    }
    Ok(())
}

#[derive(Default)]
pub struct FiscalClosing;

impl FiscalClosing {
    pub fn new() -> Self {
        Self
    }
}

impl Operation for FiscalClosing {
    fn name(&self) -> &'static str {
        "FiscalClosing"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn run(&mut self, console: &mut Console) -> Result<(), Smart3Error> {
        console.hello(false)?;
        let status = RefCell::new(None);
        console.answer(&mut a01_answerer(&status, "0;+3;#Z", reject_fiscal_memory_faults))?;
        console.answer(&mut Answerer::new(vec!["B45"], |_message| MessageData::from_command("0")))?;
        Ok(())
    }
}
