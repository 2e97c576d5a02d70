//! **Keepalive** (spec.md §4.6): the shortest scripted conversation — a
//! hello answered with the default command, nothing else.

use std::cell::RefCell;

use super::common::{a01_answerer, no_extra_checks};
use super::Operation;
use crate::console::Console;
use crate::error::Smart3Error;

#[derive(Default)]
pub struct Keepalive;

impl Keepalive {
    pub fn new() -> Self {
        Self
    }
}

impl Operation for Keepalive {
    fn name(&self) -> &'static str {
        "Keepalive"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn run(&mut self, console: &mut Console) -> Result<(), Smart3Error> {
        console.hello(false)?;
        let status = RefCell::new(None);
        console.answer(&mut a01_answerer(&status, "0", no_extra_checks))?;
        Ok(())
    }
}
