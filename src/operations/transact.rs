//! **Transact** (spec.md §4.6): drives a sale through the register's
//! keyboard-simulation interactivity — clear, sell each item, subtotal,
//! tender payment, close the ticket.

use std::cell::RefCell;
use std::collections::VecDeque;

use rust_decimal::Decimal;

use super::common::{a01_answerer, no_extra_checks};
use super::Operation;
use crate::console::{Answerer, Console};
use crate::error::Smart3Error;
use crate::keyboard;
use crate::message::MessageData;
use crate::plu::PluInfo;

fn keyboard_reply(sequence: &str) -> Result<MessageData, Smart3Error> {
    MessageData::from_command(&keyboard::encode_command(sequence, false)?)
}

pub struct Transact {
    items: VecDeque<PluInfo>,
    payment: Decimal,
}

impl Transact {
    pub fn new(items: Vec<PluInfo>, payment: Decimal) -> Self {
        Self { items: items.into_iter().collect(), payment }
    }
}

impl Operation for Transact {
    fn name(&self) -> &'static str {
        "Transact"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn run(&mut self, console: &mut Console) -> Result<(), Smart3Error> {
        console.hello(false)?;
        let status = RefCell::new(None);
        console.answer(&mut a01_answerer(&status, "0;+1", no_extra_checks))?;

        let first = self
            .items
            .pop_front()
            .ok_or_else(|| Smart3Error::InvalidArgument("Transact requires at least one item".into()))?;
        console.answer(&mut Answerer::new(vec!["B23"], |_message| {
            keyboard_reply(&format!("$CLEAR$$CLEAR${}*{}$PLU$", first.quantity(), first.id()))
        }))?;

        loop {
            let items = &mut self.items;
            let done = RefCell::new(false);
            let mut b10 = Answerer::new(vec!["B10"], |_message| MessageData::from_command("0"));
            let mut b14 = Answerer::new(vec!["B14"], |_message| match items.pop_front() {
                Some(next) => keyboard_reply(&format!("{}*{}$PLU$", next.quantity(), next.id())),
                None => {
                    *done.borrow_mut() = true;
                    keyboard_reply("$SUBTOTAL$")
                }
            });
            console.answer_any(&mut [b10, b14])?;
            if *done.borrow() {
                break;
            }
        }

        console.answer(&mut Answerer::new(vec!["B15"], |_message| {
            keyboard_reply(&format!("{:.2}$TOTAL$", self.payment))
        }))?;
        console.answer(&mut Answerer::new(vec!["B17"], |_message| MessageData::from_command("0")))?;
        console.answer(&mut Answerer::new(vec!["B18"], |_message| MessageData::from_command("0")))?;
        Ok(())
    }
}
