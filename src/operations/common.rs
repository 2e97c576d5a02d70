//! Shared A01/B23 handling and progress reporting (spec.md §4.6's opening
//! paragraph, §9's design note on composition over an inheritance base class).

use crate::console::Answerer;
use crate::error::{CashRegisterError, Smart3Error};
use crate::message::MessageData;
use crate::status::CashRegisterStatus;

/// The hello-derived state accumulated across an operation's lifetime.
/// Handed to every operation by value; operations that care about the
/// register's connectability settings (Shutdown) read it back out after
/// running.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    pub status: Option<CashRegisterStatus>,
}

/// Checks the two status flags every operation's A01 handler checks,
/// regardless of what else it checks (spec.md §4.6).
pub fn check_common_a01(status: &CashRegisterStatus) -> Result<(), Smart3Error> {
    if status.flags.operating_error {
        return Err(CashRegisterError::OperatingError.into());
    }
    if status.flags.hardware_fault {
        return Err(CashRegisterError::HardwareFault.into());
    }
    Ok(())
}

/// Builds the A01 answerer common to every operation: parse the status
/// block, run the common checks plus `extra`, record the status, and reply
/// with `reply_command`.
pub fn a01_answerer<'a>(
    status_out: &'a std::cell::RefCell<Option<CashRegisterStatus>>,
    reply_command: impl Into<String>,
    extra: impl Fn(&CashRegisterStatus) -> Result<(), Smart3Error> + 'a,
) -> Answerer<'a> {
    let reply_command = reply_command.into();
    Answerer::new(vec!["A01"], move |message| {
        let status = CashRegisterStatus::parse(message)?;
        check_common_a01(&status)?;
        extra(&status)?;
        *status_out.borrow_mut() = Some(status);
        MessageData::from_command(&reply_command)
    })
}

/// The default B23 handler: an empty command, no status side effects.
pub fn b23_default_answerer<'a>() -> Answerer<'a> {
    Answerer::new(vec!["B23"], |_message| MessageData::from_command("0"))
}

/// No additional A01 checks beyond the common pair.
pub fn no_extra_checks(_status: &CashRegisterStatus) -> Result<(), Smart3Error> {
    Ok(())
}

/// What an operation was doing when it reported progress (spec.md §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressKind {
    Reading,
    Writing,
    Selling,
}

/// One unit of progress reported by a long-running operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub current_item: Option<String>,
    pub current_count: usize,
    pub total_count: usize,
}

/// An optional progress sink. Boxed so operations don't need a type
/// parameter just to stay generic over "some closure, or none"; `'static`
/// because operations themselves are queued across threads.
pub type ProgressSink = Option<Box<dyn FnMut(ProgressEvent) + Send + 'static>>;

pub fn report_progress(sink: &mut ProgressSink, event: ProgressEvent) {
    if let Some(f) = sink {
        f(event);
    }
}
