//! [`Transaction`]: the multi-phase sale controller (spec.md §4.8).
//!
//! `Initialized → Starting → {Rejected | Waiting} → Completing →
//! {Completed | Faulted} | Canceled`. Sub-operations (item lookups,
//! keepalives, the final PLU write-back and sale) are enqueued onto the
//! same [`OperationManager`] every other caller uses; while a transaction
//! is active, the process-wide active-transaction slot refuses any other
//! one from starting (spec.md §5).

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use rust_decimal::Decimal;

use crate::error::{CashRegisterError, Smart3Error};
use crate::manager::{OperationManager, SharedError};
use crate::operations::{Keepalive, Operation, ReadPluInfo, Transact, WritePluInfo};
use crate::plu::PluInfo;

/// The transaction's current phase (spec.md §4.8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    Initialized,
    Starting,
    Rejected,
    Waiting,
    Completing,
    Completed,
    Faulted,
    Canceled,
}

/// The process-wide "one transaction at a time" slot (spec.md §5).
static ACTIVE_TRANSACTION: Mutex<bool> = Mutex::new(false);

fn claim_active_transaction() -> Result<(), SharedError> {
    let mut active = ACTIVE_TRANSACTION.lock().unwrap();
    if *active {
        return Err(Arc::new(CashRegisterError::TransactionOpen.into()));
    }
    *active = true;
    Ok(())
}

fn release_active_transaction() {
    *ACTIVE_TRANSACTION.lock().unwrap() = false;
}

fn plu_fields_equal(a: &PluInfo, b: &PluInfo) -> bool {
    a.id() == b.id()
        && a.name() == b.name()
        && a.price() == b.price()
        && a.department() == b.department()
        && a.tax() == b.tax()
        && a.macro_code() == b.macro_code()
        && a.quantity() == b.quantity()
}

struct KeepaliveState {
    stop_requested: bool,
    error: Option<SharedError>,
    thread: Option<JoinHandle<()>>,
}

/// Whether a pending cancellation request can still land on a checkpoint.
/// `Closed` once the last checkpoint before an irreversible step (the
/// actual `Transact` enqueue) has passed — from there on cancellation must
/// be denied promptly rather than block on a checkpoint that will never
/// come (spec.md §4.8).
#[derive(Clone, Copy, PartialEq, Eq)]
enum CancelWindow {
    Open,
    Requested,
    Closed,
}

struct Shared {
    state: Mutex<TransactionState>,
    cancel: Mutex<CancelWindow>,
    cancel_acked: Condvar,
    continued: Mutex<Vec<PluInfo>>,
    baseline: Mutex<Vec<PluInfo>>,
    discontinued: Mutex<Vec<String>>,
    keepalive: Mutex<KeepaliveState>,
    keepalive_condvar: Condvar,
}

/// A handle to one sale. Cheaply `Clone` — every clone observes and drives
/// the same underlying state machine.
#[derive(Clone)]
pub struct Transaction {
    manager: OperationManager,
    shared: Arc<Shared>,
}

impl Transaction {
    pub fn new(manager: OperationManager) -> Self {
        Self {
            manager,
            shared: Arc::new(Shared {
                state: Mutex::new(TransactionState::Initialized),
                cancel: Mutex::new(CancelWindow::Open),
                cancel_acked: Condvar::new(),
                continued: Mutex::new(Vec::new()),
                baseline: Mutex::new(Vec::new()),
                discontinued: Mutex::new(Vec::new()),
                keepalive: Mutex::new(KeepaliveState { stop_requested: false, error: None, thread: None }),
                keepalive_condvar: Condvar::new(),
            }),
        }
    }

    pub fn state(&self) -> TransactionState {
        *self.shared.state.lock().unwrap()
    }

    /// A snapshot of the items found so far (populated once `begin()`
    /// returns `Ok(true)`).
    pub fn continued_items(&self) -> Vec<PluInfo> {
        self.shared.continued.lock().unwrap().clone()
    }

    /// The sale ids `begin()` could not find on the register.
    pub fn discontinued_ids(&self) -> Vec<String> {
        self.shared.discontinued.lock().unwrap().clone()
    }

    /// Lets the caller adjust a continued item's quantity while `Waiting`;
    /// `end()` detects the change and writes it back before the sale.
    pub fn set_quantity(&self, plu_id: &str, quantity: u32) -> Result<(), SharedError> {
        let mut continued = self.shared.continued.lock().unwrap();
        let item = continued
            .iter_mut()
            .find(|p| p.id() == plu_id)
            .ok_or_else(|| Arc::new(Smart3Error::InvalidArgument(format!("{plu_id} is not part of this transaction"))))?;
        let updated = item.with_quantity(quantity).map_err(Arc::new)?;
        *item = updated;
        Ok(())
    }

    /// Checked at every sub-operation boundary of `begin()`/`end()`: clears
    /// and acknowledges a pending cancellation request, raising `Canceled`.
    fn checkpoint(&self) -> Result<(), SharedError> {
        let mut cancel = self.shared.cancel.lock().unwrap();
        if *cancel == CancelWindow::Requested {
            *cancel = CancelWindow::Open;
            self.shared.cancel_acked.notify_all();
            return Err(Arc::new(Smart3Error::Canceled));
        }
        Ok(())
    }

    /// The last checkpoint before an irreversible step (the actual
    /// `Transact` enqueue in `run_end`). Acknowledges a cancellation
    /// already in flight same as `checkpoint()`, but otherwise closes the
    /// window atomically in the same locked section: any `cancel()` call
    /// that arrives after this point is denied immediately rather than
    /// left to block on a checkpoint that will never run.
    fn final_checkpoint(&self) -> Result<(), SharedError> {
        let mut cancel = self.shared.cancel.lock().unwrap();
        match *cancel {
            CancelWindow::Requested => {
                *cancel = CancelWindow::Open;
                self.shared.cancel_acked.notify_all();
                Err(Arc::new(Smart3Error::Canceled))
            }
            CancelWindow::Open | CancelWindow::Closed => {
                *cancel = CancelWindow::Closed;
                Ok(())
            }
        }
    }

    /// `Initialized → Starting → {Rejected | Waiting}` (spec.md §4.8).
    pub fn begin(&self, items: Vec<(String, u32)>) -> Result<bool, SharedError> {
        {
            let mut state = self.shared.state.lock().unwrap();
            if *state != TransactionState::Initialized {
                return Err(Arc::new(Smart3Error::InvalidOperation(
                    "begin() called outside the Initialized state".into(),
                )));
            }
            *state = TransactionState::Starting;
        }
        claim_active_transaction()?;

        let result = self.run_begin(items);
        match &result {
            Ok(true) => {}
            Ok(false) => release_active_transaction(),
            Err(e) => {
                release_active_transaction();
                *self.shared.state.lock().unwrap() = terminal_state_for(e);
            }
        }
        result
    }

    fn run_begin(&self, items: Vec<(String, u32)>) -> Result<bool, SharedError> {
        let mut grouped: BTreeMap<String, u32> = BTreeMap::new();
        for (id, quantity) in items {
            *grouped.entry(id).or_insert(0) += quantity;
        }

        let mut continued = Vec::new();
        let mut discontinued = Vec::new();
        for (id, quantity) in grouped {
            self.checkpoint()?;
            let (op, outcome) = self.manager.enqueue(Box::new(ReadPluInfo::new(id.clone(), id.clone(), None))).wait();
            outcome?;
            let read = op
                .as_any()
                .downcast_ref::<ReadPluInfo>()
                .expect("enqueued a ReadPluInfo; the manager must hand the same type back");
            match read.results().first() {
                Some(found) => continued.push(found.clone().with_quantity(quantity).map_err(Arc::new)?),
                None => discontinued.push(id),
            }
        }

        if !discontinued.is_empty() {
            *self.shared.discontinued.lock().unwrap() = discontinued;
            *self.shared.state.lock().unwrap() = TransactionState::Rejected;
            return Ok(false);
        }

        *self.shared.baseline.lock().unwrap() = continued.clone();
        *self.shared.continued.lock().unwrap() = continued;
        *self.shared.state.lock().unwrap() = TransactionState::Waiting;
        self.start_keepalive();
        Ok(true)
    }

    fn start_keepalive(&self) {
        let shared = Arc::clone(&self.shared);
        let manager = self.manager.clone();
        let interval = self.manager.configuration().keepalive_interval;
        let handle = thread::spawn(move || loop {
            {
                let state = shared.keepalive.lock().unwrap();
                if state.stop_requested {
                    return;
                }
            }
            let (_, outcome) = manager.enqueue(Box::new(Keepalive::new())).wait();
            let mut state = shared.keepalive.lock().unwrap();
            if let Err(e) = outcome {
                state.error = Some(e);
                return;
            }
            if state.stop_requested {
                return;
            }
            let _ = shared.keepalive_condvar.wait_timeout(state, interval).unwrap();
        });
        let mut state = self.shared.keepalive.lock().unwrap();
        state.stop_requested = false;
        state.error = None;
        state.thread = Some(handle);
    }

    /// Stops the keepalive loop and returns any exception it accumulated.
    fn stop_keepalive(&self) -> Option<SharedError> {
        let handle = {
            let mut state = self.shared.keepalive.lock().unwrap();
            state.stop_requested = true;
            state.thread.take()
        };
        self.shared.keepalive_condvar.notify_all();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        self.shared.keepalive.lock().unwrap().error.take()
    }

    /// `Waiting → Completing → {Completed | Faulted}` (spec.md §4.8).
    pub fn end(&self, payment: Decimal) -> Result<(), SharedError> {
        {
            let mut state = self.shared.state.lock().unwrap();
            if *state != TransactionState::Waiting {
                return Err(Arc::new(Smart3Error::InvalidOperation("end() called outside the Waiting state".into())));
            }
            *state = TransactionState::Completing;
        }
        let keepalive_error = self.stop_keepalive();

        let result = self.run_end(payment, keepalive_error);
        release_active_transaction();
        *self.shared.state.lock().unwrap() = match &result {
            Ok(()) => TransactionState::Completed,
            Err(e) => terminal_state_for(e),
        };
        result
    }

    fn run_end(&self, payment: Decimal, keepalive_error: Option<SharedError>) -> Result<(), SharedError> {
        if let Some(e) = keepalive_error {
            return Err(e);
        }
        self.checkpoint()?;

        let continued = self.shared.continued.lock().unwrap().clone();
        let baseline = self.shared.baseline.lock().unwrap().clone();
        let total: Decimal = continued.iter().map(|p| p.price() * Decimal::from(p.quantity())).sum();
        if payment <= Decimal::ZERO || payment < total {
            return Err(Arc::new(Smart3Error::InvalidOperation(format!(
                "payment {payment} must be positive and at least the total {total}"
            ))));
        }

        let changed: Vec<PluInfo> = continued
            .iter()
            .filter(|item| {
                baseline.iter().find(|b| b.id() == item.id()).map(|b| !plu_fields_equal(b, item)).unwrap_or(true)
            })
            .cloned()
            .collect();
        if !changed.is_empty() {
            let (_, outcome) = self.manager.enqueue(Box::new(WritePluInfo::new(changed, None))).wait();
            outcome?;
        }

        self.final_checkpoint()?;
        let (_, outcome) = self.manager.enqueue(Box::new(Transact::new(continued, payment))).wait();
        outcome?;
        Ok(())
    }

    /// Synchronous, status-dependent cancellation (spec.md §4.8).
    pub fn cancel(&self) -> bool {
        let initial = *self.shared.state.lock().unwrap();
        match initial {
            TransactionState::Initialized => {
                *self.shared.state.lock().unwrap() = TransactionState::Canceled;
                true
            }
            TransactionState::Starting | TransactionState::Completing => {
                let mut cancel = self.shared.cancel.lock().unwrap();
                if *cancel == CancelWindow::Closed {
                    return false;
                }
                *cancel = CancelWindow::Requested;
                while *cancel == CancelWindow::Requested {
                    cancel = self.shared.cancel_acked.wait(cancel).unwrap();
                }
                true
            }
            TransactionState::Waiting => {
                let _ = self.stop_keepalive();
                *self.shared.state.lock().unwrap() = TransactionState::Canceled;
                release_active_transaction();
                true
            }
            TransactionState::Canceled => true,
            TransactionState::Rejected | TransactionState::Completed | TransactionState::Faulted => false,
        }
    }

    /// Offloads [`Transaction::cancel`] onto a background thread.
    pub fn cancel_async(&self) -> JoinHandle<bool> {
        let this = self.clone();
        thread::spawn(move || this.cancel())
    }
}

fn terminal_state_for(error: &SharedError) -> TransactionState {
    match &**error {
        Smart3Error::Canceled => TransactionState::Canceled,
        _ => TransactionState::Faulted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_on_initialized_transaction_succeeds_synchronously() {
        let manager = OperationManager::new(crate::config::Configuration::new(
            "/dev/null",
            crate::config::PhysicalLayer::Rs232,
        ));
        let transaction = Transaction::new(manager);
        assert_eq!(transaction.state(), TransactionState::Initialized);
        assert!(transaction.cancel());
        assert_eq!(transaction.state(), TransactionState::Canceled);
    }

    #[test]
    fn cancel_on_terminal_state_is_a_no_op_failure() {
        let manager = OperationManager::new(crate::config::Configuration::new(
            "/dev/null",
            crate::config::PhysicalLayer::Rs232,
        ));
        let transaction = Transaction::new(manager);
        *transaction.shared.state.lock().unwrap() = TransactionState::Faulted;
        assert!(!transaction.cancel());
    }

    #[test]
    fn cancel_is_denied_promptly_once_past_the_final_checkpoint() {
        let manager = OperationManager::new(crate::config::Configuration::new(
            "/dev/null",
            crate::config::PhysicalLayer::Rs232,
        ));
        let transaction = Transaction::new(manager);
        *transaction.shared.state.lock().unwrap() = TransactionState::Completing;
        transaction.final_checkpoint().expect("no cancellation is pending yet");
        assert!(!transaction.cancel(), "a cancellation past the last checkpoint must be denied, not block");
    }

    #[test]
    fn a_cancellation_already_pending_is_still_honoured_by_the_final_checkpoint() {
        let manager = OperationManager::new(crate::config::Configuration::new(
            "/dev/null",
            crate::config::PhysicalLayer::Rs232,
        ));
        let transaction = Transaction::new(manager);
        *transaction.shared.state.lock().unwrap() = TransactionState::Completing;
        *transaction.shared.cancel.lock().unwrap() = CancelWindow::Requested;
        let err = transaction.final_checkpoint().expect_err("a pending cancellation must still be honoured");
        assert!(matches!(*err, Smart3Error::Canceled));
    }
}
