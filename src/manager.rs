//! [`OperationManager`]: the process-wide serialised executor that owns the
//! serial port for an entire session (spec.md §4.7).
//!
//! One dedicated worker thread drains a FIFO queue of operations against a
//! single [`Console`]. Callers get a [`Completion`] back from `enqueue` and
//! block on it if they want the result; the manager itself never blocks a
//! caller beyond handing the operation to the worker.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use log::{debug, error, warn};

use crate::config::Configuration;
use crate::console::Console;
use crate::error::{ProtocolError, Smart3Error, TransportError};
use crate::operations::{Operation, Shutdown, Startup};
use crate::serial::SerialPortDriver;
use crate::transceiver::Transceiver;

/// A [`Smart3Error`] shared across every queued operation aborted by the
/// same worker-thread failure (spec.md §4.7's "aborts all queued operations
/// with the same exception").
pub type SharedError = Arc<Smart3Error>;

pub type OperationOutcome = (Box<dyn Operation>, Result<(), SharedError>);

struct QueuedOperation {
    operation: Box<dyn Operation>,
    completion: mpsc::Sender<OperationOutcome>,
}

struct State {
    queue: VecDeque<QueuedOperation>,
    worker_running: bool,
}

struct Inner {
    state: Mutex<State>,
    condvar: Condvar,
    configuration: Configuration,
}

/// A handle to a queued operation's eventual result. Hands the operation
/// itself back alongside the outcome, so a caller that enqueued e.g. a
/// [`crate::operations::ReadPluInfo`] can pull its results out via
/// [`crate::operations::Operation::as_any`].
pub struct Completion {
    receiver: mpsc::Receiver<OperationOutcome>,
}

impl Completion {
    /// Blocks until the operation completes (or the worker drops without
    /// reporting, which surfaces as [`Smart3Error::Canceled`] with no
    /// operation to return — this can only happen if the worker thread
    /// itself panics).
    pub fn wait(self) -> OperationOutcome {
        match self.receiver.recv() {
            Ok(outcome) => outcome,
            Err(_) => unreachable!("operation manager worker dropped a completion sender without replying"),
        }
    }
}

/// The process-wide serialised executor (spec.md §4.7). Cheaply `Clone`:
/// every clone shares the same worker and queue.
#[derive(Clone)]
pub struct OperationManager {
    inner: Arc<Inner>,
}

impl OperationManager {
    pub fn new(configuration: Configuration) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(State { queue: VecDeque::new(), worker_running: false }),
            condvar: Condvar::new(),
            configuration,
        });
        Self { inner }
    }

    /// Queues `operation`, starting the worker thread if none is currently
    /// running, or waking the existing one otherwise.
    pub fn enqueue(&self, operation: Box<dyn Operation>) -> Completion {
        let (tx, rx) = mpsc::channel();
        let mut state = self.inner.state.lock().unwrap();
        state.queue.push_back(QueuedOperation { operation, completion: tx });
        if state.worker_running {
            self.inner.condvar.notify_all();
        } else {
            state.worker_running = true;
            let inner = Arc::clone(&self.inner);
            thread::spawn(move || run_worker(inner));
        }
        Completion { receiver: rx }
    }

    /// The configuration this manager was built with — read-only, since the
    /// worker thread owns the only live connection that uses it.
    pub fn configuration(&self) -> &Configuration {
        &self.inner.configuration
    }
}

/// Re-wraps an unrecovered framing error as a protocol contract violation
/// before it leaves the manager (spec.md §7).
fn rewrap_for_propagation(error: Smart3Error) -> Smart3Error {
    match error {
        Smart3Error::Transport(TransportError::PacketValidation(inner)) => {
            Smart3Error::Protocol(ProtocolError::Contract {
                message_type: format!("unrecovered packet validation: {inner}"),
            })
        }
        other => other,
    }
}

/// Drains whatever operations are still queued, reporting `error` to each,
/// and clears `worker_running` in the same locked section — the worker is
/// giving up here, so nothing queued after this point can ever be drained
/// if the flag lingered true until the later `finish_worker` call.
fn abort_queued(inner: &Inner, error: &SharedError) {
    let mut state = inner.state.lock().unwrap();
    for queued in state.queue.drain(..) {
        let _ = queued.completion.send((queued.operation, Err(Arc::clone(error))));
    }
    state.worker_running = false;
}

fn open_console(configuration: &Configuration) -> Result<Console, Smart3Error> {
    let driver = SerialPortDriver::open(&configuration.port_path, configuration.baud_rate)?;
    let transceiver = Transceiver::new(driver, configuration.clone());
    Ok(Console::new(transceiver, configuration.max_retries))
}

fn run_worker(inner: Arc<Inner>) {
    let configuration = inner.configuration.clone();
    let mut console = match open_console(&configuration) {
        Ok(console) => console,
        Err(e) => {
            error!("operation manager: failed to open the serial port: {e}");
            let shared = Arc::new(rewrap_for_propagation(e));
            abort_queued(&inner, &shared);
            finish_worker(&inner);
            return;
        }
    };

    let mut startup = Startup::new();
    if let Err(e) = startup.run(&mut console) {
        error!("operation manager: Startup failed: {e}");
        let shared = Arc::new(rewrap_for_propagation(e));
        abort_queued(&inner, &shared);
        finish_worker(&inner);
        return;
    }

    loop {
        let mut queued = match next_operation(&inner) {
            Some(queued) => queued,
            None => break,
        };
        let outcome = queued.operation.run(&mut console);
        match outcome {
            Ok(()) => {
                let _ = queued.completion.send((queued.operation, Ok(())));
            }
            Err(e) => {
                warn!("operation manager: {} failed: {e}", queued.operation.name());
                let shared = Arc::new(rewrap_for_propagation(e));
                let _ = queued.completion.send((queued.operation, Err(Arc::clone(&shared))));
                abort_queued(&inner, &shared);
                break;
            }
        }
    }

    let mut shutdown = Shutdown::new(startup.connectability().cloned());
    if let Err(e) = shutdown.run(&mut console) {
        debug!("operation manager: Shutdown itself failed while tearing down: {e}");
    }
    finish_worker(&inner);
}

fn finish_worker(inner: &Inner) {
    let mut state = inner.state.lock().unwrap();
    state.worker_running = false;
}

/// Waits for the next queued operation, honouring the 250 ms idle wait
/// described in spec.md §4.7/§5: once the queue is drained, give a
/// continuation caller one last chance to enqueue before the worker exits.
/// Exits early if every external handle to this manager has been dropped.
///
/// `worker_running` is cleared right here, under the same lock that made
/// the exit decision — not later in `finish_worker` — so an `enqueue` that
/// lands after this function returns `None` but before the worker finishes
/// tearing down always sees `worker_running == false` and spawns a fresh
/// worker instead of notifying a condvar nobody is waiting on anymore.
fn next_operation(inner: &Arc<Inner>) -> Option<QueuedOperation> {
    let mut state = inner.state.lock().unwrap();
    loop {
        if let Some(queued) = state.queue.pop_front() {
            return Some(queued);
        }
        if Arc::strong_count(inner) <= 1 {
            state.worker_running = false;
            return None;
        }
        let (guard, timeout_result) =
            inner.condvar.wait_timeout(state, inner.configuration.worker_idle_timeout).unwrap();
        state = guard;
        if timeout_result.timed_out() && state.queue.is_empty() {
            state.worker_running = false;
            return None;
        }
    }
}
