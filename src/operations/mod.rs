//! The catalogue of scripted operations (spec.md §4.6) that the
//! [`OperationManager`](crate::manager::OperationManager) drives through a
//! [`Console`]. Every operation is a short, independent script rather than a
//! subclass of a shared base type — the A01/B23 handling they share is
//! composed in via the [`common`] helpers, per spec.md §9's design note.

pub mod common;

mod broadcast_plu;
mod fiscal_closing;
mod keepalive;
mod read_plu;
mod shutdown;
mod startup;
mod transact;
mod write_plu;
mod financial_report;

pub use broadcast_plu::BroadcastPluInfo;
pub use common::{ProgressEvent, ProgressKind, ProgressSink, SessionContext};
pub use financial_report::FinancialReportOp;
pub use fiscal_closing::FiscalClosing;
pub use keepalive::Keepalive;
pub use read_plu::ReadPluInfo;
pub use shutdown::Shutdown;
pub use startup::Startup;
pub use transact::Transact;
pub use write_plu::WritePluInfo;

use crate::console::Console;
use crate::error::Smart3Error;

/// A single scripted conversation run against the register (spec.md §4.6).
///
/// Operations are plain structs implementing this trait rather than a class
/// hierarchy: the A01/B23 handling every operation shares lives in
/// [`common`] and is invoked explicitly by each `run`, not inherited.
pub trait Operation: Send {
    /// A short name for logging and error attribution.
    fn name(&self) -> &'static str;

    /// Runs the operation's scripted dialogue to completion.
    fn run(&mut self, console: &mut Console) -> Result<(), Smart3Error>;

    /// Type-erased access back to the concrete operation, so a caller that
    /// enqueued e.g. a [`ReadPluInfo`] can recover its results after the
    /// manager hands the operation back alongside its completion.
    fn as_any(&self) -> &dyn std::any::Any;
}
