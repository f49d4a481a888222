//! Progress reporting.
//!
//! The engine never talks to a UI directly. Long-running passes emit
//! `WorkerEvent`s into an `EventSink`; the CLI, a GUI, or a test harness
//! subscribes by implementing the trait or by holding the receiving end
//! of a channel.

use crossbeam_channel::Sender;

use crate::model::DiffItem;

pub const PHASE_COMPARING_FILE: &str = "Comparing file…";
pub const PHASE_SCANNING: &str = "Scanning…";
pub const PHASE_COMPARING: &str = "Comparing…";
pub const PHASE_COPYING: &str = "Copying…";

/// A single notification from a running pass.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Human-readable stage label
    Phase(String),

    /// Bounds for subsequent `ProgressValue`s; `max == 0` means indeterminate
    ProgressRange { min: u64, max: u64 },

    /// Current position within the last announced range
    ProgressValue(u64),

    /// Terminal success; partial if the run was cancelled
    Done(Vec<DiffItem>),

    /// Terminal failure; mutually exclusive with `Done`
    Failed(String),
}

impl WorkerEvent {
    /// Returns true for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerEvent::Done(_) | WorkerEvent::Failed(_))
    }
}

/// Receiver of progress events.
///
/// Called synchronously on the emitting thread; implementations should
/// hand the event off quickly.
pub trait EventSink: Send {
    fn emit(&self, event: WorkerEvent);
}

/// Channel-backed sink. A disconnected receiver is not an error; the
/// pass keeps running and its events are dropped.
impl EventSink for Sender<WorkerEvent> {
    fn emit(&self, event: WorkerEvent) {
        let _ = self.send(event);
    }
}
