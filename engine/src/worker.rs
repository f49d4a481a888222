//! Background compare worker.
//!
//! A `SyncWorker` runs one comparison and reports through an `EventSink`:
//!
//! ```text
//! Idle -> Scanning -> Comparing -> Done | Failed
//! ```
//!
//! Single-file mode skips `Scanning`. Cancellation cuts `Scanning` or
//! `Comparing` short but still ends in `Done` with the partial result.
//! Every run emits exactly one terminal event.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver};
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::config::IgnoreNames;
use crate::diff;
use crate::error::{panic_message, EngineError};
use crate::fs_ops;
use crate::model::DiffItem;
use crate::progress::{
    EventSink, WorkerEvent, PHASE_COMPARING, PHASE_COMPARING_FILE, PHASE_SCANNING,
};

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created, not yet started
    Idle,
    /// Collecting metadata for both roots
    Scanning,
    /// Classifying paths
    Comparing,
    /// Finished (possibly cancelled) with a result
    Done,
    /// Finished with a failure message
    Failed,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Done | WorkerState::Failed)
    }
}

/// Whether the two roots name single files or directory trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    SingleFile,
    Tree,
}

/// Inputs for one comparison run.
#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub mode: CompareMode,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub ignore: IgnoreNames,
}

impl CompareRequest {
    pub fn tree(source: impl Into<PathBuf>, destination: impl Into<PathBuf>, ignore: IgnoreNames) -> Self {
        CompareRequest {
            mode: CompareMode::Tree,
            source: source.into(),
            destination: destination.into(),
            ignore,
        }
    }

    pub fn single_file(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        CompareRequest {
            mode: CompareMode::SingleFile,
            source: source.into(),
            destination: destination.into(),
            ignore: IgnoreNames::none(),
        }
    }
}

/// One comparison run.
#[derive(Debug)]
pub struct SyncWorker {
    id: Uuid,
    request: CompareRequest,
    cancel: CancelToken,
    state: WorkerState,
}

impl SyncWorker {
    pub fn new(request: CompareRequest) -> Self {
        SyncWorker {
            id: Uuid::new_v4(),
            request,
            cancel: CancelToken::new(),
            state: WorkerState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn request(&self) -> &CompareRequest {
        &self.request
    }

    /// Handle for requesting cancellation from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the comparison on the current thread.
    ///
    /// Emits phase and progress events, then exactly one `Done` or `Failed`.
    /// Errors and panics inside the pass become `Failed`; they are not
    /// returned.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidState` (without emitting anything) if the
    /// worker has already run.
    pub fn run(&mut self, sink: &dyn EventSink) -> Result<WorkerState, EngineError> {
        if self.state != WorkerState::Idle {
            return Err(EngineError::InvalidState {
                message: format!("worker must be Idle to run; current state: {:?}", self.state),
            });
        }

        let span = info_span!("compare", run = %self.id);
        let _entered = span.enter();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(sink)));
        let failure = match outcome {
            Ok(Ok(diffs)) => {
                info!(
                    "Compare finished with {} items{}",
                    diffs.len(),
                    if self.cancel.is_cancelled() { " (cancelled)" } else { "" }
                );
                self.state = WorkerState::Done;
                sink.emit(WorkerEvent::Done(diffs));
                return Ok(self.state);
            }
            Ok(Err(e)) => e,
            Err(payload) => EngineError::WorkerPanicked {
                message: panic_message(&*payload),
            },
        };

        warn!("Compare failed: {}", failure);
        self.state = WorkerState::Failed;
        sink.emit(WorkerEvent::Failed(failure.to_string()));
        Ok(self.state)
    }

    fn execute(&mut self, sink: &dyn EventSink) -> Result<Vec<DiffItem>, EngineError> {
        let CompareRequest {
            mode,
            source,
            destination,
            ignore,
        } = &self.request;

        if *mode == CompareMode::SingleFile {
            self.state = WorkerState::Comparing;
            sink.emit(WorkerEvent::Phase(PHASE_COMPARING_FILE.to_string()));
            sink.emit(WorkerEvent::ProgressRange { min: 0, max: 1 });
            let item = diff::compare_files(source, destination);
            sink.emit(WorkerEvent::ProgressValue(1));
            return Ok(vec![item]);
        }

        self.state = WorkerState::Scanning;
        sink.emit(WorkerEvent::Phase(PHASE_SCANNING.to_string()));
        sink.emit(WorkerEvent::ProgressRange { min: 0, max: 0 });

        let (src_map, dst_map) = fs_ops::scan_pair(source, destination, ignore, &self.cancel)?;
        let keys = diff::merged_keys(&src_map, &dst_map);
        let total = keys.len();
        info!(
            "Scanned {} source and {} destination files ({} distinct paths)",
            src_map.len(),
            dst_map.len(),
            total
        );

        self.state = WorkerState::Comparing;
        sink.emit(WorkerEvent::Phase(PHASE_COMPARING.to_string()));
        sink.emit(WorkerEvent::ProgressRange {
            min: 0,
            max: total as u64,
        });

        let diffs = diff::diff_keys(
            &keys,
            source,
            destination,
            &src_map,
            &dst_map,
            &self.cancel,
            |done| sink.emit(WorkerEvent::ProgressValue(done as u64)),
        );
        Ok(diffs)
    }

    /// Run the comparison on a background thread.
    ///
    /// Events arrive on the returned handle's channel; the last one received
    /// is always terminal.
    pub fn spawn(mut self) -> WorkerHandle {
        let (tx, rx) = unbounded::<WorkerEvent>();
        let id = self.id;
        let cancel = self.cancel.clone();

        let join = thread::spawn(move || {
            // A fresh worker is Idle, so `run` cannot refuse it.
            self.run(&tx).unwrap_or(WorkerState::Failed)
        });

        WorkerHandle {
            id,
            events: rx,
            cancel,
            join,
        }
    }
}

/// Caller's side of a spawned worker.
#[derive(Debug)]
pub struct WorkerHandle {
    id: Uuid,
    events: Receiver<WorkerEvent>,
    cancel: CancelToken,
    join: JoinHandle<WorkerState>,
}

impl WorkerHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the worker thread and return its final state.
    pub fn join(self) -> Result<WorkerState, EngineError> {
        self.join.join().map_err(|payload| EngineError::WorkerPanicked {
            message: panic_message(&*payload),
        })
    }
}
