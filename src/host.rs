//! Value-returned entry points for a macro interpreter.
//!
//! The macro host cannot handle Rust errors, so [`MacroHost`] flattens every
//! [`Result`](crate::Result) into a status code: `0` for success, a negative
//! [`Error::status`] for failure, `-1` for an unknown rank or size, and
//! `None` for an array result that could not be produced. Each failure is
//! logged before it is flattened.
//!
//! All state of the process (communicator, task ledger, configuration) sits
//! behind one mutex, so the host may call in from several threads.

use crate::comm::Communicator;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ledger::{ProgressLedger, ProgressUpdate};
use crate::runtime::Lifecycle;
use parking_lot::Mutex;
use tracing::warn;

/// Status code of a successful call.
pub const SUCCESS: i32 = 0;

/// Generic failure status, also the unknown rank/size sentinel.
pub const FAILURE: i32 = -1;

struct HostState {
    config: Config,
    comm: Communicator,
    ledger: ProgressLedger,
}

impl HostState {
    fn report_tasks(&mut self) -> Result<()> {
        let rank = self.comm.rank()?;
        let size = self.comm.size()?;
        self.ledger.report_tasks(rank, size)
    }

    fn report_progress(&mut self, task: i32, progress: i32) -> Result<ProgressUpdate> {
        let rank = self.comm.rank()?;
        self.ledger.report_progress(task, progress, rank)
    }

    fn report_text(&self, line: &str) -> Result<()> {
        let rank = self.comm.rank()?;
        self.ledger.report_text(line, rank)
    }
}

/// Process-wide context for the macro host.
///
/// The MPI runtime is located and bound on the first call to
/// [`initialise`](Self::initialise).
///
/// # Example
///
/// ```no_run
/// use macrompi::MacroHost;
///
/// let host = MacroHost::from_env();
/// assert_eq!(host.initialise(), 0);
///
/// let load = host.add_task("load");
/// host.report_tasks();
/// host.report_progress(load, 100);
///
/// let mine = host.scatter_equally("1.0, 2.0, 3.0, 4.0", 4, 0).unwrap_or_default();
/// host.report_text(&format!("rank {} got {mine}", host.get_rank()));
///
/// host.finalise();
/// ```
pub struct MacroHost {
    state: Mutex<HostState>,
}

impl MacroHost {
    /// Host with lazy runtime discovery.
    pub fn new(config: Config) -> Self {
        let ledger = ProgressLedger::new(config.log_dir.clone());
        MacroHost {
            state: Mutex::new(HostState {
                config,
                comm: Communicator::unbound(),
                ledger,
            }),
        }
    }

    /// Host configured from the `MACROMPI_*` environment variables.
    pub fn from_env() -> Self {
        MacroHost::new(Config::from_env())
    }

    /// Host over an existing communicator (bound or already initialised).
    pub fn with_communicator(config: Config, comm: Communicator) -> Self {
        let host = MacroHost::new(config);
        host.state.lock().comm = comm;
        host
    }

    /// Lifecycle state of the underlying communicator.
    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lock().comm.state()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Bind the runtime if needed and initialize it.
    pub fn initialise(&self) -> i32 {
        let mut state = self.state.lock();
        let state = &mut *state;
        if state.comm.state() == Lifecycle::Unbound {
            match Communicator::discover(&state.config) {
                Ok(comm) => state.comm = comm,
                Err(err) => return fail("initialise", &err),
            }
        }
        let args = state.config.init_args();
        status("initialise", state.comm.initialise(&args))
    }

    /// Finalize the runtime.
    pub fn finalise(&self) -> i32 {
        status("finalise", self.state.lock().comm.finalise())
    }

    /// Rank of this process, `-1` if unknown.
    pub fn get_rank(&self) -> i32 {
        self.state
            .lock()
            .comm
            .rank()
            .unwrap_or_else(|err| {
                fail("get_rank", &err);
                FAILURE
            })
    }

    /// Number of processes, `-1` if unknown.
    pub fn get_size(&self) -> i32 {
        self.state
            .lock()
            .comm
            .size()
            .unwrap_or_else(|err| {
                fail("get_size", &err);
                FAILURE
            })
    }

    /// Barrier across all processes.
    pub fn barrier(&self) -> i32 {
        // The lock is held while blocked: no other thread of this process may
        // drive MPI during a collective anyway.
        status("barrier", self.state.lock().comm.barrier())
    }

    // ========================================================================
    // Collectives over text arrays
    // ========================================================================

    /// Equal split of the root's array; rank 0 also takes the remainder.
    pub fn scatter_equally(&self, send: &str, total: i32, root: i32) -> Option<String> {
        let state = self.state.lock();
        text("scatter_equally", to_len(total).and_then(|total| {
            state.comm.scatter_equally_text(send, total, root)
        }))
    }

    /// Regular scatter of `send_count` elements per rank.
    pub fn scatter(&self, send: &str, send_count: i32, receive_count: i32, root: i32) -> Option<String> {
        let state = self.state.lock();
        text(
            "scatter",
            to_len(send_count)
                .and_then(|s| to_len(receive_count).map(|r| (s, r)))
                .and_then(|(s, r)| state.comm.scatter_text(send, s, r, root)),
        )
    }

    /// Regular gather; non-root ranks receive an empty string.
    pub fn gather(&self, send: &str, send_count: i32, receive_count: i32, root: i32) -> Option<String> {
        let state = self.state.lock();
        text(
            "gather",
            to_len(send_count)
                .and_then(|s| to_len(receive_count).map(|r| (s, r)))
                .and_then(|(s, r)| state.comm.gather_text(send, s, r, root)),
        )
    }

    /// Inverse of [`scatter_equally`](Self::scatter_equally).
    pub fn gather_equally(&self, send: &str, total: i32, root: i32) -> Option<String> {
        let state = self.state.lock();
        text("gather_equally", to_len(total).and_then(|total| {
            state.comm.gather_equally_text(send, total, root)
        }))
    }

    // ========================================================================
    // Progress logging
    // ========================================================================

    /// Register a task; returns its id or `-1` once tasks were reported.
    pub fn add_task(&self, description: &str) -> i32 {
        match self.state.lock().ledger.add_task(description) {
            Ok(id) => i32::try_from(id).unwrap_or(FAILURE),
            Err(_) => FAILURE,
        }
    }

    /// Write the task table of this rank, once.
    pub fn report_tasks(&self) -> i32 {
        status("report_tasks", self.state.lock().report_tasks())
    }

    /// Record progress of a task.
    ///
    /// Returns `0` when accepted (written or not above the last value), the
    /// last accepted value for an out-of-range percentage (`-1` if there is
    /// none) and a negative status otherwise.
    pub fn report_progress(&self, task: i32, progress: i32) -> i32 {
        match self.state.lock().report_progress(task, progress) {
            Ok(ProgressUpdate::Written | ProgressUpdate::Unchanged { .. }) => SUCCESS,
            Err(Error::ProgressOutOfRange { last, .. }) => last.unwrap_or(FAILURE),
            Err(err) => fail("report_progress", &err),
        }
    }

    /// Append a line to this rank's report file.
    pub fn report_text(&self, line: &str) -> i32 {
        status("report_text", self.state.lock().report_text(line))
    }

    /// Forget registered tasks and progress.
    pub fn reset_tasks(&self) {
        self.state.lock().ledger.reset();
    }
}

fn fail(operation: &str, err: &Error) -> i32 {
    warn!(operation, error = %err, "call failed");
    err.status()
}

fn status(operation: &str, result: Result<()>) -> i32 {
    match result {
        Ok(()) => SUCCESS,
        Err(err) => fail(operation, &err),
    }
}

fn text(operation: &str, result: Result<String>) -> Option<String> {
    result.map_err(|err| fail(operation, &err)).ok()
}

fn to_len(n: i32) -> Result<usize> {
    usize::try_from(n).map_err(|_| Error::InvalidCount(i64::from(n)))
}
