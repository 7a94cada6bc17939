//! Per-rank progress and report logs.
//!
//! Each rank owns two append-only text files in the log directory:
//!
//! - `progress_<rank>.plog`: the participant count, then one `id,description`
//!   line per task (written once), then `id,percentage` lines
//! - `report_<rank>.tlog`: free-text lines
//!
//! Progress callbacks can fire far more often than the percentage changes, so
//! a value is only written when it is strictly greater than the last one
//! written for the same task.

use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PROGRESS_PREFIX: &str = "progress_";
const PROGRESS_SUFFIX: &str = ".plog";
const REPORT_PREFIX: &str = "report_";
const REPORT_SUFFIX: &str = ".tlog";

/// Outcome of an accepted progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// The value was appended to the progress file.
    Written,
    /// The value did not exceed the last written one; nothing was written.
    Unchanged {
        /// Last value written for the task
        last: i32,
    },
}

#[derive(Debug, Clone)]
struct Task {
    description: String,
    last_written: Option<i32>,
}

/// Task table and progress state of one rank.
#[derive(Debug, Clone)]
pub struct ProgressLedger {
    dir: PathBuf,
    tasks: Vec<Task>,
    tasks_reported: bool,
}

impl ProgressLedger {
    /// Empty ledger writing its files into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ProgressLedger {
            dir: dir.into(),
            tasks: Vec::new(),
            tasks_reported: false,
        }
    }

    /// Forget all tasks and progress; the files on disk are left alone.
    pub fn reset(&mut self) {
        self.tasks.clear();
        self.tasks_reported = false;
    }

    /// Directory holding the log files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the progress file for `rank`.
    pub fn progress_path(&self, rank: i32) -> PathBuf {
        self.dir
            .join(format!("{PROGRESS_PREFIX}{rank}{PROGRESS_SUFFIX}"))
    }

    /// Path of the report file for `rank`.
    pub fn report_path(&self, rank: i32) -> PathBuf {
        self.dir.join(format!("{REPORT_PREFIX}{rank}{REPORT_SUFFIX}"))
    }

    /// Descriptions of the registered tasks, indexed by id.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.description.as_str())
    }

    /// Whether the task table has been written.
    pub fn tasks_reported(&self) -> bool {
        self.tasks_reported
    }

    /// Last progress value written for `task`.
    pub fn last_progress(&self, task: usize) -> Option<i32> {
        self.tasks.get(task).and_then(|t| t.last_written)
    }

    /// Register a task and return its id (0, 1, 2, ...).
    ///
    /// # Errors
    ///
    /// [`Error::TasksFrozen`] once the task table has been reported; the
    /// table is left untouched.
    pub fn add_task(&mut self, description: &str) -> Result<usize> {
        if self.tasks_reported {
            warn!(
                description,
                "add_task ignored: no tasks may be added after they were reported"
            );
            return Err(Error::TasksFrozen);
        }
        self.tasks.push(Task {
            description: description.to_string(),
            last_written: None,
        });
        Ok(self.tasks.len() - 1)
    }

    /// Write the progress file header and task table, once.
    ///
    /// Does nothing when there are no tasks or the table was already
    /// written. The file is truncated first. The table counts as reported
    /// even if writing fails; the error is returned but never retried.
    pub fn report_tasks(&mut self, rank: i32, size: i32) -> Result<()> {
        if self.tasks.is_empty() {
            warn!(rank, "report_tasks ignored: there are no tasks to report");
            return Ok(());
        }
        if self.tasks_reported {
            return Ok(());
        }
        self.tasks_reported = true;

        let mut text = format!("{size}\n");
        for (id, task) in self.tasks.iter().enumerate() {
            text.push_str(&format!("{id},{}\n", task.description));
        }

        let path = self.progress_path(rank);
        let written = File::create(&path).and_then(|mut file| file.write_all(text.as_bytes()));
        if let Err(err) = written {
            warn!(rank, path = %path.display(), error = %err, "failed to write task table");
            return Err(err.into());
        }
        debug!(rank, tasks = self.tasks.len(), "reported task table");
        Ok(())
    }

    /// Record `progress` (percent) for `task`.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownTask`] if `task` was never added
    /// - [`Error::ProgressOutOfRange`] if `progress` is outside `[0, 100]`;
    ///   it carries the last accepted value, which stays unchanged
    /// - [`Error::Io`] if appending fails
    pub fn report_progress(&mut self, task: i32, progress: i32, rank: i32) -> Result<ProgressUpdate> {
        let path = self.progress_path(rank);
        let id = usize::try_from(task).map_err(|_| Error::UnknownTask(task))?;
        let Some(entry) = self.tasks.get_mut(id) else {
            warn!(task, "progress can not be reported for a task that does not exist");
            return Err(Error::UnknownTask(task));
        };

        if !(0..=100).contains(&progress) {
            return Err(Error::ProgressOutOfRange {
                task: id,
                progress,
                last: entry.last_written,
            });
        }

        if let Some(last) = entry.last_written {
            if progress <= last {
                return Ok(ProgressUpdate::Unchanged { last });
            }
        }

        append_line(&path, &format!("{id},{progress}")).map_err(|err| {
            warn!(task, rank, error = %err, "report_progress write failed");
            Error::Io(err)
        })?;
        entry.last_written = Some(progress);
        Ok(ProgressUpdate::Written)
    }

    /// Append one line of free text to the report file of `rank`.
    pub fn report_text(&self, text: &str, rank: i32) -> Result<()> {
        append_line(&self.report_path(rank), text).map_err(|err| {
            warn!(rank, error = %err, "report_text write failed");
            Error::Io(err)
        })
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(format!("{line}\n").as_bytes())
}
