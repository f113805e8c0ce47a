//! The job dispatcher.
//!
//! The dispatcher validates the configuration once, installs the codec
//! library's lock manager, then admits up to the configured number of
//! worker threads. It is the single consumer of every pipeline's event
//! channel: events update the log buffer and counters in emission order
//! per job, and each `finished` event frees a slot for the next queued
//! file. The lock manager is uninstalled after the last pipeline stops.

use crate::job::{Job, JobRunner, PipelineRunner};
use recast_core::{Configuration, Error, Event, EventSender, Result};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Identifier of one admitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {}", self.0)
    }
}

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// One line of the accumulated run log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub severity: Severity,
    pub message: String,
}

/// Host notifications, delivered on the dispatcher thread.
#[derive(Debug)]
pub enum Notice<'a> {
    /// A job was admitted to a worker slot.
    Started { job: JobId, path: &'a Path },
    /// An event arrived from a running job.
    Event { job: JobId, event: &'a Event },
}

/// Aggregate outcome of one dispatcher run.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Jobs that finished neither cancelled nor failed.
    pub completed: usize,
    /// Jobs that reported failure.
    pub failed: usize,
    /// Jobs that observed cancellation.
    pub cancelled_jobs: usize,
    /// Error lines in the log.
    pub errors: usize,
    /// Whether the run was cancelled.
    pub cancelled: bool,
    /// The accumulated log.
    pub log: Vec<LogLine>,
}

/// Handle for requesting cancellation from another thread.
#[derive(Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Set the shared stop flag. Running pipelines observe it at their
    /// next packet boundary; no further jobs are admitted.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

struct WorkerSlot {
    path: PathBuf,
    handle: JoinHandle<()>,
}

/// Uninstalls the lock manager when the run ends, on every exit path.
struct LockInstallation;

impl LockInstallation {
    fn install() -> Self {
        recast_codec::lock::install();
        Self
    }
}

impl Drop for LockInstallation {
    fn drop(&mut self) {
        recast_codec::lock::uninstall();
    }
}

/// Runs pipelines concurrently within the configured thread budget.
pub struct Dispatcher<R: JobRunner = PipelineRunner> {
    runner: Arc<R>,
    cancel: Arc<AtomicBool>,
    observer: Option<Box<dyn Fn(Notice<'_>) + Send>>,
}

impl Default for Dispatcher<PipelineRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher<PipelineRunner> {
    /// Dispatcher over real transcoding pipelines.
    pub fn new() -> Self {
        Self::with_runner(PipelineRunner)
    }
}

impl<R: JobRunner> Dispatcher<R> {
    /// Dispatcher over a custom job runner.
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner: Arc::new(runner),
            cancel: Arc::new(AtomicBool::new(false)),
            observer: None,
        }
    }

    /// Install a notification callback; it runs on the dispatcher
    /// thread.
    pub fn with_observer(mut self, observer: impl Fn(Notice<'_>) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Handle for cancelling the run from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }

    /// Run every file to a terminal state and return the aggregate
    /// report. An invalid configuration aborts before any job starts.
    pub fn run(&mut self, files: Vec<PathBuf>, config: Configuration) -> Result<DispatchReport> {
        config.validate().map_err(Error::Config)?;
        let config = Arc::new(config);
        let limit = config.effective_threads();
        let total = files.len();
        info!("dispatching {total} file(s) across {limit} worker(s)");

        let _locks = LockInstallation::install();
        let (tx, rx) = mpsc::channel::<(JobId, Event)>();

        let mut queue: VecDeque<PathBuf> = files.into();
        let mut running: HashMap<JobId, WorkerSlot> = HashMap::new();
        let mut next_id = 0usize;
        let mut report = DispatchReport::default();

        while running.len() < limit && !queue.is_empty() && !self.is_cancelled() {
            if let Some(path) = queue.pop_front() {
                self.spawn_job(&mut running, &mut next_id, path, &config, &tx);
            }
        }

        while !running.is_empty() {
            let (id, event) = match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            };
            self.notify(Notice::Event {
                job: id,
                event: &event,
            });
            match event {
                Event::Info(message) => report.log.push(LogLine {
                    severity: Severity::Info,
                    message,
                }),
                Event::Error(message) => {
                    report.errors += 1;
                    report.log.push(LogLine {
                        severity: Severity::Error,
                        message,
                    });
                }
                Event::Progress(_) => {}
                Event::Finished { cancelled, failed } => {
                    if let Some(slot) = running.remove(&id) {
                        debug!("{id} ({}) finished", slot.path.display());
                        let _ = slot.handle.join();
                    }
                    if cancelled {
                        report.cancelled_jobs += 1;
                    } else if failed {
                        report.failed += 1;
                    } else {
                        // The global completion counter never retreats and
                        // counts only clean finishes.
                        report.completed += 1;
                    }
                    while running.len() < limit && !queue.is_empty() && !self.is_cancelled() {
                        if let Some(path) = queue.pop_front() {
                            self.spawn_job(&mut running, &mut next_id, path, &config, &tx);
                        }
                    }
                }
            }
        }

        report.cancelled = self.is_cancelled();
        info!(
            "dispatch finished: {}/{} completed, {} failed, {} cancelled",
            report.completed, total, report.failed, report.cancelled_jobs
        );
        Ok(report)
    }

    fn spawn_job(
        &self,
        running: &mut HashMap<JobId, WorkerSlot>,
        next_id: &mut usize,
        path: PathBuf,
        config: &Arc<Configuration>,
        tx: &Sender<(JobId, Event)>,
    ) {
        let id = JobId(*next_id);
        *next_id += 1;

        self.notify(Notice::Started { job: id, path: &path });

        let events = {
            let tx = tx.clone();
            EventSender::new(move |event| {
                let _ = tx.send((id, event));
            })
        };
        let job = Job {
            path: path.clone(),
            config: Arc::clone(config),
        };
        let runner = Arc::clone(&self.runner);
        let cancel = Arc::clone(&self.cancel);
        let handle = thread::spawn(move || runner.run(job, events, cancel));

        running.insert(id, WorkerSlot { path, handle });
    }

    fn notify(&self, notice: Notice<'_>) {
        if let Some(observer) = &self.observer {
            observer(notice);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}
