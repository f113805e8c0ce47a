//! Jobs and the runner seam.

use recast_core::{Configuration, EventSender};
use recast_pipeline::TranscodingPipeline;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// One unit of work: an input path plus the shared configuration. Created
/// by the dispatcher, consumed by exactly one pipeline.
pub struct Job {
    pub path: PathBuf,
    pub config: Arc<Configuration>,
}

/// Executes one job on a worker thread.
///
/// The production implementation is [`PipelineRunner`]; tests install
/// mocks to drive the dispatcher without media files. Implementations
/// must emit exactly one `finished` event per job and honor the stop
/// flag.
pub trait JobRunner: Send + Sync + 'static {
    fn run(&self, job: Job, events: EventSender, cancel: Arc<AtomicBool>);
}

/// Runs a real transcoding pipeline per job.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineRunner;

impl JobRunner for PipelineRunner {
    fn run(&self, job: Job, events: EventSender, cancel: Arc<AtomicBool>) {
        TranscodingPipeline::new(job.path, job.config, events, cancel).run();
    }
}
