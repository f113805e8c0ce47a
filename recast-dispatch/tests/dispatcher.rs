//! Dispatcher integration tests.
//!
//! Mock job runners drive the dispatcher without touching the codec
//! library, verifying slot accounting, counters, event ordering and
//! cancellation.

use recast_core::{Configuration, Error, Event, EventSender};
use recast_dispatch::{Dispatcher, Job, JobRunner, Notice};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn files(count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| PathBuf::from(format!("/videos/input{i}.mkv")))
        .collect()
}

fn config_with_threads(threads: usize) -> Configuration {
    Configuration {
        number_of_threads: threads,
        ..Configuration::default()
    }
}

/// Runner that tracks concurrent executions and finishes cleanly.
struct GaugeRunner {
    inside: AtomicUsize,
    peak: AtomicUsize,
    runs: AtomicUsize,
}

impl GaugeRunner {
    fn new() -> Self {
        Self {
            inside: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        }
    }
}

impl JobRunner for Arc<GaugeRunner> {
    fn run(&self, _job: Job, events: EventSender, _cancel: Arc<AtomicBool>) {
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        self.inside.fetch_sub(1, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);

        events.progress(100);
        events.finished(false, false);
    }
}

#[test]
fn test_parallelism_is_bounded_and_all_jobs_complete() {
    let gauge = Arc::new(GaugeRunner::new());
    let mut dispatcher = Dispatcher::with_runner(Arc::clone(&gauge));

    let report = dispatcher.run(files(10), config_with_threads(3)).unwrap();

    assert_eq!(report.completed, 10);
    assert_eq!(report.failed, 0);
    assert!(!report.cancelled);
    assert_eq!(gauge.runs.load(Ordering::SeqCst), 10);
    assert!(
        gauge.peak.load(Ordering::SeqCst) <= 3,
        "no more than three jobs may run at once, saw {}",
        gauge.peak.load(Ordering::SeqCst)
    );
}

/// Runner that fails jobs whose file name contains "bad".
struct FlakyRunner;

impl JobRunner for FlakyRunner {
    fn run(&self, job: Job, events: EventSender, _cancel: Arc<AtomicBool>) {
        let failing = job.path.to_string_lossy().contains("bad");
        if failing {
            events.error(format!("can't probe '{}': broken", job.path.display()));
        } else {
            events.info("done".to_string());
        }
        events.progress(100);
        events.finished(false, failing);
    }
}

#[test]
fn test_completion_counter_excludes_failures() {
    let mut dispatcher = Dispatcher::with_runner(FlakyRunner);
    let mut inputs = files(4);
    inputs.push(PathBuf::from("/videos/bad1.mkv"));
    inputs.push(PathBuf::from("/videos/bad2.mkv"));

    let report = dispatcher.run(inputs, config_with_threads(2)).unwrap();

    assert_eq!(report.completed, 4);
    assert_eq!(report.failed, 2);
    assert_eq!(report.errors, 2);
    assert_eq!(
        report
            .log
            .iter()
            .filter(|line| line.severity == recast_dispatch::Severity::Error)
            .count(),
        2
    );
}

/// Runner emitting a monotone progress ramp.
struct RampRunner;

impl JobRunner for RampRunner {
    fn run(&self, _job: Job, events: EventSender, _cancel: Arc<AtomicBool>) {
        for value in [0u8, 10, 25, 50, 75, 100] {
            events.progress(value);
        }
        events.finished(false, false);
    }
}

#[test]
fn test_per_job_events_arrive_in_emission_order() {
    let progress: Arc<Mutex<std::collections::HashMap<usize, Vec<u8>>>> =
        Arc::new(Mutex::new(std::collections::HashMap::new()));
    let seen = Arc::clone(&progress);

    let mut dispatcher = Dispatcher::with_runner(RampRunner).with_observer(move |notice| {
        if let Notice::Event { job, event } = notice {
            if let Event::Progress(value) = event {
                seen.lock().unwrap().entry(job.0).or_default().push(*value);
            }
        }
    });

    let report = dispatcher.run(files(4), config_with_threads(2)).unwrap();
    assert_eq!(report.completed, 4);

    let progress = progress.lock().unwrap();
    assert_eq!(progress.len(), 4);
    for ramp in progress.values() {
        assert_eq!(ramp, &vec![0, 10, 25, 50, 75, 100]);
        assert_eq!(*ramp.last().unwrap(), 100);
    }
}

/// Runner that spins until cancelled, like a pipeline polling its stop
/// flag at packet boundaries.
struct BlockingRunner {
    started: AtomicUsize,
}

impl JobRunner for Arc<BlockingRunner> {
    fn run(&self, _job: Job, events: EventSender, cancel: Arc<AtomicBool>) {
        self.started.fetch_add(1, Ordering::SeqCst);
        while !cancel.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(1));
        }
        events.finished(true, false);
    }
}

#[test]
fn test_cancel_stops_admission_and_counts_no_completions() {
    let runner = Arc::new(BlockingRunner {
        started: AtomicUsize::new(0),
    });
    let mut dispatcher = Dispatcher::with_runner(Arc::clone(&runner));
    let handle = dispatcher.cancel_handle();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        handle.cancel();
    });

    let report = dispatcher.run(files(8), config_with_threads(2)).unwrap();
    canceller.join().unwrap();

    assert!(report.cancelled);
    assert_eq!(report.completed, 0);

    // Only the initially admitted jobs ever ran, and every one of them
    // observed the cancellation.
    let started = runner.started.load(Ordering::SeqCst);
    assert!(started <= 2, "at most two jobs may be admitted, saw {started}");
    assert_eq!(report.cancelled_jobs, started);
}

/// Runner that counts invocations; must never run on invalid config.
struct CountingRunner(Arc<AtomicUsize>);

impl JobRunner for CountingRunner {
    fn run(&self, _job: Job, events: EventSender, _cancel: Arc<AtomicBool>) {
        self.0.fetch_add(1, Ordering::SeqCst);
        events.finished(false, false);
    }
}

#[test]
fn test_invalid_codec_pair_aborts_before_any_job() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = Dispatcher::with_runner(CountingRunner(Arc::clone(&calls)));

    let config = Configuration {
        video_codec: recast_core::VideoCodec::Vp8,
        audio_codec: recast_core::AudioCodec::Aac,
        ..Configuration::default()
    };
    let err = dispatcher.run(files(3), config).unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_empty_file_list_yields_empty_report() {
    let gauge = Arc::new(GaugeRunner::new());
    let mut dispatcher = Dispatcher::with_runner(Arc::clone(&gauge));
    let report = dispatcher
        .run(Vec::new(), config_with_threads(2))
        .unwrap();
    assert_eq!(report.completed, 0);
    assert!(report.log.is_empty());
}
