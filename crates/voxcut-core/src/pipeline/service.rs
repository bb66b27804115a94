//! Background processing service
//!
//! One run = one worker thread. The worker owns the adapter for the length of
//! the run (load → reconstruct → write → release), streams
//! [`ProcessingStatus`] messages over an mpsc channel and hands the final
//! result back through a oneshot.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use super::message::ProcessingStatus;
use super::reconstruct::ReconstructionPipeline;
use super::PipelineOptions;
use crate::error::{ProcessingError, Result};
use crate::manifest::ProcessingManifest;
use crate::output::{OutputWriter, WrittenOutput};
use crate::section::SectionSet;
use crate::separation::SeparationAdapter;
use crate::types::Track;

/// Everything a run needs from the editing session
///
/// The section set is a snapshot; edits made while the run is in flight
/// don't affect it.
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    pub track: Arc<Track>,
    pub sections: SectionSet,
    pub source_path: PathBuf,
}

impl ProcessingRequest {
    /// File name of the source, for the manifest and the run directory
    pub fn source_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string())
    }

    /// Checks that need no model, run before the adapter is loaded
    fn validate(&self) -> Result<()> {
        if self.sections.is_empty() {
            return Err(ProcessingError::NoSections);
        }
        self.sections.validate_against(self.track.duration_secs())?;
        self.sections.overlap_check()
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub written: WrittenOutput,
    pub manifest: ProcessingManifest,
    pub output_frames: usize,
    pub output_secs: f64,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

/// Caller's side of a running job
pub struct ProcessingHandle {
    progress: Receiver<ProcessingStatus>,
    result: oneshot::Receiver<Result<RunOutcome>>,
    cancel_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ProcessingHandle {
    /// Status messages; the channel closes once the worker exits
    pub fn progress(&self) -> &Receiver<ProcessingStatus> {
        &self.progress
    }

    /// Next status message without blocking, if any
    pub fn try_status(&self) -> Option<ProcessingStatus> {
        match self.progress.try_recv() {
            Ok(status) => Some(status),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Ask the worker to stop at the next checkpoint
    ///
    /// A section already inside the adapter runs to completion and its
    /// result is discarded. Nothing is written for a cancelled run.
    pub fn cancel(&self) {
        log::info!("ProcessingHandle: cancel requested");
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    /// Block until the run finishes
    ///
    /// Must not be called from inside an async runtime; use
    /// [`finished`](Self::finished) there.
    pub fn wait(mut self) -> Result<RunOutcome> {
        let thread = self.thread.take();
        let result = self.result.blocking_recv();
        join_worker(thread);
        result.unwrap_or(Err(ProcessingError::WorkerLost))
    }

    /// Await the end of the run
    pub async fn finished(mut self) -> Result<RunOutcome> {
        let thread = self.thread.take();
        let result = self.result.await;
        // The worker sends its result as its last action
        join_worker(thread);
        result.unwrap_or(Err(ProcessingError::WorkerLost))
    }
}

fn join_worker(thread: Option<JoinHandle<()>>) {
    if let Some(thread) = thread {
        if thread.join().is_err() {
            log::error!("ProcessingHandle: worker thread panicked");
        }
    }
}

/// Starts processing runs on dedicated worker threads
pub struct ProcessingService;

impl ProcessingService {
    /// Start a run in the background
    ///
    /// The adapter is loaded on the worker thread and released before the
    /// worker exits, whatever the outcome.
    pub fn spawn(
        request: ProcessingRequest,
        adapter: Box<dyn SeparationAdapter>,
        options: PipelineOptions,
        writer: OutputWriter,
    ) -> std::io::Result<ProcessingHandle> {
        let (progress_tx, progress_rx) = channel();
        let (result_tx, result_rx) = oneshot::channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let worker_cancel = cancel_flag.clone();

        let thread = std::thread::Builder::new()
            .name("voxcut-process".to_string())
            .spawn(move || {
                let outcome =
                    run_job(request, adapter, options, writer, &worker_cancel, &progress_tx);
                if result_tx.send(outcome).is_err() {
                    log::debug!("ProcessingService: handle dropped before the run finished");
                }
            })?;

        Ok(ProcessingHandle {
            progress: progress_rx,
            result: result_rx,
            cancel_flag,
            thread: Some(thread),
        })
    }
}

fn run_job(
    request: ProcessingRequest,
    mut adapter: Box<dyn SeparationAdapter>,
    options: PipelineOptions,
    writer: OutputWriter,
    cancel: &AtomicBool,
    progress_tx: &Sender<ProcessingStatus>,
) -> Result<RunOutcome> {
    let start_time = Instant::now();
    let result = run_stages(
        &request,
        adapter.as_mut(),
        options,
        &writer,
        cancel,
        progress_tx,
        start_time,
    );

    if adapter.is_loaded() {
        adapter.release();
        log::info!("ProcessingService: released {} adapter", adapter.name());
    }

    let terminal = match &result {
        Ok(outcome) => {
            log::info!(
                "ProcessingService: run complete in {:.2}s, output in {:?}",
                outcome.duration.as_secs_f64(),
                outcome.written.dir
            );
            ProcessingStatus::Complete {
                output_dir: outcome.written.dir.clone(),
                duration: outcome.duration,
            }
        }
        Err(ProcessingError::Cancelled) => ProcessingStatus::Cancelled,
        Err(e) => {
            log::error!("ProcessingService: {}", e);
            ProcessingStatus::Failed {
                message: e.status_message(),
            }
        }
    };
    let _ = progress_tx.send(terminal);
    result
}

fn run_stages(
    request: &ProcessingRequest,
    adapter: &mut dyn SeparationAdapter,
    options: PipelineOptions,
    writer: &OutputWriter,
    cancel: &AtomicBool,
    progress_tx: &Sender<ProcessingStatus>,
    start_time: Instant,
) -> Result<RunOutcome> {
    request.validate()?;

    let _ = progress_tx.send(ProcessingStatus::LoadingModel {
        backend: adapter.name().to_string(),
    });
    if !adapter.is_loaded() {
        adapter
            .load()
            .map_err(|e| ProcessingError::ModelLoad(format!("{:#}", e)))?;
    }
    if cancel.load(Ordering::SeqCst) {
        return Err(ProcessingError::Cancelled);
    }

    let observer = |status: ProcessingStatus| {
        let _ = progress_tx.send(status);
    };
    let source_name = request.source_name();
    let reconstruction = ReconstructionPipeline::new(&*adapter, options)
        .with_cancel(cancel)
        .with_observer(&observer)
        .run(&request.track, &request.sections, &source_name)?;

    if cancel.load(Ordering::SeqCst) {
        return Err(ProcessingError::Cancelled);
    }

    let _ = progress_tx.send(ProcessingStatus::Exporting {
        output_secs: reconstruction.output.duration_secs(),
    });
    let written = writer.write(&reconstruction.output, &reconstruction.manifest)?;

    Ok(RunOutcome {
        written,
        output_frames: reconstruction.output.frames(),
        output_secs: reconstruction.output.duration_secs(),
        manifest: reconstruction.manifest,
        duration: start_time.elapsed(),
    })
}
