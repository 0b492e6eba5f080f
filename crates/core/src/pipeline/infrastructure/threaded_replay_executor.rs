use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::pipeline::replay_executor::{ReplayConfig, ReplayExecutor, ReplaySummary};
use crate::pipeline::track_presence_use_case::{CycleOutput, TrackPresenceUseCase};
use crate::replay::domain::cycle_writer::CycleWriter;
use crate::replay::domain::frame_source::{FrameBatch, FrameSource};

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// How the tracking loop on the calling thread ended.
enum LoopExit {
    Completed,
    /// The writer hung up; its own error explains why.
    WriterClosed,
    Failed(Box<dyn std::error::Error>),
}

/// Replays a detection source with dedicated threads for input and output.
///
/// Layout: `reader → main [track] → writer`
///
/// Tracking stays on the calling thread so cycles run strictly in input
/// order; parsing and serialization overlap with it.
pub struct ThreadedReplayExecutor {
    channel_capacity: usize,
}

impl ThreadedReplayExecutor {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_capacity(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
        }
    }
}

impl Default for ThreadedReplayExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayExecutor for ThreadedReplayExecutor {
    fn execute(
        &self,
        source: Box<dyn FrameSource>,
        writer: Box<dyn CycleWriter>,
        tracker: &mut TrackPresenceUseCase,
        config: ReplayConfig,
    ) -> Result<ReplaySummary, Box<dyn std::error::Error>> {
        let cap = self.channel_capacity;
        let (batch_tx, batch_rx) = crossbeam_channel::bounded::<Result<FrameBatch, SendError>>(cap);
        let (write_tx, write_rx) = crossbeam_channel::bounded::<CycleOutput>(cap);

        let reader_handle = spawn_reader(source, batch_tx, config.cancelled.clone());
        let writer_handle = spawn_writer(writer, write_rx);

        let mut summary = ReplaySummary::default();
        let exit = run_main_loop(batch_rx, &write_tx, tracker, &config, &mut summary);

        let completed = matches!(exit, LoopExit::Completed);
        if completed && config.flush_on_exit && !config.cancelled.load(Ordering::Relaxed) {
            let outcome = tracker.finalize_all();
            summary.sessions_finalized += outcome.finalized.len();
            summary.sink_failures += outcome.warnings.len();
            if !outcome.finalized.is_empty() {
                let last = CycleOutput {
                    timestamp: summary.last_timestamp.unwrap_or_default(),
                    finalized: outcome.finalized,
                    warnings: outcome.warnings,
                    ..CycleOutput::default()
                };
                // A closed writer surfaces its own error on join.
                let _ = write_tx.send(last);
            }
        }

        drop(write_tx);
        join_threads(reader_handle, writer_handle, exit)?;
        Ok(summary)
    }
}

fn spawn_reader(
    mut source: Box<dyn FrameSource>,
    batch_tx: Sender<Result<FrameBatch, SendError>>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for batch in source.batches() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let is_err = batch.is_err();
            let mapped = batch.map_err(|e| -> SendError { e.to_string().into() });
            if batch_tx.send(mapped).is_err() || is_err {
                break;
            }
        }
        source.close();
    })
}

fn spawn_writer(
    mut writer: Box<dyn CycleWriter>,
    write_rx: Receiver<CycleOutput>,
) -> JoinHandle<Result<(), SendError>> {
    std::thread::spawn(move || {
        for output in write_rx {
            writer
                .write(&output)
                .map_err(|e| -> SendError { e.to_string().into() })?;
        }
        writer
            .close()
            .map_err(|e| -> SendError { e.to_string().into() })
    })
}

/// Runs one tracking cycle per received batch and forwards the output.
fn run_main_loop(
    batch_rx: Receiver<Result<FrameBatch, SendError>>,
    write_tx: &Sender<CycleOutput>,
    tracker: &mut TrackPresenceUseCase,
    config: &ReplayConfig,
    summary: &mut ReplaySummary,
) -> LoopExit {
    for batch in batch_rx {
        if config.cancelled.load(Ordering::Relaxed) {
            break;
        }

        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => return LoopExit::Failed(e.to_string().into()),
        };

        let output = match tracker.process(batch.detections, batch.timestamp) {
            Ok(output) => output,
            Err(e) => return LoopExit::Failed(Box::new(e)),
        };

        summary.cycles += 1;
        summary.last_timestamp = Some(output.timestamp);
        summary.sessions_finalized += output.finalized.len();
        summary.sink_failures += output.warnings.len();
        summary.detections_dropped += output.dropped;

        if write_tx.send(output).is_err() {
            return LoopExit::WriterClosed;
        }
    }
    LoopExit::Completed
}

/// Joins both worker threads and reports the most specific error.
///
/// A tracking failure wins over thread failures. A closed writer channel is
/// reported through the writer's own error.
fn join_threads(
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<Result<(), SendError>>,
    exit: LoopExit,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader_panicked = reader_handle.join().is_err();
    let writer_error: Option<Box<dyn std::error::Error>> = match writer_handle.join() {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string().into()),
        Err(_) => Some("Writer thread panicked".into()),
    };

    let error = match exit {
        LoopExit::Failed(e) => Some(e),
        LoopExit::WriterClosed => {
            Some(writer_error.unwrap_or_else(|| "Writer channel closed unexpectedly".into()))
        }
        LoopExit::Completed if reader_panicked => Some("Reader thread panicked".into()),
        LoopExit::Completed => writer_error,
    };

    match error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
