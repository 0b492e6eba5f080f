use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::replay::domain::cycle_writer::CycleWriter;
use crate::replay::domain::frame_source::FrameSource;
use crate::shared::timestamp::Timestamp;

use super::track_presence_use_case::TrackPresenceUseCase;

/// Options for one replay run.
pub struct ReplayConfig {
    /// Finalize and emit every still-active session once the source is exhausted.
    pub flush_on_exit: bool,
    pub cancelled: Arc<AtomicBool>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            flush_on_exit: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Totals for a finished replay.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplaySummary {
    pub cycles: usize,
    pub sessions_finalized: usize,
    pub sink_failures: usize,
    pub detections_dropped: usize,
    pub last_timestamp: Option<Timestamp>,
}

/// Abstracts how the `source → tracker → writer` replay is executed.
pub trait ReplayExecutor: Send {
    fn execute(
        &self,
        source: Box<dyn FrameSource>,
        writer: Box<dyn CycleWriter>,
        tracker: &mut TrackPresenceUseCase,
        config: ReplayConfig,
    ) -> Result<ReplaySummary, Box<dyn std::error::Error>>;
}
