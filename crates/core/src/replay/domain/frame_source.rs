use serde::{Deserialize, Serialize};

use crate::shared::detection::RawDetection;
use crate::shared::timestamp::Timestamp;

/// One frame's worth of detector output: the input of one tracking cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameBatch {
    pub timestamp: Timestamp,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

/// Abstracts where detection batches come from (log file, socket, detector)
/// so the replay pipeline does not depend on a specific transport.
pub trait FrameSource: Send {
    fn batches(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<FrameBatch, Box<dyn std::error::Error>>> + '_>;

    fn close(&mut self) {}
}
