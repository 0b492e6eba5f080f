use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::replay::domain::frame_source::{FrameBatch, FrameSource};

/// Reads one [`FrameBatch`] JSON object per line.
///
/// Blank lines are skipped. A line that is not a valid batch is an error
/// naming its line number; individual malformed detections inside a valid
/// batch are left for the tracker to drop.
pub struct JsonLinesFrameReader<R> {
    input: Option<R>,
}

impl JsonLinesFrameReader<BufReader<File>> {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead + Send> JsonLinesFrameReader<R> {
    pub fn new(input: R) -> Self {
        Self { input: Some(input) }
    }
}

impl<R: BufRead + Send> FrameSource for JsonLinesFrameReader<R> {
    fn batches(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<FrameBatch, Box<dyn std::error::Error>>> + '_> {
        let Some(input) = self.input.as_mut() else {
            return Box::new(std::iter::empty());
        };
        Box::new(
            input
                .lines()
                .enumerate()
                .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
                .map(|(idx, line)| -> Result<FrameBatch, Box<dyn std::error::Error>> {
                    let line = line?;
                    serde_json::from_str(&line)
                        .map_err(|e| format!("invalid frame batch on line {}: {e}", idx + 1).into())
                }),
        )
    }

    fn close(&mut self) {
        self.input = None;
    }
}
