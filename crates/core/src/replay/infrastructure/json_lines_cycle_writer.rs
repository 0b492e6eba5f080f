use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::pipeline::track_presence_use_case::CycleOutput;
use crate::replay::domain::cycle_writer::CycleWriter;

/// Writes each cycle's output as one JSON object per line.
pub struct JsonLinesCycleWriter<W: Write> {
    out: W,
}

impl JsonLinesCycleWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write + Send> JsonLinesCycleWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> CycleWriter for JsonLinesCycleWriter<W> {
    fn write(&mut self, output: &CycleOutput) -> Result<(), Box<dyn std::error::Error>> {
        serde_json::to_writer(&mut self.out, output)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.out.flush()?;
        Ok(())
    }
}
