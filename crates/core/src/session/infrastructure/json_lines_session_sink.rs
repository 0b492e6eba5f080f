use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::session::domain::session_sink::{SessionSink, SinkError};
use crate::shared::session::SessionRecord;

/// Appends each finalized session as one JSON object per line.
///
/// Each record is flushed as soon as it is written so a crash loses at
/// most the record in flight.
pub struct JsonLinesSessionSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSessionSink {
    /// Opens `path` for appending, creating it and its parent directory if missing.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionSink for JsonLinesSessionSink {
    fn emit(&mut self, record: &SessionRecord) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
