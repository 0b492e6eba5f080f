use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::session::SessionRecord;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("session sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize session record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("session sink rejected record: {0}")]
    Rejected(String),
}

/// Destination for finalized session records.
///
/// Fire-and-forget from the engine's perspective: a failed `emit` is
/// reported back to the caller as a [`SinkWarning`] but never undoes the
/// eviction that produced the record.
pub trait SessionSink: Send {
    fn emit(&mut self, record: &SessionRecord) -> Result<(), SinkError>;
}

/// A record that was evicted but could not be persisted.
///
/// Carries the record so the caller can retry or reconcile it out-of-band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SinkWarning {
    pub record: SessionRecord,
    pub message: String,
}

/// Sink that discards every record.
pub struct NullSessionSink;

impl SessionSink for NullSessionSink {
    fn emit(&mut self, _record: &SessionRecord) -> Result<(), SinkError> {
        Ok(())
    }
}
