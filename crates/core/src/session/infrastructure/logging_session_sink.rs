use crate::session::domain::session_sink::{SessionSink, SinkError};
use crate::shared::session::SessionRecord;

/// Writes finalized sessions to the log instead of durable storage.
pub struct LoggingSessionSink;

impl SessionSink for LoggingSessionSink {
    fn emit(&mut self, record: &SessionRecord) -> Result<(), SinkError> {
        let external = record.external_id.as_deref().unwrap_or("-");
        log::info!(
            "Session record: track={} name='{}' known={} external_id={external} duration={:.1}s",
            record.track_id,
            record.name,
            record.is_known,
            record.duration_secs
        );
        Ok(())
    }
}
