use crate::shared::constants::DEFAULT_SESSION_TIMEOUT_SECS;
use crate::shared::session::SessionRecord;
use crate::shared::timestamp::Timestamp;

use super::session_sink::{SessionSink, SinkWarning};
use super::session_store::SessionStore;

/// Records finalized during one sweep, plus any that the sink failed to persist.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReapOutcome {
    pub finalized: Vec<SessionRecord>,
    pub warnings: Vec<SinkWarning>,
}

/// Finalizes sessions whose subject has gone silent for longer than the timeout.
///
/// Runs inline on every cycle; there is no background sweep, so a record's
/// `last_seen` is exact but the eviction itself lags by up to one cycle.
pub struct SessionReaper {
    timeout_secs: f64,
}

impl SessionReaper {
    pub fn new(timeout_secs: f64) -> Self {
        Self { timeout_secs }
    }

    pub fn timeout_secs(&self) -> f64 {
        self.timeout_secs
    }

    pub fn reap(
        &self,
        store: &mut SessionStore,
        now: Timestamp,
        sink: &mut dyn SessionSink,
    ) -> ReapOutcome {
        let finalized = store.evict_expired(now, self.timeout_secs);
        let warnings = emit_all(&finalized, sink);
        ReapOutcome {
            finalized,
            warnings,
        }
    }

    /// Finalizes every session regardless of age.
    pub fn reap_all(&self, store: &mut SessionStore, sink: &mut dyn SessionSink) -> ReapOutcome {
        let finalized = store.drain();
        let warnings = emit_all(&finalized, sink);
        ReapOutcome {
            finalized,
            warnings,
        }
    }
}

impl Default for SessionReaper {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TIMEOUT_SECS)
    }
}

/// Emits each record once. The records are already out of the store, so a
/// failure here only produces a warning.
fn emit_all(records: &[SessionRecord], sink: &mut dyn SessionSink) -> Vec<SinkWarning> {
    let mut warnings = Vec::new();
    for record in records {
        log::debug!(
            "Session {} finalized: '{}' present for {:.1}s",
            record.track_id,
            record.name,
            record.duration_secs
        );
        if let Err(e) = sink.emit(record) {
            log::warn!("Failed to persist session {}: {e}", record.track_id);
            warnings.push(SinkWarning {
                record: record.clone(),
                message: e.to_string(),
            });
        }
    }
    warnings
}
