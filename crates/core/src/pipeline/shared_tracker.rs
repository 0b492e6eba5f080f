use std::sync::{Arc, Mutex, MutexGuard};

use crate::session::domain::session_reaper::ReapOutcome;
use crate::shared::detection::RawDetection;
use crate::shared::session::ActiveSession;
use crate::shared::timestamp::Timestamp;

use super::track_presence_use_case::{CycleOutput, TrackPresenceUseCase, TrackingError};

/// Thread-safe handle to one tracker, cheap to clone across request handlers.
///
/// Each `process` call holds the lock for the whole cycle, so two batches
/// can never interleave their matching against the same session store.
#[derive(Clone)]
pub struct SharedTracker {
    inner: Arc<Mutex<TrackPresenceUseCase>>,
}

impl SharedTracker {
    pub fn new(tracker: TrackPresenceUseCase) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tracker)),
        }
    }

    pub fn process(
        &self,
        raw: Vec<RawDetection>,
        now: Timestamp,
    ) -> Result<CycleOutput, TrackingError> {
        self.lock()?.process(raw, now)
    }

    pub fn active_sessions(&self) -> Result<Vec<ActiveSession>, TrackingError> {
        Ok(self.lock()?.active_sessions())
    }

    pub fn finalize_all(&self) -> Result<ReapOutcome, TrackingError> {
        Ok(self.lock()?.finalize_all())
    }

    /// A panic mid-cycle leaves the store in an unknown state, so a poisoned
    /// mutex is treated like a store failure.
    fn lock(&self) -> Result<MutexGuard<'_, TrackPresenceUseCase>, TrackingError> {
        self.inner.lock().map_err(|_| TrackingError::Poisoned)
    }
}
