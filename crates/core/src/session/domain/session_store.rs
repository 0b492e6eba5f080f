use std::collections::BTreeMap;

use thiserror::Error;

use crate::shared::detection::Detection;
use crate::shared::session::{Session, SessionRecord};
use crate::shared::timestamp::Timestamp;

/// Broken allocator or storage invariants. Never recoverable.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("track id {0} is already present in the session store")]
    DuplicateTrackId(u32),
    #[error("track id {0} belongs to a finalized session and cannot be reused")]
    RetiredTrackId(u32),
    #[error("track id space exhausted")]
    IdsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

/// Authoritative map of active sessions, keyed by `track_id`.
///
/// Owns the id allocator: ids start at 1, only ever increase, and are never
/// handed out twice even after the session that held one is evicted.
/// Iteration is in ascending `track_id` order.
#[derive(Debug)]
pub struct SessionStore {
    sessions: BTreeMap<u32, Session>,
    next_id: u32,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Mints a fresh id and inserts a session for `detection` under it.
    pub fn create(&mut self, detection: &Detection, now: Timestamp) -> Result<u32, StoreError> {
        let track_id = self.mint_id()?;
        self.insert(Session::new(track_id, detection, now))?;
        Ok(track_id)
    }

    /// Overwrites the observation of `track_id`, or creates it if the id has
    /// never been issued.
    ///
    /// Creating under an explicit id advances the allocator past it so the
    /// monotonic ordering holds. An id that was issued and later evicted is
    /// rejected.
    pub fn upsert(
        &mut self,
        track_id: u32,
        detection: &Detection,
        now: Timestamp,
    ) -> Result<Upsert, StoreError> {
        if let Some(session) = self.sessions.get_mut(&track_id) {
            session.observe(detection, now);
            return Ok(Upsert::Updated);
        }
        if track_id < self.next_id {
            return Err(StoreError::RetiredTrackId(track_id));
        }
        self.next_id = track_id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        self.insert(Session::new(track_id, detection, now))?;
        Ok(Upsert::Created)
    }

    fn insert(&mut self, session: Session) -> Result<(), StoreError> {
        let track_id = session.track_id;
        if self.sessions.contains_key(&track_id) {
            return Err(StoreError::DuplicateTrackId(track_id));
        }
        self.sessions.insert(track_id, session);
        Ok(())
    }

    fn mint_id(&mut self) -> Result<u32, StoreError> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        Ok(id)
    }

    pub fn get(&self, track_id: u32) -> Option<&Session> {
        self.sessions.get(&track_id)
    }

    pub fn get_mut(&mut self, track_id: u32) -> Option<&mut Session> {
        self.sessions.get_mut(&track_id)
    }

    pub fn all_active(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub(crate) fn all_active_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Removes every session silent for longer than `timeout_secs` and
    /// returns their records. Removal and record creation happen together,
    /// so a session can be returned from here at most once.
    pub fn evict_expired(&mut self, now: Timestamp, timeout_secs: f64) -> Vec<SessionRecord> {
        let expired: Vec<u32> = self
            .sessions
            .values()
            .filter(|s| s.is_expired(now, timeout_secs))
            .map(|s| s.track_id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.sessions.remove(&id))
            .map(Session::finalize)
            .collect()
    }

    /// Removes and finalizes every remaining session.
    pub fn drain(&mut self) -> Vec<SessionRecord> {
        std::mem::take(&mut self.sessions)
            .into_values()
            .map(Session::finalize)
            .collect()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
