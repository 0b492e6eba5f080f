use std::collections::HashSet;

use crate::session::domain::session_store::{SessionStore, StoreError};
use crate::shared::constants::{DEFAULT_PROXIMITY_THRESHOLD, DEFAULT_SESSION_TIMEOUT_SECS};
use crate::shared::detection::Detection;
use crate::shared::timestamp::Timestamp;

/// Result of associating one frame's detections with sessions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// `track_id` for each input detection, in input order.
    pub assignments: Vec<u32>,
    /// Ids of the sessions created this cycle, in creation order.
    pub created: Vec<u32>,
}

/// Associates detections with active sessions by spatial proximity alone.
///
/// The recognizer's name hypothesis flips between placeholder and real
/// labels for the same subject, so it plays no part in matching. Each
/// detection claims the nearest unclaimed session whose last box center is
/// closer than `proximity_threshold`; ties go to the lowest `track_id`.
/// Unmatched detections open new sessions.
pub struct IdentityMatcher {
    proximity_threshold: f64,
    timeout_secs: f64,
}

impl IdentityMatcher {
    pub fn new(proximity_threshold: f64, timeout_secs: f64) -> Self {
        Self {
            proximity_threshold,
            timeout_secs,
        }
    }

    pub fn assign(
        &self,
        detections: &[Detection],
        store: &mut SessionStore,
        now: Timestamp,
    ) -> Result<MatchOutcome, StoreError> {
        let mut claimed: HashSet<u32> = HashSet::with_capacity(detections.len());
        let mut outcome = MatchOutcome {
            assignments: Vec::with_capacity(detections.len()),
            created: Vec::new(),
        };

        for det in detections {
            let track_id = match self.nearest_candidate(det, store, &claimed, now) {
                Some(track_id) => {
                    store.upsert(track_id, det, now)?;
                    track_id
                }
                None => {
                    let track_id = store.create(det, now)?;
                    log::info!(
                        "Session {track_id} started for '{}' (known: {})",
                        det.name,
                        det.is_known
                    );
                    outcome.created.push(track_id);
                    track_id
                }
            };
            claimed.insert(track_id);
            outcome.assignments.push(track_id);
        }

        Ok(outcome)
    }

    /// Sessions already past the timeout are skipped even if the reaper has
    /// not evicted them yet, so match-then-reap and reap-then-match agree.
    fn nearest_candidate(
        &self,
        det: &Detection,
        store: &SessionStore,
        claimed: &HashSet<u32>,
        now: Timestamp,
    ) -> Option<u32> {
        let mut best: Option<(u32, f64)> = None;
        for session in store.all_active() {
            if claimed.contains(&session.track_id) || session.is_expired(now, self.timeout_secs) {
                continue;
            }
            let dist = session.bbox.center_distance(&det.bbox);
            if dist >= self.proximity_threshold {
                continue;
            }
            // Ascending id iteration plus strict `<` keeps the lowest id on ties.
            if best.map_or(true, |(_, best_dist)| dist < best_dist) {
                best = Some((session.track_id, dist));
            }
        }
        best.map(|(track_id, _)| track_id)
    }
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PROXIMITY_THRESHOLD, DEFAULT_SESSION_TIMEOUT_SECS)
    }
}
