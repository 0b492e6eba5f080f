use serde::{Deserialize, Serialize};

use super::bbox::BoundingBox;
use super::detection::Detection;
use super::timestamp::Timestamp;

/// Directory entry attached to a session once its subject is recognized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub external_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Finalized,
}

/// Continuity of one physical subject across frames.
///
/// `track_id` is fixed at creation; every other observation field is
/// overwritten on each matched cycle, so `name` and `is_known` may flip
/// freely during the session's life.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub track_id: u32,
    pub bbox: BoundingBox,
    pub name: String,
    pub is_known: bool,
    pub confidence: f64,
    pub identity: Option<IdentityRecord>,
    /// Name the current `identity` was looked up for.
    pub resolved_name: Option<String>,
    /// Most recent name observed while the recognizer reported the subject as known.
    pub last_known_name: Option<String>,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub state: SessionState,
}

impl Session {
    pub fn new(track_id: u32, detection: &Detection, now: Timestamp) -> Self {
        Self {
            track_id,
            bbox: detection.bbox,
            name: detection.name.clone(),
            is_known: detection.is_known,
            confidence: detection.confidence,
            identity: None,
            resolved_name: None,
            last_known_name: detection.is_known.then(|| detection.name.clone()),
            first_seen: now,
            last_seen: now,
            state: SessionState::Active,
        }
    }

    /// Overwrites the current observation. `track_id` and `first_seen` never change.
    ///
    /// An observation stamped earlier than `last_seen` (out-of-order batches,
    /// or concurrent callers taking the lock in a different order than they
    /// read the clock) is ignored, so `last_seen` never moves backwards.
    pub fn observe(&mut self, detection: &Detection, now: Timestamp) {
        if now < self.last_seen {
            log::debug!(
                "Session {}: ignoring observation at {:.3}s older than last seen {:.3}s",
                self.track_id,
                now.as_secs(),
                self.last_seen.as_secs()
            );
            return;
        }
        self.bbox = detection.bbox;
        self.name = detection.name.clone();
        self.is_known = detection.is_known;
        self.confidence = detection.confidence;
        self.last_seen = now;
        if detection.is_known {
            self.last_known_name = Some(detection.name.clone());
        }
    }

    pub fn external_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.external_id.as_str())
    }

    pub fn silence_secs(&self, now: Timestamp) -> f64 {
        now.secs_since(self.last_seen)
    }

    pub fn is_expired(&self, now: Timestamp, timeout_secs: f64) -> bool {
        self.silence_secs(now) > timeout_secs
    }

    pub fn view(&self) -> ActiveSession {
        ActiveSession {
            track_id: self.track_id,
            bbox: self.bbox,
            name: self.name.clone(),
            is_known: self.is_known,
            confidence: self.confidence,
            external_id: self.external_id().map(str::to_string),
            affiliation: self.identity.as_ref().and_then(|i| i.affiliation.clone()),
        }
    }

    /// Consumes the session into its one durable summary.
    ///
    /// A session that was ever recognized reports its last recognized name,
    /// even if the final frames flickered back to a placeholder label.
    pub fn finalize(mut self) -> SessionRecord {
        self.state = SessionState::Finalized;
        let (name, is_known) = match self.last_known_name.take() {
            Some(name) => (name, true),
            None => (self.name.clone(), false),
        };
        SessionRecord {
            track_id: self.track_id,
            name,
            external_id: self.external_id().map(str::to_string),
            affiliation: self.identity.as_ref().and_then(|i| i.affiliation.clone()),
            is_known,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            duration_secs: self.last_seen.secs_since(self.first_seen),
        }
    }
}

/// Snapshot of an active session handed to the consuming surface each cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub track_id: u32,
    pub bbox: BoundingBox,
    pub name: String,
    pub is_known: bool,
    pub confidence: f64,
    pub external_id: Option<String>,
    pub affiliation: Option<String>,
}

/// Durable summary emitted exactly once when a session is finalized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub track_id: u32,
    pub name: String,
    pub external_id: Option<String>,
    pub affiliation: Option<String>,
    pub is_known: bool,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub duration_secs: f64,
}
