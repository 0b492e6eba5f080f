use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::domain::deduplicator::Deduplicator;
use crate::identity::domain::identity_matcher::IdentityMatcher;
use crate::identity::domain::identity_resolver::{resolve_known_sessions, IdentityResolver};
use crate::identity::domain::session_hook::SessionHook;
use crate::session::domain::session_reaper::{ReapOutcome, SessionReaper};
use crate::session::domain::session_sink::{SessionSink, SinkWarning};
use crate::session::domain::session_store::{SessionStore, StoreError};
use crate::shared::detection::{Detection, RawDetection};
use crate::shared::session::{ActiveSession, SessionRecord};
use crate::shared::timestamp::Timestamp;
use crate::shared::tracker_config::TrackerConfig;

use super::pipeline_logger::PipelineLogger;

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("session store corrupted: {0}")]
    Store(#[from] StoreError),
    #[error("tracker halted after an earlier session store failure")]
    Poisoned,
}

/// Everything the consuming surface needs after one cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleOutput {
    pub timestamp: Timestamp,
    /// `track_id` of each accepted detection, in deduplicated order.
    pub assignments: Vec<u32>,
    /// Every active session after this cycle, ascending by `track_id`.
    pub active: Vec<ActiveSession>,
    /// Sessions that ended this cycle ("subject departed").
    pub finalized: Vec<SessionRecord>,
    /// Finalized sessions the sink failed to persist.
    pub warnings: Vec<SinkWarning>,
    /// Malformed detections discarded before deduplication.
    pub dropped: usize,
}

/// Turns per-frame detections into a stable stream of presence sessions.
///
/// One call to [`process`](Self::process) is one cycle:
/// `validate → deduplicate → match → resolve → reap`. The use case owns the
/// session store outright; concurrent callers go through
/// [`SharedTracker`](super::shared_tracker::SharedTracker).
///
/// A store invariant violation halts the tracker permanently: every later
/// cycle returns [`TrackingError::Poisoned`].
pub struct TrackPresenceUseCase {
    deduplicator: Deduplicator,
    matcher: IdentityMatcher,
    reaper: SessionReaper,
    store: SessionStore,
    resolver: Box<dyn IdentityResolver>,
    sink: Box<dyn SessionSink>,
    hook: Box<dyn SessionHook>,
    logger: Box<dyn PipelineLogger>,
    cycles: usize,
    poisoned: bool,
}

impl TrackPresenceUseCase {
    pub fn new(
        config: &TrackerConfig,
        resolver: Box<dyn IdentityResolver>,
        sink: Box<dyn SessionSink>,
        hook: Box<dyn SessionHook>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            deduplicator: Deduplicator::new(config.dedup_distance),
            matcher: IdentityMatcher::new(config.proximity_threshold, config.session_timeout_secs),
            reaper: SessionReaper::new(config.session_timeout_secs),
            store: SessionStore::new(),
            resolver,
            sink,
            hook,
            logger,
            cycles: 0,
            poisoned: false,
        }
    }

    pub fn process(
        &mut self,
        raw: Vec<RawDetection>,
        now: Timestamp,
    ) -> Result<CycleOutput, TrackingError> {
        if self.poisoned {
            return Err(TrackingError::Poisoned);
        }

        let (detections, dropped) = validate(raw);

        let started = Instant::now();
        let detections = self.deduplicator.deduplicate(detections);
        self.logger.timing("dedup", elapsed_ms(started));

        let started = Instant::now();
        let matched = match self.matcher.assign(&detections, &mut self.store, now) {
            Ok(matched) => matched,
            Err(e) => {
                self.poisoned = true;
                log::error!("Session store invariant violated, halting tracker: {e}");
                return Err(e.into());
            }
        };
        self.logger.timing("match", elapsed_ms(started));

        for track_id in &matched.created {
            if let Some(session) = self.store.get(*track_id) {
                self.hook.on_session_created(session);
            }
        }

        let started = Instant::now();
        resolve_known_sessions(&mut self.store, self.resolver.as_ref());
        self.logger.timing("resolve", elapsed_ms(started));

        let started = Instant::now();
        let reaped = self.reaper.reap(&mut self.store, now, self.sink.as_mut());
        self.logger.timing("reap", elapsed_ms(started));

        self.cycles += 1;
        self.logger.cycle(self.cycles);
        self.logger.metric("detections", detections.len() as f64);
        self.logger.metric("dropped", dropped as f64);
        self.logger.metric("active_sessions", self.store.len() as f64);

        Ok(CycleOutput {
            timestamp: now,
            assignments: matched.assignments,
            active: self.active_sessions(),
            finalized: reaped.finalized,
            warnings: reaped.warnings,
            dropped,
        })
    }

    /// Ends every remaining session, e.g. when the detection stream closes.
    pub fn finalize_all(&mut self) -> ReapOutcome {
        let outcome = self.reaper.reap_all(&mut self.store, self.sink.as_mut());
        if !outcome.finalized.is_empty() {
            self.logger.info(&format!(
                "Finalized {} remaining sessions at shutdown",
                outcome.finalized.len()
            ));
        }
        outcome
    }

    pub fn active_sessions(&self) -> Vec<ActiveSession> {
        self.store.all_active().map(|s| s.view()).collect()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    pub fn summary(&self) {
        self.logger.summary();
    }
}

/// Drops malformed detections. Returns the valid ones and how many were dropped.
fn validate(raw: Vec<RawDetection>) -> (Vec<Detection>, usize) {
    let mut dropped = 0;
    let detections = raw
        .into_iter()
        .filter_map(|r| match Detection::try_from(r) {
            Ok(det) => Some(det),
            Err(e) => {
                log::debug!("Dropping malformed detection: {e}");
                dropped += 1;
                None
            }
        })
        .collect();
    (detections, dropped)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::domain::identity_resolver::NullIdentityResolver;
    use crate::identity::domain::session_hook::NullSessionHook;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::session::domain::session_sink::{NullSessionSink, SinkError};
    use crate::shared::bbox::BoundingBox;
    use crate::shared::session::{IdentityRecord, Session};
    use approx::assert_relative_eq;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    struct RecordingSink {
        emitted: Arc<Mutex<Vec<SessionRecord>>>,
    }

    impl SessionSink for RecordingSink {
        fn emit(&mut self, record: &SessionRecord) -> Result<(), SinkError> {
            self.emitted.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl SessionSink for FailingSink {
        fn emit(&mut self, _record: &SessionRecord) -> Result<(), SinkError> {
            Err(SinkError::Rejected("store offline".into()))
        }
    }

    struct CountingHook {
        created: Arc<Mutex<Vec<u32>>>,
    }

    impl SessionHook for CountingHook {
        fn on_session_created(&mut self, session: &Session) {
            self.created.lock().unwrap().push(session.track_id);
        }
    }

    struct MapResolver(HashMap<String, IdentityRecord>);

    impl IdentityResolver for MapResolver {
        fn resolve(&self, name: &str) -> Option<IdentityRecord> {
            self.0.get(name).cloned()
        }
    }

    // --- Helpers ---

    fn raw_at(cx: f64, cy: f64, size: f64, name: &str, is_known: bool) -> RawDetection {
        let half = size / 2.0;
        RawDetection::new(
            BoundingBox::new(cx - half, cy - half, size, size),
            name,
            is_known,
            0.7,
        )
    }

    fn t(secs: f64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    fn tracker_with_sink(sink: Box<dyn SessionSink>) -> TrackPresenceUseCase {
        TrackPresenceUseCase::new(
            &TrackerConfig::default(),
            Box::new(NullIdentityResolver),
            sink,
            Box::new(NullSessionHook),
            Box::new(NullPipelineLogger),
        )
    }

    fn recording_tracker() -> (TrackPresenceUseCase, Arc<Mutex<Vec<SessionRecord>>>) {
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let tracker = tracker_with_sink(Box::new(RecordingSink {
            emitted: emitted.clone(),
        }));
        (tracker, emitted)
    }

    // --- Tests ---

    #[test]
    fn test_duplicates_collapse_into_one_session() {
        let (mut tracker, _) = recording_tracker();
        let out = tracker
            .process(
                vec![
                    raw_at(500.0, 400.0, 250.0, "Unknown_0", false),
                    raw_at(503.0, 400.0, 258.0, "Unknown_1", false),
                ],
                t(0.0),
            )
            .unwrap();
        assert_eq!(out.assignments.len(), 1);
        assert_eq!(out.active.len(), 1);
        assert_eq!(out.active[0].name, "Unknown_1");
        assert_relative_eq!(out.active[0].bbox.width, 258.0);
    }

    #[test]
    fn test_name_flip_keeps_track_id() {
        let (mut tracker, _) = recording_tracker();
        let first = tracker
            .process(vec![raw_at(571.0, 454.0, 200.0, "Unknown_0", false)], t(0.0))
            .unwrap();
        let second = tracker
            .process(vec![raw_at(573.0, 454.0, 200.0, "Subject-A", true)], t(1.0))
            .unwrap();

        assert_eq!(first.assignments, second.assignments);
        assert_eq!(second.active.len(), 1);
        assert_eq!(second.active[0].name, "Subject-A");
        assert!(second.active[0].is_known);
    }

    #[test]
    fn test_distant_subjects_get_distinct_ids_even_with_same_name() {
        let (mut tracker, _) = recording_tracker();
        let out = tracker
            .process(
                vec![
                    raw_at(300.0, 300.0, 100.0, "Subject-A", true),
                    raw_at(900.0, 300.0, 100.0, "Subject-A", true),
                ],
                t(0.0),
            )
            .unwrap();
        assert_eq!(out.assignments.len(), 2);
        assert_ne!(out.assignments[0], out.assignments[1]);
    }

    #[test]
    fn test_session_timeout_scenario() {
        let (mut tracker, emitted) = recording_tracker();
        let mut track_id = None;

        for secs in 0..=12 {
            let out = tracker
                .process(vec![raw_at(400.0, 300.0, 120.0, "Unknown_0", false)], t(secs as f64))
                .unwrap();
            assert_eq!(out.assignments.len(), 1);
            track_id.get_or_insert(out.assignments[0]);
            assert_eq!(Some(out.assignments[0]), track_id);
        }

        for secs in 13..=42 {
            let out = tracker.process(Vec::new(), t(secs as f64)).unwrap();
            assert!(out.finalized.is_empty(), "finalized early at t={secs}");
            assert_eq!(out.active.len(), 1);
        }

        let out = tracker.process(Vec::new(), t(43.0)).unwrap();
        assert_eq!(out.finalized.len(), 1);
        assert!(out.active.is_empty());
        let record = &out.finalized[0];
        assert_eq!(Some(record.track_id), track_id);
        assert_eq!(record.first_seen, t(0.0));
        assert_eq!(record.last_seen, t(12.0));
        assert_relative_eq!(record.duration_secs, 12.0);

        for secs in 44..100 {
            tracker.process(Vec::new(), t(secs as f64)).unwrap();
        }
        assert_eq!(emitted.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_reappearance_after_eviction_gets_new_id() {
        let (mut tracker, _) = recording_tracker();
        let first = tracker
            .process(vec![raw_at(400.0, 300.0, 120.0, "Subject-A", true)], t(0.0))
            .unwrap();
        tracker.process(Vec::new(), t(31.0)).unwrap();
        let again = tracker
            .process(vec![raw_at(400.0, 300.0, 120.0, "Subject-A", true)], t(32.0))
            .unwrap();

        assert!(again.assignments[0] > first.assignments[0]);
    }

    #[test]
    fn test_stale_session_not_revived_by_late_detection() {
        // No empty cycles in between: the late detection must not resume the
        // old session, and the old one is finalized in the same cycle.
        let (mut tracker, emitted) = recording_tracker();
        let first = tracker
            .process(vec![raw_at(400.0, 300.0, 120.0, "Subject-A", true)], t(0.0))
            .unwrap();
        let late = tracker
            .process(vec![raw_at(400.0, 300.0, 120.0, "Subject-A", true)], t(45.0))
            .unwrap();

        assert_ne!(late.assignments[0], first.assignments[0]);
        assert_eq!(late.finalized.len(), 1);
        assert_eq!(late.finalized[0].track_id, first.assignments[0]);
        assert_eq!(late.active.len(), 1);
        assert_eq!(emitted.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_late_batch_does_not_shorten_session() {
        let (mut tracker, _) = recording_tracker();
        let subject = || vec![raw_at(400.0, 300.0, 120.0, "Subject-A", true)];
        let id = tracker.process(subject(), t(0.0)).unwrap().assignments[0];
        tracker.process(subject(), t(20.0)).unwrap();

        let late = tracker.process(subject(), t(5.0)).unwrap();
        assert_eq!(late.assignments, vec![id]);

        let out = tracker.process(Vec::new(), t(40.0)).unwrap();
        assert!(out.finalized.is_empty());
        assert_eq!(tracker.store().get(id).unwrap().last_seen, t(20.0));

        let out = tracker.process(Vec::new(), t(51.0)).unwrap();
        assert_eq!(out.finalized.len(), 1);
        assert_relative_eq!(out.finalized[0].duration_secs, 20.0);
    }

    #[test]
    fn test_ids_strictly_increase_over_lifetime() {
        let (mut tracker, _) = recording_tracker();
        let mut issued = Vec::new();
        for round in 0..5 {
            let base = round as f64 * 100.0;
            let out = tracker
                .process(
                    vec![
                        raw_at(100.0, 100.0, 80.0, "Unknown_0", false),
                        raw_at(700.0, 100.0, 80.0, "Unknown_1", false),
                    ],
                    t(base),
                )
                .unwrap();
            issued.extend(out.assignments);
        }
        let mut sorted = issued.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, issued);
    }

    #[test]
    fn test_malformed_detections_dropped() {
        let (mut tracker, _) = recording_tracker();
        let missing_name = RawDetection {
            name: None,
            ..raw_at(100.0, 100.0, 50.0, "x", false)
        };
        let empty_box = RawDetection::new(BoundingBox::new(10.0, 10.0, 0.0, 40.0), "y", false, 0.5);

        let out = tracker
            .process(
                vec![missing_name, empty_box, raw_at(600.0, 100.0, 50.0, "ok", false)],
                t(0.0),
            )
            .unwrap();
        assert_eq!(out.dropped, 2);
        assert_eq!(out.assignments.len(), 1);
        assert_eq!(out.active[0].name, "ok");
    }

    #[test]
    fn test_sink_failure_surfaces_warning_and_still_evicts() {
        let mut tracker = tracker_with_sink(Box::new(FailingSink));
        tracker
            .process(vec![raw_at(100.0, 100.0, 50.0, "a", false)], t(0.0))
            .unwrap();
        let out = tracker.process(Vec::new(), t(31.0)).unwrap();

        assert_eq!(out.finalized.len(), 1);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].message.contains("store offline"));
        assert!(tracker.store().is_empty());
    }

    #[test]
    fn test_hook_fires_once_per_session() {
        let created = Arc::new(Mutex::new(Vec::new()));
        let mut tracker = TrackPresenceUseCase::new(
            &TrackerConfig::default(),
            Box::new(NullIdentityResolver),
            Box::new(NullSessionSink),
            Box::new(CountingHook {
                created: created.clone(),
            }),
            Box::new(NullPipelineLogger),
        );

        for secs in 0..10 {
            tracker
                .process(
                    vec![
                        raw_at(100.0 + secs as f64, 100.0, 80.0, "a", false),
                        raw_at(800.0, 100.0, 80.0, "b", false),
                    ],
                    t(secs as f64),
                )
                .unwrap();
        }
        assert_eq!(*created.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_known_sessions_resolved() {
        let directory = HashMap::from([(
            "Subject-A".to_string(),
            IdentityRecord {
                external_id: "EMP-001".into(),
                display_name: None,
                affiliation: Some("lab".into()),
            },
        )]);
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let mut tracker = TrackPresenceUseCase::new(
            &TrackerConfig::default(),
            Box::new(MapResolver(directory)),
            Box::new(RecordingSink {
                emitted: emitted.clone(),
            }),
            Box::new(NullSessionHook),
            Box::new(NullPipelineLogger),
        );

        let unknown = tracker
            .process(vec![raw_at(200.0, 200.0, 100.0, "Unknown_0", false)], t(0.0))
            .unwrap();
        assert!(unknown.active[0].external_id.is_none());

        let known = tracker
            .process(vec![raw_at(202.0, 200.0, 100.0, "Subject-A", true)], t(1.0))
            .unwrap();
        assert_eq!(known.active[0].external_id.as_deref(), Some("EMP-001"));
        assert_eq!(known.active[0].affiliation.as_deref(), Some("lab"));

        tracker.process(Vec::new(), t(40.0)).unwrap();
        let records = emitted.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].external_id.as_deref(), Some("EMP-001"));
        assert_eq!(records[0].name, "Subject-A");
    }

    #[test]
    fn test_finalize_all_emits_remaining_once() {
        let (mut tracker, emitted) = recording_tracker();
        tracker
            .process(
                vec![
                    raw_at(100.0, 100.0, 50.0, "a", false),
                    raw_at(700.0, 100.0, 50.0, "b", false),
                ],
                t(0.0),
            )
            .unwrap();

        let outcome = tracker.finalize_all();
        assert_eq!(outcome.finalized.len(), 2);
        assert!(tracker.active_sessions().is_empty());
        assert!(tracker.finalize_all().finalized.is_empty());
        assert_eq!(emitted.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_poisoned_tracker_refuses_cycles() {
        let (mut tracker, _) = recording_tracker();
        tracker.poisoned = true;
        let err = tracker.process(Vec::new(), t(0.0)).unwrap_err();
        assert!(matches!(err, TrackingError::Poisoned));
    }

    #[test]
    fn test_cycle_counter_and_output_timestamp() {
        let (mut tracker, _) = recording_tracker();
        let out = tracker.process(Vec::new(), t(5.0)).unwrap();
        tracker.process(Vec::new(), t(6.0)).unwrap();
        assert_eq!(out.timestamp, t(5.0));
        assert_eq!(tracker.cycles(), 2);
    }
}
