use crate::shared::constants::DEFAULT_DEDUP_DISTANCE;
use crate::shared::detection::Detection;

/// Collapses same-frame detections that almost certainly show one subject.
///
/// Larger boxes are kept in preference to smaller ones (closer framing or a
/// better angle). A detection is dropped when its center lies closer than
/// `distance_threshold` to the center of an already-kept detection. Center
/// distance rather than overlap keeps this tolerant of differently sized
/// boxes around the same face.
pub struct Deduplicator {
    distance_threshold: f64,
}

impl Deduplicator {
    pub fn new(distance_threshold: f64) -> Self {
        Self { distance_threshold }
    }

    pub fn deduplicate(&self, detections: Vec<Detection>) -> Vec<Detection> {
        if detections.len() <= 1 {
            return detections;
        }

        let mut ordered = detections;
        // Stable: equal areas keep input order.
        ordered.sort_by(|a, b| b.bbox.area().total_cmp(&a.bbox.area()));

        let mut kept: Vec<Detection> = Vec::with_capacity(ordered.len());
        for det in ordered {
            let duplicate = kept
                .iter()
                .any(|k| k.bbox.center_distance(&det.bbox) < self.distance_threshold);
            if duplicate {
                log::debug!(
                    "Dropping duplicate detection '{}' at {:?}",
                    det.name,
                    det.bbox.center()
                );
            } else {
                kept.push(det);
            }
        }
        kept
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_DISTANCE)
    }
}
