/// Same-frame detections whose centers are closer than this are one subject.
pub const DEFAULT_DEDUP_DISTANCE: f64 = 50.0;

/// Max center-to-center distance for continuing a session between cycles.
pub const DEFAULT_PROXIMITY_THRESHOLD: f64 = 100.0;

/// Silence after which a session is finalized (~brief occlusion tolerance).
pub const DEFAULT_SESSION_TIMEOUT_SECS: f64 = 30.0;

pub const CONFIG_DIR_NAME: &str = "presence";
pub const CONFIG_FILE_NAME: &str = "config.json";
