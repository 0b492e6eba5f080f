use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bbox::BoundingBox;

#[derive(Error, Debug, PartialEq)]
pub enum DetectionError {
    #[error("detection is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("detection has non-finite {0}")]
    NonFinite(&'static str),
    #[error("detection box must have positive size, got {width}x{height}")]
    NonPositiveSize { width: f64, height: f64 },
    #[error("detection confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),
}

/// Detection record as it arrives from the recognizer, before validation.
///
/// Every field is optional so that a partially-filled record can be
/// deserialized and then rejected with a precise reason instead of failing
/// the whole frame batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default, alias = "name_hypothesis")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_known: Option<bool>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl RawDetection {
    pub fn new(bbox: BoundingBox, name: &str, is_known: bool, confidence: f64) -> Self {
        Self {
            bbox: Some(bbox),
            name: Some(name.to_string()),
            is_known: Some(is_known),
            confidence: Some(confidence),
        }
    }
}

/// One subject observed in one frame, validated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub name: String,
    pub is_known: bool,
    pub confidence: f64,
}

impl Detection {
    pub fn new(
        bbox: BoundingBox,
        name: impl Into<String>,
        is_known: bool,
        confidence: f64,
    ) -> Result<Self, DetectionError> {
        if !bbox.is_finite() {
            return Err(DetectionError::NonFinite("bbox"));
        }
        if !bbox.has_positive_size() {
            return Err(DetectionError::NonPositiveSize {
                width: bbox.width,
                height: bbox.height,
            });
        }
        if !confidence.is_finite() {
            return Err(DetectionError::NonFinite("confidence"));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(DetectionError::ConfidenceOutOfRange(confidence));
        }
        Ok(Self {
            bbox,
            name: name.into(),
            is_known,
            confidence,
        })
    }
}

impl TryFrom<RawDetection> for Detection {
    type Error = DetectionError;

    fn try_from(raw: RawDetection) -> Result<Self, Self::Error> {
        let bbox = raw.bbox.ok_or(DetectionError::MissingField("bbox"))?;
        let name = raw.name.ok_or(DetectionError::MissingField("name"))?;
        let is_known = raw.is_known.ok_or(DetectionError::MissingField("is_known"))?;
        let confidence = raw
            .confidence
            .ok_or(DetectionError::MissingField("confidence"))?;
        Detection::new(bbox, name, is_known, confidence)
    }
}
