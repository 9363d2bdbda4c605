//! # gym-types
//!
//! Shared wire schema for the Smart Gym System stream bus.
//!
//! These types are used by:
//! - `exercise-analysis`: consuming `PerceptionEvent`, producing `RepCountedEvent` /
//!   `FormAlertEvent`.
//! - `perception-sim`: producing synthetic `PerceptionEvent`s for local testing.
//! - The out-of-scope ingestion, perception, and guidance services (external
//!   collaborators): this crate is the contract they agree on, even though this
//!   workspace does not implement them.
//!
//! ## Stream naming convention
//!
//! ```text
//! frames:{camera_id}         raw compressed frames from ingestion
//! perceptions:{camera_id}    enriched detections from perception
//! rep_counted                rep completion events from exercise-analysis
//! form_alerts                form issue events from exercise-analysis
//! guidance                   LLM guidance messages from the guidance service
//! identity_resolved          ReID match results (future work)
//! ```
//!
//! Every message on the bus carries its JSON payload under a single string
//! field named `data`; these structs are exactly what round-trips through
//! that field via `serde_json`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Perception → Exercise / ReID ──────────────────────────────────────────────

/// Single body keypoint (YOLO 17-point COCO convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Normalized `[0,1]` horizontal coordinate.
    pub x: f64,
    /// Normalized `[0,1]` vertical coordinate.
    pub y: f64,
    /// Depth estimate, `0.0` if not available.
    #[serde(default)]
    pub z: f64,
    /// Confidence score `[0,1]`.
    pub visibility: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, z: 0.0, visibility }
    }
}

/// Axis-aligned detection box with model confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
}

/// Enriched detection for one tracked person in one frame.
///
/// Stream: `perceptions:{camera_id}`. Published once per tracked person per
/// processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionEvent {
    pub camera_id: String,
    /// Monotonic nanosecond timestamp from the source camera's clock.
    pub timestamp_ns: i64,
    /// Monotonically increasing frame counter per camera.
    pub frame_seq: u64,
    /// ByteTrack-style local integer track ID, stable within this camera.
    pub track_id: i64,
    pub bbox: BoundingBox,
    /// 17 keypoints, YOLO pose convention.
    pub keypoints: Vec<Keypoint>,
    /// OSNet 256-d L2-normalized ReID feature vector. Unused by
    /// exercise-analysis; carried for the out-of-scope identity service.
    #[serde(default)]
    pub reid_embedding: Vec<f64>,
}

// ── Exercise → Guidance / API ─────────────────────────────────────────────────

/// Fired each time a rep is completed for a tracked person.
///
/// Stream: `rep_counted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepCountedEvent {
    pub camera_id: String,
    pub track_id: i64,
    /// UUID of the current `ExerciseSet`.
    pub exercise_set_id: String,
    pub exercise_type: String,
    /// 1-based rep index within the current set.
    pub rep_number: u32,
    /// Total reps in the current set so far. Equal to `rep_number` — kept as
    /// a separate field for wire compatibility with older consumers.
    pub rep_count: u32,
    /// Time to complete this rep in milliseconds. Always `0` — rep-duration
    /// tracking is not implemented (see DESIGN.md).
    pub duration_ms: u32,
    /// `"up"` or `"down"`.
    pub phase: String,
    pub timestamp_ns: i64,
}

/// Fired when a form issue has persisted for 3+ frames and is not in cooldown.
///
/// Stream: `form_alerts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormAlertEvent {
    pub camera_id: String,
    pub track_id: i64,
    pub exercise_set_id: String,
    pub exercise_type: String,
    pub rep_count: u32,
    /// Stable identifier for this alert type, e.g. `"knee_cave"`.
    pub alert_key: String,
    /// Human-readable description of the form issue.
    pub alert_message: String,
    /// `"info"` | `"warning"` | `"critical"`.
    pub severity: String,
    /// Observed joint angles at the time of the alert, keyed `"a-b-c"`.
    #[serde(default)]
    pub joint_angles: HashMap<String, f64>,
    pub timestamp_ns: i64,
}

// ── Guidance → API / Mobile (external collaborator, schema only) ─────────────

/// LLM-generated coaching message for a specific tracked person.
///
/// Stream: `guidance`. Never constructed by this workspace — the guidance
/// service is an out-of-scope collaborator — but the schema lives here so any
/// consumer in the workspace can deserialize it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceMessage {
    pub camera_id: String,
    pub track_id: i64,
    /// UUID of the registered Person if identity resolved, else `None`.
    #[serde(default)]
    pub person_id: Option<String>,
    pub message: String,
    /// `"form_alert"` | `"rep_milestone"` | `"set_complete"` | `"encouragement"`.
    pub trigger_type: String,
    #[serde(default)]
    pub exercise_type: Option<String>,
    pub timestamp_ns: i64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Published when a track is linked to a registered Person (future ReID work).
///
/// Stream: `identity_resolved`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityResolvedEvent {
    pub camera_id: String,
    pub track_id: i64,
    pub person_id: String,
    pub confidence: f64,
    /// `"face"` | `"reid"` | `"qr"`.
    pub method: String,
    pub timestamp_ns: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perception_event_round_trips_through_json() {
        let event = PerceptionEvent {
            camera_id: "cam-01".into(),
            timestamp_ns: 123_456_789,
            frame_seq: 42,
            track_id: 7,
            bbox: BoundingBox { x1: 0.1, y1: 0.2, x2: 0.3, y2: 0.4, confidence: 0.9 },
            keypoints: vec![Keypoint::new(0.5, 0.5, 0.9)],
            reid_embedding: vec![],
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: PerceptionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn rep_counted_event_keeps_rep_count_equal_to_rep_number() {
        let event = RepCountedEvent {
            camera_id: "cam-01".into(),
            track_id: 1,
            exercise_set_id: "set-1".into(),
            exercise_type: "squat".into(),
            rep_number: 3,
            rep_count: 3,
            duration_ms: 0,
            phase: "up".into(),
            timestamp_ns: 0,
        };
        assert_eq!(event.rep_number, event.rep_count);
    }
}
