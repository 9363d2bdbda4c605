//! Debounced, cooled-down form-check evaluation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use gym_types::Keypoint;

use crate::geometry::joint_angle;
use crate::registry::ExerciseDefinition;

const DEBOUNCE_FRAMES: u32 = 3;
const COOLDOWN: Duration = Duration::from_secs(10);

struct AlertState {
    consecutive_frames: u32,
    last_fired_at: Option<Instant>,
}

impl Default for AlertState {
    fn default() -> Self {
        Self { consecutive_frames: 0, last_fired_at: None }
    }
}

/// A form issue, emitted without `camera_id`/`exercise_set_id` — the
/// pipeline rewraps it before publishing.
#[derive(Debug, Clone, PartialEq)]
pub struct FormAlert {
    pub alert_key: String,
    pub alert_message: String,
    pub severity: &'static str,
    pub joint_angles: HashMap<String, f64>,
    pub timestamp_ns: i64,
}

/// One instance per exercise definition; owns every track's per-check
/// [`AlertState`].
pub struct FormAnalyzer {
    states: HashMap<(i64, String), AlertState>,
}

impl FormAnalyzer {
    pub fn new() -> Self {
        Self { states: HashMap::new() }
    }

    /// Evaluates every form check in `definition` against `keypoints` and
    /// returns the alerts that should fire this frame (debounced over 3
    /// consecutive out-of-range frames, cooled down to at most one per 10 s
    /// per `(track_id, alert_key)`).
    pub fn check(
        &mut self,
        track_id: i64,
        keypoints: &[Keypoint],
        definition: &ExerciseDefinition,
        timestamp_ns: i64,
    ) -> Vec<FormAlert> {
        let now = Instant::now();
        let mut alerts = Vec::new();
        let mut joint_angles = HashMap::new();

        for form_check in &definition.form_checks {
            let (a, b, c) = form_check.joint;
            let angle = joint_angle(keypoints, a, b, c);

            let key = (track_id, form_check.alert_key.clone());
            let state = self.states.entry(key).or_default();

            let Some(angle) = angle else {
                state.consecutive_frames = 0;
                continue;
            };

            joint_angles.insert(
                format!("{}-{}-{}", a, b, c),
                (angle * 10.0).round() / 10.0,
            );

            let out_of_range = angle < form_check.min_angle || angle > form_check.max_angle;
            if !out_of_range {
                state.consecutive_frames = 0;
                continue;
            }

            state.consecutive_frames += 1;
            if state.consecutive_frames < DEBOUNCE_FRAMES {
                continue;
            }

            if let Some(last_fired_at) = state.last_fired_at {
                if now.duration_since(last_fired_at) < COOLDOWN {
                    continue;
                }
            }

            state.last_fired_at = Some(now);

            alerts.push(FormAlert {
                alert_key: form_check.alert_key.clone(),
                alert_message: form_check.alert_message.clone(),
                severity: form_check.severity.as_str(),
                joint_angles: joint_angles.clone(),
                timestamp_ns,
            });
        }

        alerts
    }
}

impl Default for FormAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FormCheck, Severity};

    fn kp_for_angle(angle_degrees: f64) -> Vec<Keypoint> {
        let mut keypoints = vec![Keypoint::new(0.0, 0.0, 0.9); 17];
        // a=(1,0), b=(0,0), c rotated so the angle at b equals angle_degrees.
        let radians = angle_degrees.to_radians();
        keypoints[0] = Keypoint::new(1.0, 0.0, 0.9);
        keypoints[1] = Keypoint::new(0.0, 0.0, 0.9);
        keypoints[2] = Keypoint::new(radians.cos(), radians.sin(), 0.9);
        keypoints
    }

    fn definition_with_check(min_angle: f64, max_angle: f64) -> ExerciseDefinition {
        ExerciseDefinition {
            name: "Squat".to_string(),
            primary_joint: (11, 13, 15),
            up_angle: 160.0,
            down_angle: 100.0,
            form_checks: vec![FormCheck {
                name: "knee_cave".to_string(),
                joint: (0, 1, 2),
                min_angle,
                max_angle,
                alert_key: "knee_cave".to_string(),
                alert_message: "Keep your knees aligned".to_string(),
                severity: Severity::Warning,
            }],
        }
    }

    #[test]
    fn s4_debounce_requires_three_consecutive_frames() {
        let definition = definition_with_check(80.0, 180.0);
        let mut analyzer = FormAnalyzer::new();
        let keypoints = kp_for_angle(50.0);

        let mut total_alerts = 0;
        for i in 0..2 {
            total_alerts += analyzer.check(1, &keypoints, &definition, i).len();
        }
        assert_eq!(total_alerts, 0);

        for i in 2..5 {
            total_alerts += analyzer.check(1, &keypoints, &definition, i).len();
        }
        assert!(total_alerts >= 1);
    }

    #[test]
    fn s5_cooldown_limits_to_one_alert_per_ten_seconds() {
        let definition = definition_with_check(80.0, 180.0);
        let mut analyzer = FormAnalyzer::new();
        let keypoints = kp_for_angle(50.0);

        // Prime past debounce.
        for i in 0..3 {
            analyzer.check(1, &keypoints, &definition, i);
        }
        // Further calls within the same instant are all within cooldown.
        let mut fired = 0;
        for i in 3..100 {
            fired += analyzer.check(1, &keypoints, &definition, i).len();
        }
        assert_eq!(fired, 0, "no further alert should fire within the cooldown window");
    }

    #[test]
    fn in_range_angle_resets_consecutive_frames() {
        let definition = definition_with_check(0.0, 180.0);
        let mut analyzer = FormAnalyzer::new();
        let keypoints = kp_for_angle(90.0);
        let alerts = analyzer.check(1, &keypoints, &definition, 0);
        assert!(alerts.is_empty());
    }

    #[test]
    fn undefined_angle_does_not_panic_and_resets_state() {
        let definition = definition_with_check(80.0, 180.0);
        let mut analyzer = FormAnalyzer::new();
        let mut keypoints = kp_for_angle(50.0);
        keypoints[0].visibility = 0.0;
        let alerts = analyzer.check(1, &keypoints, &definition, 0);
        assert!(alerts.is_empty());
    }
}
