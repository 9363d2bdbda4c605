//! Variance-based exercise classification from short-term angle history.

use std::collections::{HashMap, VecDeque};

use gym_types::Keypoint;

use crate::geometry::joint_angle;
use crate::registry::ExerciseRegistry;

const HISTORY_LEN: usize = 30;
const MIN_SAMPLES_FOR_STD_DEV: usize = 15;
const MIN_CONFIDENCE_STD_DEV: f64 = 5.0;
const SQUAT_KEY: &str = "squat";
const PUSH_UP_KEY: &str = "push_up";
const BICEP_CURL_KEY: &str = "bicep_curl";
const STANDING_RANGE_DEGREES: f64 = 20.0;
const PUSH_UP_DOMINANCE_RATIO: f64 = 1.5;

/// Per-track rolling angle histories, one FIFO of length 30 per registered
/// exercise, plus the disambiguation rule used when both `push_up` and
/// `bicep_curl` are plausible.
pub struct HeuristicClassifier {
    registry: std::sync::Arc<ExerciseRegistry>,
    histories: HashMap<i64, HashMap<String, VecDeque<f64>>>,
}

impl HeuristicClassifier {
    pub fn new(registry: std::sync::Arc<ExerciseRegistry>) -> Self {
        Self {
            registry,
            histories: HashMap::new(),
        }
    }

    /// Updates `track_id`'s rolling histories from `keypoints` and returns
    /// the dominant exercise name (or `"unknown"`) with a confidence in
    /// `[0, 1]`.
    pub fn update(&mut self, track_id: i64, keypoints: &[Keypoint]) -> (String, f64) {
        let track_histories = self.histories.entry(track_id).or_default();

        for key in self.registry.list() {
            let Some(def) = self.registry.get(key) else { continue };
            let (a, b, c) = def.primary_joint;
            if let Some(angle) = joint_angle(keypoints, a, b, c) {
                let fifo = track_histories.entry(key.clone()).or_default();
                fifo.push_back(angle);
                while fifo.len() > HISTORY_LEN {
                    fifo.pop_front();
                }
            }
        }

        let mut std_devs: HashMap<String, f64> = HashMap::new();
        for key in self.registry.list() {
            if let Some(fifo) = track_histories.get(key) {
                if fifo.len() >= MIN_SAMPLES_FOR_STD_DEV {
                    std_devs.insert(key.clone(), sample_std_dev(fifo));
                }
            }
        }

        if std_devs.contains_key(PUSH_UP_KEY) && std_devs.contains_key(BICEP_CURL_KEY) {
            disambiguate_elbow_exercises(track_histories, &mut std_devs);
        }

        let Some((best_key, best_std)) = std_devs
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(k, v)| (k.clone(), *v))
        else {
            return ("unknown".to_string(), 0.0);
        };

        if best_std < MIN_CONFIDENCE_STD_DEV {
            return ("unknown".to_string(), 0.0);
        }

        let total: f64 = std_devs.values().sum();
        let confidence = if total > 0.0 {
            (best_std / total).min(1.0)
        } else {
            0.0
        };
        let rounded = (confidence * 100.0).round() / 100.0;
        (best_key, rounded)
    }
}

/// Suppresses `push_up` or `bicep_curl` variance based on whether the squat
/// history (a proxy for lower-body motion) indicates the subject is standing
/// still. A missing `squat` history degenerates to an empty series, which
/// naturally yields a zero range and is therefore treated as "standing".
fn disambiguate_elbow_exercises(
    track_histories: &HashMap<String, VecDeque<f64>>,
    std_devs: &mut HashMap<String, f64>,
) {
    let squat_range = track_histories
        .get(SQUAT_KEY)
        .map(range_of)
        .unwrap_or(0.0);

    let push_up_std = std_devs[PUSH_UP_KEY];
    let bicep_std = std_devs[BICEP_CURL_KEY];

    let standing_still = squat_range < STANDING_RANGE_DEGREES;
    if standing_still {
        if push_up_std > PUSH_UP_DOMINANCE_RATIO * bicep_std {
            std_devs.insert(BICEP_CURL_KEY.to_string(), 0.0);
        } else {
            std_devs.insert(PUSH_UP_KEY.to_string(), 0.0);
        }
    } else {
        std_devs.insert(PUSH_UP_KEY.to_string(), 0.0);
    }
}

fn range_of(series: &VecDeque<f64>) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let max = series.iter().cloned().fold(f64::MIN, f64::max);
    let min = series.iter().cloned().fold(f64::MAX, f64::min);
    max - min
}

fn sample_std_dev(series: &VecDeque<f64>) -> f64 {
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let variance = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn kp17(angles_override: &[(usize, f64, f64, f64)]) -> Vec<Keypoint> {
        let mut keypoints = vec![Keypoint::new(0.0, 0.0, 0.9); 17];
        for &(idx, x, y, vis) in angles_override {
            keypoints[idx] = Keypoint::new(x, y, vis);
        }
        keypoints
    }

    fn registry_with_three_exercises() -> std::sync::Arc<ExerciseRegistry> {
        let yaml = r#"
exercises:
  squat:
    name: Squat
    primary_joint: [11, 13, 15]
    up_angle: 160
    down_angle: 100
  push_up:
    name: "Push Up"
    primary_joint: [5, 7, 9]
    up_angle: 160
    down_angle: 90
  bicep_curl:
    name: "Bicep Curl"
    primary_joint: [5, 7, 9]
    up_angle: 60
    down_angle: 160
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        std::sync::Arc::new(ExerciseRegistry::load(file.path().to_str().unwrap()).unwrap())
    }

    fn feed_angle_pair(
        classifier: &mut HeuristicClassifier,
        track_id: i64,
        squat_angle: f64,
        elbow_angle: f64,
    ) {
        // squat joint (11,13,15); push_up and bicep_curl both read the elbow
        // joint (5,7,9), matching the original classifier's joint table.
        let keypoints = kp17(&[
            (11, squat_angle, 0.0, 0.9),
            (13, 0.0, 0.0, 0.9),
            (15, 0.0, squat_angle, 0.9),
            (5, elbow_angle, 0.0, 0.9),
            (7, 0.0, 0.0, 0.9),
            (9, 0.0, elbow_angle, 0.9),
        ]);
        classifier.update(track_id, &keypoints);
    }

    #[test]
    fn unknown_when_no_history() {
        let registry = registry_with_three_exercises();
        let mut classifier = HeuristicClassifier::new(registry);
        let keypoints = kp17(&[]);
        let (exercise, confidence) = classifier.update(1, &keypoints);
        assert_eq!(exercise, "unknown");
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn disambiguates_to_bicep_curl_when_legs_still_and_pushup_quiet() {
        // S6: squat range < 20, push_up std-dev < 1.5x bicep_curl std-dev
        let registry = registry_with_three_exercises();
        let mut classifier = HeuristicClassifier::new(registry);

        for i in 0..30 {
            // squat angle barely moves (range << 20)
            let squat_angle = 150.0 + (i % 2) as f64;
            // bicep curl angle swings a lot, push-up stays essentially flat
            let bicep_angle = if i % 2 == 0 { 60.0 } else { 150.0 };
            feed_angle_pair(&mut classifier, 42, squat_angle, bicep_angle);
        }

        let keypoints = kp17(&[(11, 150.0, 0.0, 0.9), (13, 0.0, 0.0, 0.9), (15, 0.0, 150.0, 0.9)]);
        let (exercise, _confidence) = classifier.update(42, &keypoints);
        assert_eq!(exercise, "bicep_curl");
    }

    #[test]
    fn missing_squat_entry_degenerates_to_standing() {
        let yaml = r#"
exercises:
  push_up:
    name: "Push Up"
    primary_joint: [5, 7, 9]
    up_angle: 160
    down_angle: 90
  bicep_curl:
    name: "Bicep Curl"
    primary_joint: [5, 7, 9]
    up_angle: 60
    down_angle: 160
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        let registry =
            std::sync::Arc::new(ExerciseRegistry::load(file.path().to_str().unwrap()).unwrap());
        let mut classifier = HeuristicClassifier::new(registry);

        for i in 0..30 {
            let bicep_angle = if i % 2 == 0 { 60.0 } else { 150.0 };
            feed_angle_pair(&mut classifier, 7, 150.0, bicep_angle);
        }

        let keypoints = kp17(&[]);
        let (exercise, _confidence) = classifier.update(7, &keypoints);
        // No panic, and a valid (possibly unknown) classification returned.
        assert!(exercise == "bicep_curl" || exercise == "unknown");
    }
}
