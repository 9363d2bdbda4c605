//! Per-track phase state machine that turns a smoothed joint angle into
//! counted repetitions.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use uuid::Uuid;

use crate::geometry::median_of_last_n;
use crate::registry::ExerciseDefinition;

const ANGLE_HISTORY: usize = 7;
const SMOOTHING_WINDOW: usize = 5;
const PHASE_LOCK_FRAMES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unknown,
    Up,
    Down,
}

/// Mutable per-`(track_id, exercise)` state owned exclusively by one
/// pipeline task.
pub struct TrackState {
    pub set_id: Uuid,
    pub rep_count: u32,
    pub phase: Phase,
    angles: VecDeque<f64>,
    phase_frame_count: u32,
    last_seen_at: Instant,
}

impl TrackState {
    fn new(now: Instant) -> Self {
        Self {
            set_id: Uuid::new_v4(),
            rep_count: 0,
            phase: Phase::Unknown,
            angles: VecDeque::with_capacity(ANGLE_HISTORY),
            phase_frame_count: 0,
            last_seen_at: now,
        }
    }
}

/// A rep completion, emitted without `camera_id`/`exercise_set_id` — the
/// pipeline rewraps it before publishing.
#[derive(Debug, Clone, PartialEq)]
pub struct RepEvent {
    pub rep_number: u32,
    pub phase: Phase,
    pub timestamp_ns: i64,
    pub duration_ms: u32,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Unknown => "unknown",
            Phase::Up => "up",
            Phase::Down => "down",
        }
    }
}

/// One instance per exercise definition; owns every track's [`TrackState`]
/// for that exercise.
pub struct RepCounter {
    set_idle_timeout_s: f64,
    tracks: HashMap<i64, TrackState>,
}

impl RepCounter {
    pub fn new(set_idle_timeout_s: f64) -> Self {
        Self {
            set_idle_timeout_s,
            tracks: HashMap::new(),
        }
    }

    /// Returns the current set id for a track, if any.
    pub fn set_id_for(&self, track_id: i64) -> Option<Uuid> {
        self.tracks.get(&track_id).map(|s| s.set_id)
    }

    /// Returns the current rep count for a track, or 0 if it has no state
    /// yet.
    pub fn rep_count_for(&self, track_id: i64) -> u32 {
        self.tracks.get(&track_id).map(|s| s.rep_count).unwrap_or(0)
    }

    /// Advances the state machine for `track_id` given a possibly-undefined
    /// primary-joint angle. Returns `Some(RepEvent)` only on a
    /// DOWN → UP transition.
    pub fn update(
        &mut self,
        track_id: i64,
        angle: Option<f64>,
        definition: &ExerciseDefinition,
        timestamp_ns: i64,
    ) -> Option<RepEvent> {
        let now = Instant::now();

        let needs_rollover = self
            .tracks
            .get(&track_id)
            .map(|s| now.duration_since(s.last_seen_at).as_secs_f64() > self.set_idle_timeout_s)
            .unwrap_or(false);
        if needs_rollover {
            self.tracks.insert(track_id, TrackState::new(now));
        }

        let state = self.tracks.entry(track_id).or_insert_with(|| TrackState::new(now));
        state.last_seen_at = now;

        let angle = angle?;

        state.angles.push_back(angle);
        while state.angles.len() > ANGLE_HISTORY {
            state.angles.pop_front();
        }
        let smoothed = median_of_last_n(
            &state.angles.iter().cloned().collect::<Vec<_>>(),
            SMOOTHING_WINDOW,
        );

        let (in_up, in_down) = if definition.up_angle > definition.down_angle {
            (smoothed >= definition.up_angle, smoothed <= definition.down_angle)
        } else {
            (smoothed <= definition.up_angle, smoothed >= definition.down_angle)
        };

        let candidate = if in_up {
            Phase::Up
        } else if in_down {
            Phase::Down
        } else {
            Phase::Unknown
        };

        if candidate == Phase::Unknown || candidate == state.phase {
            state.phase_frame_count = 0;
            return None;
        }

        state.phase_frame_count += 1;
        if state.phase_frame_count < PHASE_LOCK_FRAMES {
            return None;
        }

        let previous_phase = state.phase;
        state.phase = candidate;
        state.phase_frame_count = 0;

        if previous_phase == Phase::Down && candidate == Phase::Up {
            state.rep_count += 1;
            Some(RepEvent {
                rep_number: state.rep_count,
                phase: candidate,
                timestamp_ns,
                duration_ms: 0,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn squat_definition() -> ExerciseDefinition {
        ExerciseDefinition {
            name: "Squat".to_string(),
            primary_joint: (11, 13, 15),
            up_angle: 160.0,
            down_angle: 100.0,
            form_checks: vec![],
        }
    }

    fn feed(counter: &mut RepCounter, definition: &ExerciseDefinition, angle: f64, count: usize) -> Vec<RepEvent> {
        let mut events = Vec::new();
        for i in 0..count {
            if let Some(event) = counter.update(1, Some(angle), definition, i as i64) {
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn s1_five_squat_reps() {
        let definition = squat_definition();
        let mut counter = RepCounter::new(60.0);
        let mut total_events = 0;

        total_events += feed(&mut counter, &definition, 165.0, 6).len();
        for _ in 0..5 {
            total_events += feed(&mut counter, &definition, 95.0, 8).len();
            total_events += feed(&mut counter, &definition, 165.0, 8).len();
        }

        assert_eq!(total_events, 5);
        assert_eq!(counter.tracks.get(&1).unwrap().rep_count, 5);
    }

    #[test]
    fn s2_no_down_phase_emits_no_reps() {
        let definition = squat_definition();
        let mut counter = RepCounter::new(60.0);
        let events = feed(&mut counter, &definition, 165.0, 20);
        assert!(events.is_empty());
    }

    #[test]
    fn s3_noise_at_threshold_emits_no_reps() {
        let definition = squat_definition();
        let mut counter = RepCounter::new(60.0);
        let mut rng = StdRng::seed_from_u64(42);
        let mut events = Vec::new();
        for i in 0..50 {
            let angle = 160.0 + rng.gen_range(-3.0..=3.0);
            if let Some(event) = counter.update(1, Some(angle), &definition, i) {
                events.push(event);
            }
        }
        assert!(events.is_empty());
    }

    #[test]
    fn rep_count_is_non_decreasing_within_a_set() {
        let definition = squat_definition();
        let mut counter = RepCounter::new(60.0);
        let mut last_count = 0;
        for i in 0..6 {
            feed(&mut counter, &definition, 95.0, 8);
            feed(&mut counter, &definition, 165.0, 8);
            let current = counter.tracks.get(&1).unwrap().rep_count;
            assert!(current >= last_count);
            last_count = current;
            let _ = i;
        }
    }

    #[test]
    fn idle_timeout_starts_a_new_set() {
        let definition = squat_definition();
        let mut counter = RepCounter::new(0.0);

        counter.update(1, Some(95.0), &definition, 0);
        let first_set_id = counter.set_id_for(1).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        counter.update(1, Some(95.0), &definition, 1);
        let second_set_id = counter.set_id_for(1).unwrap();

        assert_ne!(first_set_id, second_set_id);
        assert_eq!(counter.tracks.get(&1).unwrap().rep_count, 0);
    }

    #[test]
    fn duration_ms_is_always_zero() {
        let definition = squat_definition();
        let mut counter = RepCounter::new(60.0);
        feed(&mut counter, &definition, 165.0, 6);
        feed(&mut counter, &definition, 95.0, 8);
        let events = feed(&mut counter, &definition, 165.0, 8);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].duration_ms, 0);
    }
}
