//! Synthetic primary-joint angle waveforms for each known exercise, standing
//! in for a real pose model's output during local development.

use rand::Rng;
use rand_distr::{Distribution, Normal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Clean oscillation between the down and up angle, tripping the rep
    /// counter's phase transitions.
    CleanReps,
    /// Holds near the up angle the whole time — no down phase is ever
    /// confirmed, so no rep should fire.
    NoDownPhase,
    /// Holds near a threshold with small uniform jitter — noise that must
    /// not produce a spurious rep.
    NoisyHold,
    /// Holds a fixed angle outside a form check's range long enough to
    /// trigger the debounce and cooldown.
    FormFault,
}

impl Scenario {
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "clean_reps" => Some(Scenario::CleanReps),
            "no_down_phase" => Some(Scenario::NoDownPhase),
            "noisy_hold" => Some(Scenario::NoisyHold),
            "form_fault" => Some(Scenario::FormFault),
            _ => None,
        }
    }
}

/// Known exercise joint triples, mirroring the default `exercises.yaml`
/// shipped with `exercise-analysis`.
pub struct ExerciseJoints {
    pub primary: (usize, usize, usize),
    pub up_angle: f64,
    pub down_angle: f64,
}

pub fn joints_for(exercise: &str) -> ExerciseJoints {
    match exercise {
        "push_up" | "bicep_curl" => ExerciseJoints {
            primary: (5, 7, 9),
            up_angle: if exercise == "push_up" { 160.0 } else { 60.0 },
            down_angle: if exercise == "push_up" { 90.0 } else { 160.0 },
        },
        "lateral_raise" => ExerciseJoints {
            primary: (11, 5, 7),
            up_angle: 90.0,
            down_angle: 20.0,
        },
        _ => ExerciseJoints {
            primary: (11, 13, 15),
            up_angle: 160.0,
            down_angle: 100.0,
        },
    }
}

/// Produces the primary-joint angle for frame `frame_index` of `scenario`,
/// given the exercise's configured thresholds.
pub fn angle_for_frame(
    scenario: Scenario,
    joints: &ExerciseJoints,
    frame_index: u64,
    rng: &mut impl Rng,
) -> f64 {
    match scenario {
        Scenario::CleanReps => {
            // 8-frame down phase, 8-frame up phase, repeating.
            let cycle_position = frame_index % 16;
            if cycle_position < 8 {
                joints.down_angle
            } else {
                joints.up_angle
            }
        }
        Scenario::NoDownPhase => joints.up_angle,
        Scenario::NoisyHold => {
            let normal = Normal::new(0.0, 1.0).unwrap();
            joints.up_angle + normal.sample(rng).clamp(-3.0, 3.0)
        }
        Scenario::FormFault => joints.down_angle.min(joints.up_angle) - 10.0,
    }
}
