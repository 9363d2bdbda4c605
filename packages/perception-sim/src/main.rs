//! perception-sim — synthetic PerceptionEvent generator.
//!
//! Publishes synthetic `PerceptionEvent`s onto `perceptions:{camera_id}` at a
//! fixed rate, standing in for the real ingestion/perception services during
//! local development and testing of `exercise-analysis`. Not part of the
//! production pipeline.

mod scenarios;

use clap::Parser;
use gym_types::{BoundingBox, Keypoint, PerceptionEvent};
use rand::{rngs::StdRng, SeedableRng};
use redis::AsyncCommands;
use tracing::info;

use scenarios::Scenario;

#[derive(Parser, Debug)]
#[command(name = "perception-sim", about = "Synthetic perception-event generator for exercise-analysis")]
struct Args {
    /// Stream bus connection string.
    #[arg(long, default_value = "redis://localhost:6379")]
    redis_url: String,
    /// Camera id to publish under (`perceptions:{camera_id}`).
    #[arg(long, default_value = "cam-sim-0")]
    camera_id: String,
    /// Local track id assigned to the synthetic subject.
    #[arg(long, default_value_t = 1)]
    track_id: i64,
    /// Exercise to simulate: squat | push_up | bicep_curl | lateral_raise.
    #[arg(long, default_value = "squat")]
    exercise: String,
    /// Scenario: clean_reps | no_down_phase | noisy_hold | form_fault.
    #[arg(long, default_value = "clean_reps")]
    scenario: String,
    /// Frames published per second.
    #[arg(long, default_value_t = 30.0)]
    rate_hz: f64,
    /// Total frames to publish before exiting; 0 runs until interrupted.
    #[arg(long, default_value_t = 0)]
    frame_count: u64,
    /// RNG seed, for reproducible noisy_hold runs.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perception_sim=info".into()),
        )
        .init();

    let args = Args::parse();
    let scenario = Scenario::from_str(&args.scenario)
        .unwrap_or_else(|| panic!("unknown scenario {:?}", args.scenario));
    let joints = scenarios::joints_for(&args.exercise);

    let client = redis::Client::open(args.redis_url.as_str()).expect("invalid redis url");
    let mut connection = client
        .get_multiplexed_async_connection()
        .await
        .expect("could not connect to stream bus");

    let stream = format!("perceptions:{}", args.camera_id);
    let interval = tokio::time::Duration::from_secs_f64(1.0 / args.rate_hz);
    let mut rng = StdRng::seed_from_u64(args.seed);

    info!(
        camera_id = %args.camera_id,
        exercise = %args.exercise,
        scenario = %args.scenario,
        rate_hz = args.rate_hz,
        "perception-sim publishing"
    );

    let mut frame_seq: u64 = 0;
    loop {
        if args.frame_count != 0 && frame_seq >= args.frame_count {
            break;
        }

        let angle = scenarios::angle_for_frame(scenario, &joints, frame_seq, &mut rng);
        let event = synthetic_event(&args.camera_id, args.track_id, frame_seq, &joints, angle);
        let payload = serde_json::to_string(&event).expect("serializable event");

        let _: Result<String, _> = connection
            .xadd_maxlen(
                &stream,
                redis::streams::StreamMaxlen::Approx(1000),
                "*",
                &[("data", payload.as_str())],
            )
            .await;

        frame_seq += 1;
        tokio::time::sleep(interval).await;
    }

    info!(frames_published = frame_seq, "perception-sim finished");
}

/// Builds a 17-keypoint COCO skeleton whose `joints.primary` triple resolves
/// to exactly `angle_degrees`, with every other keypoint placed at a benign
/// default so unrelated form checks read as in-range rather than undefined.
fn synthetic_event(
    camera_id: &str,
    track_id: i64,
    frame_seq: u64,
    joints: &scenarios::ExerciseJoints,
    angle_degrees: f64,
) -> PerceptionEvent {
    let mut keypoints = vec![Keypoint::new(0.5, 0.5, 0.9); 17];

    let (a, b, c) = joints.primary;
    let radians = angle_degrees.to_radians();
    keypoints[a] = Keypoint::new(0.5 + 0.1, 0.5, 0.9);
    keypoints[b] = Keypoint::new(0.5, 0.5, 0.9);
    keypoints[c] = Keypoint::new(0.5 + 0.1 * radians.cos(), 0.5 + 0.1 * radians.sin(), 0.9);

    PerceptionEvent {
        camera_id: camera_id.to_string(),
        timestamp_ns: (frame_seq as i64) * 1_000_000_000 / 30,
        frame_seq,
        track_id,
        bbox: BoundingBox { x1: 0.3, y1: 0.1, x2: 0.7, y2: 0.95, confidence: 0.95 },
        keypoints,
        reid_embedding: vec![],
    }
}
