//! Durable persistence of sessions, tracks, exercise sets, and rep events.
//!
//! The core only writes, except for the primary-key lookups used by the
//! lazy-bootstrap cache in [`crate::pipeline`]. Each bootstrap and each rep
//! insert is its own transaction, committed on success or rolled back on
//! error — nothing here spans multiple pipeline iterations.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::rep_counter::Phase;

pub async fn connect(database_url: &str) -> Result<PgPool, ConfigError> {
    PgPool::connect(database_url).await.map_err(ConfigError::StoreUnreachable)
}

/// Ids cached by the pipeline after the first confident classification for a
/// `(camera_id, track_id)`.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapIds {
    pub session_id: Uuid,
    pub track_row_id: Uuid,
    pub exercise_set_id: Uuid,
}

/// Creates a `GymSession`, `Track`, and `ExerciseSet` row in one transaction.
/// Called at most once per `(camera_id, track_id)` per pipeline lifetime.
pub async fn bootstrap_track(
    pool: &PgPool,
    camera_id: &str,
    track_id: i64,
    exercise_type: &str,
) -> Result<BootstrapIds, sqlx::Error> {
    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;
    let now: DateTime<Utc> = Utc::now();

    let session_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO gym_sessions (id, started_at, ended_at, primary_track_ids) \
         VALUES ($1, $2, NULL, $3)",
    )
    .bind(session_id)
    .bind(now)
    .bind(vec![track_id])
    .execute(&mut *tx)
    .await?;

    let track_row_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO tracks (id, camera_id, local_track_id, first_seen_at, last_seen_at) \
         VALUES ($1, $2, $3, $4, $4)",
    )
    .bind(track_row_id)
    .bind(camera_id)
    .bind(track_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let exercise_set_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO exercise_sets \
         (id, session_id, track_id, exercise_type, started_at, classifier_confidence) \
         VALUES ($1, $2, $3, $4, $5, 0.0)",
    )
    .bind(exercise_set_id)
    .bind(session_id)
    .bind(track_row_id)
    .bind(exercise_type)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(BootstrapIds { session_id, track_row_id, exercise_set_id })
}

/// Inserts a single counted rep. Failure here does not roll back the rep
/// event already published to the stream bus — at-least-once on the stream,
/// best-effort durable row, per the error taxonomy.
pub async fn insert_rep_event(
    pool: &PgPool,
    exercise_set_id: Uuid,
    rep_number: u32,
    duration_ms: u32,
    phase: Phase,
) -> Result<(), sqlx::Error> {
    let now: DateTime<Utc> = Utc::now();
    sqlx::query(
        "INSERT INTO rep_events (time, exercise_set_id, rep_number, duration_ms, phase) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(now)
    .bind(exercise_set_id)
    .bind(rep_number as i32)
    .bind(duration_ms as i32)
    .bind(phase.as_str())
    .execute(pool)
    .await?;
    Ok(())
}
