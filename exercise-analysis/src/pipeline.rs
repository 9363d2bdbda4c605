//! Binds the classifier, rep counter, and form analyzer to one camera's
//! consumer-group subscription.

use std::collections::HashMap;
use std::sync::Arc;

use gym_types::{FormAlertEvent, PerceptionEvent, RepCountedEvent};
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::bus::StreamBus;
use crate::classifier::HeuristicClassifier;
use crate::config::Config;
use crate::db::{self, BootstrapIds};
use crate::error::PipelineError;
use crate::form_analyzer::FormAnalyzer;
use crate::registry::ExerciseRegistry;
use crate::rep_counter::RepCounter;

const REP_COUNTED_STREAM: &str = "rep_counted";
const FORM_ALERTS_STREAM: &str = "form_alerts";
const MIN_CLASSIFIER_CONFIDENCE: f64 = 0.5;
const THROUGHPUT_LOG_INTERVAL: u64 = 100;

/// One pipeline per camera. Owns the per-track classifier, rep counters, and
/// form analyzers exclusively — no cross-pipeline sharing, therefore no
/// locking.
pub struct AnalysisPipeline {
    camera_id: String,
    registry: Arc<ExerciseRegistry>,
    bus: StreamBus,
    pool: PgPool,
    config: Config,
    classifier: HeuristicClassifier,
    rep_counters: HashMap<String, RepCounter>,
    form_analyzers: HashMap<String, FormAnalyzer>,
    bootstrapped: HashMap<i64, BootstrapIds>,
    frames_processed: u64,
}

impl AnalysisPipeline {
    pub fn new(
        camera_id: String,
        registry: Arc<ExerciseRegistry>,
        bus: StreamBus,
        pool: PgPool,
        config: Config,
    ) -> Self {
        let classifier = HeuristicClassifier::new(registry.clone());
        Self {
            camera_id,
            registry,
            bus,
            pool,
            config,
            classifier,
            rep_counters: HashMap::new(),
            form_analyzers: HashMap::new(),
            bootstrapped: HashMap::new(),
            frames_processed: 0,
        }
    }

    fn input_stream(&self) -> String {
        format!("perceptions:{}", self.camera_id)
    }

    /// Runs the main loop until `shutdown` is signalled. Joins the consumer
    /// group (creating the stream/group if absent) before the first read.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), PipelineError> {
        let stream = self.input_stream();
        self.bus
            .ensure_consumer_group(&stream, &self.config.consumer_group)
            .await?;

        info!(camera_id = %self.camera_id, stream = %stream, "pipeline started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let read_result = tokio::select! {
                result = self.bus.read_group(
                    &stream,
                    &self.config.consumer_group,
                    &self.config.consumer_name,
                    self.config.read_batch,
                    self.config.block_ms,
                ) => result,
                _ = shutdown.changed() => break,
            };

            let deliveries = match read_result {
                Ok(deliveries) => deliveries,
                Err(err) => {
                    warn!(camera_id = %self.camera_id, error = %err, "transient bus read error");
                    continue;
                }
            };

            for delivery in &deliveries {
                match self.process_one(&delivery.raw).await {
                    Ok(()) => {}
                    Err(err) => warn!(
                        camera_id = %self.camera_id,
                        error = %err,
                        "dropping message after per-event error"
                    ),
                }
                if let Err(err) =
                    self.bus.ack(&stream, &self.config.consumer_group, &delivery.entry_id).await
                {
                    warn!(camera_id = %self.camera_id, error = %err, "transient bus ack error");
                }

                self.frames_processed += 1;
                if self.frames_processed % THROUGHPUT_LOG_INTERVAL == 0 {
                    info!(
                        camera_id = %self.camera_id,
                        frames_processed = self.frames_processed,
                        "throughput checkpoint"
                    );
                }
            }
        }

        info!(camera_id = %self.camera_id, "pipeline shut down cleanly");
        Ok(())
    }

    /// Processes a single decoded perception event end to end: classify,
    /// advance the rep counter, evaluate form checks, lazily bootstrap
    /// durable rows, and publish/persist results.
    async fn process_one(&mut self, raw: &str) -> Result<(), PipelineError> {
        let event: PerceptionEvent = serde_json::from_str(raw).map_err(PipelineError::Decode)?;

        let (exercise_key, confidence) =
            self.classifier.update(event.track_id, &event.keypoints);
        if exercise_key == "unknown" || confidence < MIN_CLASSIFIER_CONFIDENCE {
            return Ok(());
        }

        let definition = self
            .registry
            .get(&exercise_key)
            .ok_or_else(|| PipelineError::UnknownExercise(exercise_key.clone()))?
            .clone();

        let (a, b, c) = definition.primary_joint;
        let angle = crate::geometry::joint_angle(&event.keypoints, a, b, c);

        let bootstrap = self.bootstrap_ids(&event, &exercise_key).await?;

        let rep_counter = self
            .rep_counters
            .entry(exercise_key.clone())
            .or_insert_with(|| RepCounter::new(self.config.set_idle_timeout_s));
        let form_analyzer = self.form_analyzers.entry(exercise_key.clone()).or_default();

        if let Some(rep_event) =
            rep_counter.update(event.track_id, angle, &definition, event.timestamp_ns)
        {
            let wrapped = RepCountedEvent {
                camera_id: self.camera_id.clone(),
                track_id: event.track_id,
                exercise_set_id: bootstrap.exercise_set_id.to_string(),
                exercise_type: exercise_key.clone(),
                rep_number: rep_event.rep_number,
                rep_count: rep_event.rep_number,
                duration_ms: rep_event.duration_ms,
                phase: rep_event.phase.as_str().to_string(),
                timestamp_ns: rep_event.timestamp_ns,
            };
            self.bus.publish(REP_COUNTED_STREAM, &wrapped).await?;

            if let Err(err) = db::insert_rep_event(
                &self.pool,
                bootstrap.exercise_set_id,
                rep_event.rep_number,
                rep_event.duration_ms,
                rep_event.phase,
            )
            .await
            {
                warn!(
                    camera_id = %self.camera_id,
                    track_id = event.track_id,
                    error = %err,
                    "rep row insert failed; stream event already published"
                );
            }

            debug!(
                camera_id = %self.camera_id,
                track_id = event.track_id,
                exercise = %exercise_key,
                rep = rep_event.rep_number,
                "rep counted"
            );
        }

        let alerts = form_analyzer.check(event.track_id, &event.keypoints, &definition, event.timestamp_ns);
        for alert in alerts {
            let wrapped = FormAlertEvent {
                camera_id: self.camera_id.clone(),
                track_id: event.track_id,
                exercise_set_id: bootstrap.exercise_set_id.to_string(),
                exercise_type: exercise_key.clone(),
                rep_count: rep_counter.rep_count_for(event.track_id),
                alert_key: alert.alert_key.clone(),
                alert_message: alert.alert_message.clone(),
                severity: alert.severity.to_string(),
                joint_angles: alert.joint_angles.clone(),
                timestamp_ns: alert.timestamp_ns,
            };
            self.bus.publish(FORM_ALERTS_STREAM, &wrapped).await?;

            debug!(
                camera_id = %self.camera_id,
                track_id = event.track_id,
                alert_key = %alert.alert_key,
                "form alert"
            );
        }

        Ok(())
    }

    async fn bootstrap_ids(
        &mut self,
        event: &PerceptionEvent,
        exercise_key: &str,
    ) -> Result<BootstrapIds, PipelineError> {
        if let Some(ids) = self.bootstrapped.get(&event.track_id) {
            return Ok(*ids);
        }

        let ids = db::bootstrap_track(&self.pool, &self.camera_id, event.track_id, exercise_key)
            .await
            .map_err(PipelineError::Store)?;
        self.bootstrapped.insert(event.track_id, ids);
        Ok(ids)
    }
}

