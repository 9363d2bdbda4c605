mod bus;
mod classifier;
mod config;
mod db;
mod error;
mod form_analyzer;
mod geometry;
mod pipeline;
mod registry;
mod rep_counter;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use bus::StreamBus;
use config::Config;
use pipeline::AnalysisPipeline;
use registry::ExerciseRegistry;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("startup failed: {err}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("exercise_analysis={}", config.log_level).into()),
        )
        .init();

    info!(
        cameras = ?config.camera_ids,
        "Smart Gym exercise-analysis v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(err) = run(config).await {
        error!("fatal startup error: {err}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), error::ConfigError> {
    let registry = Arc::new(ExerciseRegistry::load(&config.exercises_yaml)?);
    info!(exercises = ?registry.list(), "loaded exercise registry");

    let pool = db::connect(&config.database_url).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::new();
    for camera_id in &config.camera_ids {
        let bus = StreamBus::connect(&config.redis_url).await?;
        let mut pipeline = AnalysisPipeline::new(
            camera_id.clone(),
            registry.clone(),
            bus,
            pool.clone(),
            config.clone(),
        );
        let rx = shutdown_rx.clone();
        let camera_id = camera_id.clone();
        handles.push(tokio::spawn(async move {
            if let Err(err) = pipeline.run(rx).await {
                error!(camera_id = %camera_id, error = %err, "pipeline exited with error");
            }
        }));
    }

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping pipelines");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
