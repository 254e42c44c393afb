//! InferQ Worker - Main Entry Point
//!
//! Loads the model artifact, connects to the broker, and drains the work
//! queue until a shutdown signal arrives.

use inferq_common::{InferQConfig, InferQError, Result};
use inferq_worker::{Model, ModelPipeline, Worker};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inferq_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting InferQ Worker");

    // Load configuration
    let config_path =
        std::env::var("INFERQ_CONFIG").unwrap_or_else(|_| "configs/worker.yaml".to_string());

    let config = InferQConfig::from_file(&config_path)?;
    let worker_config = config.worker()?.clone();

    info!(
        "Worker configuration loaded: queue={}, concurrency_limit={}",
        worker_config.queue, worker_config.concurrency_limit
    );

    // Load the model and build the pipeline
    let model = Model::load(&worker_config.model_path)?;
    let pipeline = Arc::new(ModelPipeline::new(model));

    // Connect; broker-unreachable is fatal at startup
    let worker = Worker::connect(
        &config.amqp.url(),
        &worker_config.queue,
        worker_config.concurrency_limit,
        pipeline,
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker_task = tokio::spawn(worker.run(shutdown_rx));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, draining in-flight deliveries");
            let _ = shutdown_tx.send(true);
        }
        result = &mut worker_task => {
            // Consume loop ended on its own (stream closed or startup race)
            return match result {
                Ok(run_result) => run_result,
                Err(e) => Err(InferQError::internal(format!("Worker task failed: {e}"))),
            };
        }
    }

    match worker_task.await {
        Ok(run_result) => run_result?,
        Err(e) => return Err(InferQError::internal(format!("Worker task failed: {e}"))),
    }

    info!("InferQ Worker shutdown complete");
    Ok(())
}
