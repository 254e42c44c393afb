//! Harness run loop
//!
//! Publishes the request batch sequentially, collects replies concurrently
//! on a separate broker connection, waits up to the configured timeout for
//! full resolution, and summarizes latency over whatever resolved.

use crate::correlation::{CorrelationTable, ResolveOutcome};
use crate::report::LatencyReport;
use futures::StreamExt;
use inferq_common::config::AmqpConfig;
use inferq_common::error::Result;
use inferq_common::METRICS;
use inferq_protocol::{wall_clock_secs, ReplyEnvelope, RequestEnvelope};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Connection, ConnectionProperties};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Length of each request's random input vector
const INPUT_LEN: usize = 5;

/// Poll interval for the bounded reply wait
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for the collector to wind down before abandoning it
const COLLECTOR_STOP_GRACE: Duration = Duration::from_secs(5);

/// One harness invocation
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Broker host
    pub host: String,

    /// Work queue requests are published to
    pub queue: String,

    /// Reply queue, carried on every request as its reply destination
    pub response_queue: String,

    /// Number of requests to publish
    pub num_messages: usize,

    /// Bound on the reply wait, measured from the end of publishing
    pub timeout: Duration,
}

/// Publish-phase timing
#[derive(Debug, Clone, PartialEq)]
pub struct PublishStats {
    /// Requests published
    pub published: usize,

    /// Total elapsed publish time, seconds
    pub total_secs: f64,

    /// Mean per-message publish time, seconds
    pub avg_secs: f64,
}

/// Everything a harness run produces
#[derive(Debug, Clone)]
pub struct HarnessOutcome {
    pub publish: PublishStats,

    /// `None` when no replies resolved before the timeout
    pub report: Option<LatencyReport>,
}

/// Drive one end-to-end load test.
///
/// A broker connection failure here is fatal and propagates; a timeout is
/// not an error and yields a partial (or empty) report.
pub async fn run(options: HarnessOptions) -> Result<HarnessOutcome> {
    let url = AmqpConfig::for_host(&options.host).url();
    let table = Arc::new(CorrelationTable::new());

    let connection = Connection::connect(&url, ConnectionProperties::default()).await?;
    let channel = connection.create_channel().await?;
    channel
        .queue_declare(
            &options.queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    // Reply collection runs on its own connection so the publisher channel
    // stays single-writer.
    let (stop_tx, stop_rx) = watch::channel(false);
    let collector = tokio::spawn(collect_replies(
        url.clone(),
        options.response_queue.clone(),
        Arc::clone(&table),
        stop_rx,
    ));
    let collector_abort = collector.abort_handle();

    let publish_started = Instant::now();
    for sent in 0..options.num_messages {
        let message_id = Uuid::new_v4().to_string();
        let data: Vec<f64> = {
            let mut rng = rand::thread_rng();
            (0..INPUT_LEN).map(|_| rng.gen::<f64>()).collect()
        };

        let send_timestamp = wall_clock_secs();
        let envelope = RequestEnvelope {
            message_id: message_id.clone(),
            data,
            send_timestamp,
        };
        let payload = envelope.to_bytes()?;

        // Entry exists before the publish so a fast reply always finds it
        table.insert_pending(&message_id, send_timestamp);

        let per_publish = Instant::now();
        channel
            .basic_publish(
                "",
                &options.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_reply_to(options.response_queue.as_str().into())
                    .with_correlation_id(message_id.as_str().into()),
            )
            .await?;

        METRICS.harness.requests_published_total.inc();
        METRICS
            .harness
            .publish_duration
            .observe(per_publish.elapsed().as_secs_f64());

        if (sent + 1) % 100 == 0 {
            info!("Sent {} messages...", sent + 1);
        }
    }

    let total_secs = publish_started.elapsed().as_secs_f64();
    let publish = PublishStats {
        published: options.num_messages,
        total_secs,
        avg_secs: if options.num_messages > 0 {
            total_secs / options.num_messages as f64
        } else {
            0.0
        },
    };

    info!(
        "Waiting up to {:?} for {} replies",
        options.timeout, options.num_messages
    );

    let wait_started = Instant::now();
    while table.resolved() < options.num_messages && wait_started.elapsed() < options.timeout {
        tokio::time::sleep(WAIT_POLL_INTERVAL).await;
    }

    if table.resolved() < options.num_messages {
        warn!(
            "Timeout reached. Expected {} responses, received {}.",
            options.num_messages,
            table.resolved()
        );
    }

    // Stop the collector; entries already resolved are kept either way
    let _ = stop_tx.send(true);
    match tokio::time::timeout(COLLECTOR_STOP_GRACE, collector).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!("Reply collector exited with error: {}", e),
        Ok(Err(e)) => error!("Reply collector task panicked: {}", e),
        Err(_) => {
            collector_abort.abort();
            warn!("Reply collector did not stop in time");
        }
    }

    if let Err(e) = connection.close(200, "harness complete").await {
        warn!("Failed to close publisher connection: {}", e);
    }

    let report = LatencyReport::compute(&table.resolved_entries(), options.num_messages);

    Ok(HarnessOutcome { publish, report })
}

/// Consume the reply queue, resolving correlation entries until stopped
async fn collect_replies(
    url: String,
    response_queue: String,
    table: Arc<CorrelationTable>,
    mut stop: watch::Receiver<bool>,
) -> Result<()> {
    let connection = Connection::connect(&url, ConnectionProperties::default()).await?;
    let channel = connection.create_channel().await?;

    // The reply queue is transient, unlike the durable work queue
    channel
        .queue_declare(
            &response_queue,
            QueueDeclareOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let mut consumer = channel
        .basic_consume(
            &response_queue,
            "inferq-loadgen",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!("Consuming responses from queue: {}", response_queue);

    loop {
        tokio::select! {
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        match ReplyEnvelope::from_bytes(&delivery.data) {
                            Ok(reply) => {
                                METRICS.harness.replies_received_total.inc();
                                let message_id = reply.message_id.clone();
                                match table.resolve(reply) {
                                    ResolveOutcome::Resolved => {
                                        debug!("Received response for message_id: {}", message_id);
                                    }
                                    ResolveOutcome::Duplicate => {
                                        debug!("Dropping duplicate reply for message_id: {}", message_id);
                                    }
                                    ResolveOutcome::Unknown => {
                                        warn!("Reply carries unknown message_id: {}", message_id);
                                    }
                                }
                            }
                            Err(e) => warn!("Discarding malformed reply: {}", e),
                        }

                        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                            error!("Failed to ack reply delivery: {}", e);
                        }
                    }
                    Some(Err(e)) => error!("Reply stream error: {}", e),
                    None => break,
                }
            }
            _ = stop.changed() => break,
        }
    }

    if let Err(e) = connection.close(200, "collector stopped").await {
        debug!("Failed to close collector connection: {}", e);
    }

    Ok(())
}
