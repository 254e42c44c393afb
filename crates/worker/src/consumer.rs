//! Bounded-concurrency work-queue consumer
//!
//! Drains the work queue under an admission window enforced twice: the
//! broker prefetch limits unacknowledged deliveries per consumer, and a
//! semaphore gates the tasks spawned per delivery so the two can never
//! disagree. Every admitted delivery is resolved exactly once, by an ack on
//! success or a nack (without requeue) on any failure.

use crate::pipeline::Pipeline;
use futures::StreamExt;
use inferq_common::error::{InferQError, Result};
use inferq_common::METRICS;
use inferq_protocol::{wall_clock_secs, ReplyEnvelope, RequestEnvelope};
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions,
    BasicPublishOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{debug, error, info, warn};

/// Tracks how many deliveries are currently unresolved, plus the
/// high-water mark the count ever reached.
#[derive(Debug, Default)]
pub struct Inflight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Inflight {
    /// Count a delivery as admitted until the returned guard drops
    pub fn enter(self: &Arc<Self>) -> InflightGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        METRICS.worker.inflight.inc();

        InflightGuard {
            inflight: Arc::clone(self),
        }
    }

    /// Deliveries currently unresolved
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Highest concurrent count observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Guard for one admitted delivery; dropping it releases the slot
pub struct InflightGuard {
    inflight: Arc<Inflight>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight.current.fetch_sub(1, Ordering::SeqCst);
        METRICS.worker.inflight.dec();
    }
}

/// Work-queue consumer with a bounded admission window
pub struct Worker {
    connection: Connection,
    channel: Channel,
    publish_channel: Arc<Mutex<Channel>>,
    queue: String,
    concurrency_limit: usize,
    pipeline: Arc<dyn Pipeline>,
    inflight: Arc<Inflight>,
}

impl Worker {
    /// Connect to the broker and set up the consume and publish channels.
    ///
    /// Connection-level failures here are fatal: they propagate to the
    /// caller and terminate startup.
    pub async fn connect(
        url: &str,
        queue: &str,
        concurrency_limit: usize,
        pipeline: Arc<dyn Pipeline>,
    ) -> Result<Self> {
        if concurrency_limit == 0 {
            return Err(InferQError::config("Concurrency limit must be at least 1"));
        }
        let prefetch = u16::try_from(concurrency_limit).map_err(|_| {
            InferQError::config("Concurrency limit does not fit the broker prefetch field")
        })?;

        let connection = Connection::connect(url, ConnectionProperties::default()).await?;

        let channel = connection.create_channel().await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        // The broker enforces the same window the admission semaphore does
        channel.basic_qos(prefetch, BasicQosOptions::default()).await?;

        // Replies are published from concurrent per-delivery tasks; a
        // channel is single-writer, so publishing gets its own channel
        // behind a mutex.
        let publish_channel = connection.create_channel().await?;

        info!(
            "Connected to broker, consuming '{}' with admission window {}",
            queue, concurrency_limit
        );

        Ok(Self {
            connection,
            channel,
            publish_channel: Arc::new(Mutex::new(publish_channel)),
            queue: queue.to_string(),
            concurrency_limit,
            pipeline,
            inflight: Arc::new(Inflight::default()),
        })
    }

    /// In-flight tracker, shared with the spawned delivery tasks
    pub fn inflight(&self) -> Arc<Inflight> {
        Arc::clone(&self.inflight)
    }

    /// Consume until the stop signal fires or the stream closes.
    ///
    /// On stop: no new deliveries are accepted, in-flight deliveries finish
    /// and resolve, then the connection is closed.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut consumer = self
            .channel
            .basic_consume(
                &self.queue,
                "inferq-worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let admission = Arc::new(Semaphore::new(self.concurrency_limit));

        info!("Ready to receive messages");

        loop {
            tokio::select! {
                delivery = consumer.next() => {
                    match delivery {
                        Some(Ok(delivery)) => {
                            // With prefetch equal to the window, a permit is
                            // normally free by the time a delivery arrives.
                            let permit = Arc::clone(&admission)
                                .acquire_owned()
                                .await
                                .map_err(|_| InferQError::internal("Admission semaphore closed"))?;

                            METRICS.worker.deliveries_total.inc();
                            let guard = self.inflight.enter();
                            let pipeline = Arc::clone(&self.pipeline);
                            let publish = Arc::clone(&self.publish_channel);

                            tokio::spawn(async move {
                                let _permit = permit;
                                let _guard = guard;
                                handle_delivery(delivery, pipeline.as_ref(), &publish).await;
                            });
                        }
                        Some(Err(e)) => {
                            error!("Consume stream error: {}", e);
                        }
                        None => {
                            warn!("Consume stream closed by broker");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("Stop signal received, no longer accepting deliveries");
                    break;
                }
            }
        }

        if let Err(e) = self
            .channel
            .basic_cancel(consumer.tag().as_str(), BasicCancelOptions::default())
            .await
        {
            warn!("Failed to cancel consumer: {}", e);
        }

        // Re-acquiring the full window waits for every in-flight delivery
        // to resolve.
        let _drain = admission
            .acquire_many(self.concurrency_limit as u32)
            .await
            .map_err(|_| InferQError::internal("Admission semaphore closed"))?;

        info!("All in-flight deliveries resolved, closing connection");
        self.connection.close(200, "worker shutdown").await?;

        Ok(())
    }
}

/// Resolve one delivery: ack on success, nack without requeue on any
/// failure. This is the only place acks and nacks are issued, so each
/// delivery gets exactly one of the two.
async fn handle_delivery(delivery: Delivery, pipeline: &dyn Pipeline, publish: &Mutex<Channel>) {
    match process_delivery(&delivery, pipeline, publish).await {
        Ok(message_id) => {
            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                error!("Failed to ack message {}: {}", message_id, e);
            } else {
                METRICS.worker.acked_total.inc();
                debug!("Acked message {}", message_id);
            }
        }
        Err(e) => {
            warn!("Dropping delivery: {}", e);
            let nack = BasicNackOptions {
                requeue: false,
                ..Default::default()
            };
            if let Err(nack_err) = delivery.nack(nack).await {
                error!("Failed to nack delivery: {}", nack_err);
            } else {
                METRICS.worker.nacked_total.inc();
            }
        }
    }
}

/// Decode, run the pipeline, and publish the correlated reply.
/// Returns the message id for logging; any error resolves as a nack.
async fn process_delivery(
    delivery: &Delivery,
    pipeline: &dyn Pipeline,
    publish: &Mutex<Channel>,
) -> Result<String> {
    let pick_up_timestamp = wall_clock_secs();

    let request = RequestEnvelope::from_bytes(&delivery.data)?;

    let reply_to = delivery
        .properties
        .reply_to()
        .as_ref()
        .map(|queue| queue.as_str().to_string())
        .ok_or(InferQError::MissingReplyTo)?;

    let correlation_id = delivery
        .properties
        .correlation_id()
        .clone()
        .ok_or(InferQError::MissingCorrelationId)?;

    if correlation_id.as_str() != request.message_id {
        warn!(
            "Correlation id '{}' does not match message id '{}'",
            correlation_id.as_str(),
            request.message_id
        );
    }

    debug!(
        "Picked up message {} (reply-to '{}')",
        request.message_id, reply_to
    );

    let started = Instant::now();
    let reply = execute(&request, pipeline, pick_up_timestamp)?;
    METRICS
        .worker
        .pipeline_duration
        .observe(started.elapsed().as_secs_f64());

    let payload = reply.to_bytes()?;
    let properties = BasicProperties::default()
        .with_correlation_id(correlation_id)
        .with_delivery_mode(2);

    let publish_started = Instant::now();
    {
        let channel = publish.lock().await;
        channel
            .basic_publish(
                "",
                &reply_to,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await?;
    }
    METRICS
        .worker
        .publish_duration
        .observe(publish_started.elapsed().as_secs_f64());

    Ok(reply.message_id)
}

/// Run the two pipeline stages and assemble the reply envelope.
/// `response_timestamp` is stamped here, immediately before the publish
/// step, and never precedes `pick_up_timestamp`.
fn execute(
    request: &RequestEnvelope,
    pipeline: &dyn Pipeline,
    pick_up_timestamp: f64,
) -> Result<ReplyEnvelope> {
    let processed = pipeline.preprocess(&request.data)?;
    let output = pipeline.predict(&processed)?;

    Ok(ReplyEnvelope {
        message_id: request.message_id.clone(),
        original_input: request.data.clone(),
        processed_data: processed,
        model_output: output,
        pick_up_timestamp,
        response_timestamp: wall_clock_secs().max(pick_up_timestamp),
    })
}
