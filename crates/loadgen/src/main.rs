//! InferQ Load Generator - Main Entry Point
//!
//! Publishes a batch of inference requests, waits for the correlated
//! replies, and prints latency statistics to standard output.

use clap::Parser;
use inferq_loadgen::{harness, HarnessOptions};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Send messages to the work queue for performance testing and collect
/// response metrics
#[derive(Parser, Debug)]
#[command(name = "inferq-loadgen")]
struct Args {
    /// Number of messages to send
    #[arg(long, alias = "num_messages", default_value_t = 20)]
    num_messages: usize,

    /// How long to wait for response messages, in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Broker host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Work queue name
    #[arg(long, default_value = "request_queue")]
    queue: String,

    /// Reply queue name
    #[arg(long, alias = "response_queue", default_value = "response_queue")]
    response_queue: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inferq_loadgen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let options = HarnessOptions {
        host: args.host,
        queue: args.queue,
        response_queue: args.response_queue,
        num_messages: args.num_messages,
        timeout: Duration::from_secs(args.timeout),
    };

    let outcome = harness::run(options).await?;

    println!(
        "\nSent {} messages in {:.2} seconds.",
        outcome.publish.published, outcome.publish.total_secs
    );
    println!(
        "Average send time: {:.4} seconds per message.",
        outcome.publish.avg_secs
    );
    println!();

    match outcome.report {
        Some(report) => println!("{report}"),
        None => println!("--- No responses received or metrics could not be calculated. ---"),
    }

    Ok(())
}
