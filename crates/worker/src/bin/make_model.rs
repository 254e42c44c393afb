//! Offline dummy-model generator
//!
//! Writes a model artifact made of `--size` sequential identity layers, a
//! stand-in for a real model during load testing. One-shot tool, not part
//! of the runtime path.

use clap::Parser;
use inferq_worker::Model;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Create a dummy model artifact with a configurable number of layers")]
struct Args {
    /// Number of sequential identity layers in the model
    #[arg(long, default_value_t = 1)]
    size: usize,

    /// Where to write the artifact
    #[arg(long, default_value = "model.json")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let model = Model::identity(args.size);
    model.save(&args.output)?;

    println!(
        "Dummy model with {} layers written to {}",
        args.size,
        args.output.display()
    );

    Ok(())
}
