//! The classic four-stage line processor.
//!
//! Reads lines from stdin, folds "\n" to ' ' and "++" to '^', and writes
//! the result as 80-character output lines. The line "STOP" ends the input.
//!
//! Usage: cargo run --example line_processor --release
//!        (Then type lines of text, finishing with a line reading STOP)

use line_pipeline::{Pipeline, PipelineConfig};
use std::io::{self, BufReader};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let pipeline = Pipeline::new(PipelineConfig::default())?;
    let running = pipeline.start(BufReader::new(io::stdin()), io::stdout())?;
    running.wait()?;

    Ok(())
}
