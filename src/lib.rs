//! A staged line-processing pipeline built on bounded blocking queues.
//!
//! This crate runs a fixed linear topology of concurrent stages: a reader
//! stage acquires lines from an input stream, fold stages normalize
//! substrings, and a reflow stage re-chunks the text into fixed-width output
//! records. Adjacent stages communicate through fixed-capacity FIFO queues
//! with blocking backpressure; a sentinel line propagates end-of-stream
//! through every boundary.
//!
//! # Features
//!
//! - Monitor-style bounded queues (mutex + condition variables, guard
//!   predicates re-checked after every wake)
//! - Blocking backpressure: producers park when a queue is at capacity
//! - One canonical sentinel literal forwarded verbatim at every boundary
//! - Explicit shutdown that wakes every blocked stage
//! - Per-stage counters: lines in, lines out, truncated
//!
//! # Example
//!
//! ```no_run
//! use line_pipeline::{Pipeline, PipelineConfig};
//! use std::io::{self, BufReader};
//!
//! # fn main() -> line_pipeline::Result<()> {
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let running = pipeline.start(BufReader::new(io::stdin()), io::stdout())?;
//! running.wait()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod stage;
pub mod transform;

// Re-exports for convenience
pub use error::{PipelineError, Result};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipeline::{Pipeline, PipelineConfig, RunningPipeline};
pub use queue::BoundedQueue;
pub use stage::{Line, LinePolicy, Sink, Source, Stage, StageConfig};
pub use transform::{FixedWidthReflow, SubstringFold, Transform};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
