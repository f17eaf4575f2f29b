use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::queue::BoundedQueue;
use crate::stage::{Line, LinePolicy, Sink, Source, Stage, StageConfig};
use crate::transform::{FixedWidthReflow, SubstringFold, Transform};
use std::io::{BufRead, Write};
use std::thread::{spawn, JoinHandle};
use tracing::debug;

/// Startup-time constants for a pipeline.
///
/// The defaults are the historical ones: capacity 50, lines up to 1000
/// bytes, 80-column output, the `"\n" -> ' '` and `"++" -> '^'` folds, and
/// the `"STOP\n"` sentinel.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of every queue between adjacent stages.
    pub queue_capacity: usize,
    /// Maximum accepted line length in bytes.
    pub max_line_len: usize,
    /// Width of each output record.
    pub output_width: usize,
    /// Substring folds, one stage each, applied in order.
    pub folds: Vec<(String, char)>,
    /// The line value signaling end-of-stream. One canonical literal is
    /// used at every stage boundary.
    pub sentinel: Line,
    /// Policy for oversized lines.
    pub line_policy: LinePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            max_line_len: 1000,
            output_width: 80,
            folds: vec![("\n".to_string(), ' '), ("++".to_string(), '^')],
            sentinel: "STOP\n".to_string(),
            line_policy: LinePolicy::Truncate,
        }
    }
}

/// A fixed linear topology of stages connected by bounded queues.
///
/// For N folds the pipeline runs N + 2 stages over N + 1 queues: a reader
/// stage, one stage per fold, and a reflow stage writing fixed-width
/// records. Queues are constructed here and handed to the stages; there is
/// no ambient shared state.
pub struct Pipeline {
    config: PipelineConfig,
    stage_names: Vec<String>,
    metrics: Vec<StageMetrics>,
}

impl Pipeline {
    /// Validate a config and assemble a pipeline from it.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        if config.queue_capacity == 0 {
            return Err(PipelineError::ConfigError(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if config.output_width == 0 {
            return Err(PipelineError::ConfigError(
                "output width must be at least 1".to_string(),
            ));
        }
        if config.sentinel.is_empty() {
            return Err(PipelineError::ConfigError(
                "sentinel must not be empty".to_string(),
            ));
        }
        if config.sentinel.len() > config.max_line_len {
            return Err(PipelineError::ConfigError(
                "sentinel longer than maximum line length".to_string(),
            ));
        }

        let mut stage_names = vec!["reader".to_string()];
        for (pattern, _) in &config.folds {
            stage_names.push(format!("fold({})", pattern.escape_debug()));
        }
        stage_names.push("reflow".to_string());
        let metrics = stage_names.iter().map(|_| StageMetrics::new()).collect();

        Ok(Self {
            config,
            stage_names,
            metrics,
        })
    }

    /// Get the number of stages this pipeline runs.
    pub fn stage_count(&self) -> usize {
        self.stage_names.len()
    }

    /// Get the names of the stages, in topology order.
    pub fn stage_names(&self) -> &[String] {
        &self.stage_names
    }

    /// Get metrics for a specific stage.
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index)
    }

    /// Start every stage on its own thread, reading lines from `reader` and
    /// writing fixed-width records to `writer`.
    pub fn start(
        self,
        reader: impl BufRead + Send + 'static,
        writer: impl Write + Send + 'static,
    ) -> Result<RunningPipeline> {
        let n_stages = self.stage_count();
        let queues: Vec<BoundedQueue<Line>> = (0..n_stages - 1)
            .map(|_| BoundedQueue::new(self.config.queue_capacity))
            .collect();

        let mut sources: Vec<Source> = Vec::with_capacity(n_stages);
        let mut sinks: Vec<Sink> = Vec::with_capacity(n_stages);
        sources.push(Source::Reader(Box::new(reader)));
        for queue in &queues {
            sources.push(Source::Queue(queue.clone()));
            sinks.push(Sink::Queue(queue.clone()));
        }
        sinks.push(Sink::Writer(Box::new(writer)));

        let mut transforms: Vec<Option<Box<dyn Transform>>> = vec![None];
        for (pattern, replacement) in &self.config.folds {
            transforms.push(Some(Box::new(SubstringFold::new(
                pattern.clone(),
                *replacement,
            ))));
        }
        transforms.push(Some(Box::new(FixedWidthReflow::new(
            self.config.output_width,
        ))));

        debug!(stages = n_stages, "starting pipeline");

        let mut handles = Vec::with_capacity(n_stages);
        for (((name, source), (sink, transform)), metrics) in self
            .stage_names
            .iter()
            .cloned()
            .zip(sources)
            .zip(sinks.into_iter().zip(transforms))
            .zip(self.metrics.iter().cloned())
        {
            let stage = Stage::new(
                StageConfig {
                    name,
                    source,
                    sink,
                    transform,
                    sentinel: self.config.sentinel.clone(),
                    max_line_len: self.config.max_line_len,
                    line_policy: self.config.line_policy,
                },
                metrics,
            );
            handles.push(spawn(move || stage.run()));
        }

        Ok(RunningPipeline {
            handles,
            queues,
            stage_names: self.stage_names,
            metrics: self.metrics,
        })
    }
}

/// A started pipeline that can be joined or shut down.
pub struct RunningPipeline {
    handles: Vec<JoinHandle<Result<()>>>,
    queues: Vec<BoundedQueue<Line>>,
    stage_names: Vec<String>,
    metrics: Vec<StageMetrics>,
}

impl RunningPipeline {
    /// Block until every stage has terminated, surfacing the first error.
    ///
    /// `QueueClosed` results are cascade effects of another stage's failure,
    /// so a more specific error from any stage takes precedence over them.
    pub fn wait(self) -> Result<()> {
        let mut results = Vec::with_capacity(self.handles.len());
        for (handle, name) in self.handles.into_iter().zip(&self.stage_names) {
            match handle.join() {
                Ok(result) => results.push(result),
                Err(_) => {
                    return Err(PipelineError::ThreadError(format!(
                        "stage {name} panicked"
                    )))
                }
            }
        }
        let mut first_closed = None;
        for result in results {
            match result {
                Ok(()) => {}
                Err(PipelineError::QueueClosed) => {
                    if first_closed.is_none() {
                        first_closed = Some(PipelineError::QueueClosed);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        match first_closed {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Raise the shutdown signal: close every queue, waking all blocked
    /// stages, then join them.
    ///
    /// Stages cut off mid-enqueue report `QueueClosed`; under an explicit
    /// shutdown that is the expected outcome, not a failure.
    pub fn shutdown(self) -> Result<()> {
        for queue in &self.queues {
            queue.close();
        }
        match self.wait() {
            Err(PipelineError::QueueClosed) => Ok(()),
            other => other,
        }
    }

    /// Get metrics for a specific stage.
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index)
    }

    /// Get a summary of all stage counters.
    pub fn metrics_summary(&self) -> String {
        let mut summary = String::from("Pipeline stage counters:\n");
        for (name, metrics) in self.stage_names.iter().zip(&self.metrics) {
            summary.push_str(&format!("  {}: {}\n", name, metrics.snapshot().format()));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_topology() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        assert_eq!(pipeline.stage_count(), 4);
        assert_eq!(pipeline.stage_names()[0], "reader");
        assert_eq!(pipeline.stage_names()[3], "reflow");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = PipelineConfig {
            queue_capacity: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_zero_width_rejected() {
        let config = PipelineConfig {
            output_width: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_empty_sentinel_rejected() {
        let config = PipelineConfig {
            sentinel: String::new(),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_no_folds_still_has_reader_and_reflow() {
        let config = PipelineConfig {
            folds: Vec::new(),
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(config).unwrap();
        assert_eq!(pipeline.stage_count(), 2);
    }
}
