use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::queue::BoundedQueue;
use crate::transform::Transform;
use std::io::{BufRead, Write};
use tracing::{debug, warn};

/// A single logical line of text flowing through the pipeline.
pub type Line = String;

/// Where a stage acquires lines from.
pub enum Source {
    /// A blocking line-buffered reader (e.g. stdin). Lines retain their
    /// terminator, like `fgets`.
    Reader(Box<dyn BufRead + Send>),
    /// The queue fed by the upstream stage.
    Queue(BoundedQueue<Line>),
}

/// Where a stage delivers lines to.
pub enum Sink {
    /// The queue draining into the downstream stage.
    Queue(BoundedQueue<Line>),
    /// A blocking writer (e.g. stdout); each delivered line is written as
    /// one output record with a trailing newline.
    Writer(Box<dyn Write + Send>),
}

/// Policy for lines exceeding the configured maximum length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePolicy {
    /// Deterministically truncate at a char boundary and continue.
    Truncate,
    /// Terminate the stage with `LineTooLong`.
    Fail,
}

/// The contract binding a stage to its source, sink, transform, and sentinel.
/// Immutable once the pipeline starts.
pub struct StageConfig {
    pub name: String,
    pub source: Source,
    pub sink: Sink,
    pub transform: Option<Box<dyn Transform>>,
    pub sentinel: Line,
    pub max_line_len: usize,
    pub line_policy: LinePolicy,
}

/// One concurrent worker: acquire a line, optionally transform it, deliver
/// the result, until the sentinel arrives.
///
/// A stage makes a single `RUNNING -> TERMINATED` transition, entered when
/// the acquired line equals the sentinel exactly or the source ends. The
/// sentinel is compared *before* any transform is applied and forwarded
/// verbatim, so every stage in the pipeline matches on the same literal.
pub struct Stage {
    name: String,
    source: Source,
    sink: Sink,
    transform: Option<Box<dyn Transform>>,
    sentinel: Line,
    max_line_len: usize,
    line_policy: LinePolicy,
    metrics: StageMetrics,
}

impl Stage {
    /// Create a stage from its config, reporting counts into `metrics`.
    pub fn new(config: StageConfig, metrics: StageMetrics) -> Self {
        Self {
            name: config.name,
            source: config.source,
            sink: config.sink,
            transform: config.transform,
            sentinel: config.sentinel,
            max_line_len: config.max_line_len,
            line_policy: config.line_policy,
            metrics,
        }
    }

    /// Run the stage to termination.
    ///
    /// On an error return the stage closes both of its queues so that no
    /// neighboring stage stays blocked on a boundary that will never move
    /// again; the error itself surfaces through the pipeline join.
    pub fn run(mut self) -> Result<()> {
        debug!(stage = %self.name, "running");
        let result = self.run_loop();
        if result.is_err() {
            if let Sink::Queue(queue) = &self.sink {
                queue.close();
            }
            if let Source::Queue(queue) = &self.source {
                queue.close();
            }
        }
        result
    }

    fn run_loop(&mut self) -> Result<()> {
        loop {
            let line = match self.acquire()? {
                Some(line) => line,
                // Source ended without a sentinel: terminate anyway and
                // still propagate shutdown downstream.
                None => return self.finish(),
            };
            if line == self.sentinel {
                return self.finish();
            }
            let line = self.enforce_length(line)?;
            self.metrics.record_in();
            let outputs = match self.transform.as_mut() {
                Some(transform) => transform.apply(line),
                None => vec![line],
            };
            for output in outputs {
                self.deliver(output)?;
            }
        }
    }

    /// Acquire one line, blocking as needed. `None` means end-of-stream:
    /// reader EOF, or the upstream queue closed and fully drained.
    fn acquire(&mut self) -> Result<Option<Line>> {
        match &mut self.source {
            Source::Reader(reader) => {
                let mut line = String::new();
                let n = reader.read_line(&mut line)?;
                if n == 0 {
                    Ok(None)
                } else {
                    Ok(Some(line))
                }
            }
            Source::Queue(queue) => match queue.dequeue() {
                Ok(line) => Ok(Some(line)),
                Err(PipelineError::QueueClosed) => Ok(None),
                Err(e) => Err(e),
            },
        }
    }

    fn enforce_length(&self, line: Line) -> Result<Line> {
        if line.len() <= self.max_line_len {
            return Ok(line);
        }
        match self.line_policy {
            LinePolicy::Fail => Err(PipelineError::LineTooLong {
                len: line.len(),
                max: self.max_line_len,
            }),
            LinePolicy::Truncate => {
                let mut line = line;
                let mut cut = self.max_line_len;
                while !line.is_char_boundary(cut) {
                    cut -= 1;
                }
                warn!(
                    stage = %self.name,
                    len = line.len(),
                    max = self.max_line_len,
                    "truncating oversized line"
                );
                line.truncate(cut);
                self.metrics.record_truncated();
                Ok(line)
            }
        }
    }

    fn deliver(&mut self, line: Line) -> Result<()> {
        self.metrics.record_out();
        match &mut self.sink {
            Sink::Queue(queue) => queue.enqueue(line),
            Sink::Writer(writer) => {
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
                Ok(())
            }
        }
    }

    /// Terminate: flush the transform, forward the sentinel to a queue sink
    /// (never to the external writer), and close the boundary so any line
    /// enqueued after the sentinel is never consumed.
    fn finish(&mut self) -> Result<()> {
        let flushed = match self.transform.as_mut() {
            Some(transform) => transform.flush(),
            None => Vec::new(),
        };
        for output in flushed {
            self.deliver(output)?;
        }
        match &mut self.sink {
            Sink::Queue(queue) => {
                // Downstream may already be gone on an error path; a closed
                // queue here is not a failure of this stage.
                if let Err(PipelineError::QueueClosed) = queue.enqueue(self.sentinel.clone()) {
                    debug!(stage = %self.name, "downstream already closed");
                }
                queue.close();
            }
            Sink::Writer(writer) => writer.flush()?,
        }
        debug!(stage = %self.name, "terminated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::thread;

    fn config(source: Source, sink: Sink) -> StageConfig {
        StageConfig {
            name: "test".to_string(),
            source,
            sink,
            transform: None,
            sentinel: "STOP\n".to_string(),
            max_line_len: 1000,
            line_policy: LinePolicy::Truncate,
        }
    }

    #[test]
    fn test_reader_to_queue_forwards_sentinel() {
        let queue = BoundedQueue::new(10);
        let cfg = config(
            Source::Reader(Box::new(Cursor::new(b"one\ntwo\nSTOP\n".to_vec()))),
            Sink::Queue(queue.clone()),
        );
        Stage::new(cfg, StageMetrics::new()).run().unwrap();

        assert_eq!(queue.dequeue().unwrap(), "one\n");
        assert_eq!(queue.dequeue().unwrap(), "two\n");
        assert_eq!(queue.dequeue().unwrap(), "STOP\n");
        assert!(queue.is_closed());
    }

    #[test]
    fn test_lines_after_sentinel_are_not_consumed() {
        let source = BoundedQueue::new(10);
        let sink = BoundedQueue::new(10);
        source.enqueue("a\n".to_string()).unwrap();
        source.enqueue("STOP\n".to_string()).unwrap();
        source.enqueue("after\n".to_string()).unwrap();

        let cfg = config(Source::Queue(source.clone()), Sink::Queue(sink.clone()));
        Stage::new(cfg, StageMetrics::new()).run().unwrap();

        assert_eq!(sink.dequeue().unwrap(), "a\n");
        assert_eq!(sink.dequeue().unwrap(), "STOP\n");
        assert!(matches!(sink.dequeue(), Err(PipelineError::QueueClosed)));
        // The post-sentinel line is still sitting upstream.
        assert_eq!(source.dequeue().unwrap(), "after\n");
    }

    #[test]
    fn test_eof_without_sentinel_terminates_and_propagates() {
        let queue = BoundedQueue::new(10);
        let cfg = config(
            Source::Reader(Box::new(Cursor::new(b"only\n".to_vec()))),
            Sink::Queue(queue.clone()),
        );
        Stage::new(cfg, StageMetrics::new()).run().unwrap();

        assert_eq!(queue.dequeue().unwrap(), "only\n");
        assert_eq!(queue.dequeue().unwrap(), "STOP\n");
        assert!(queue.is_closed());
    }

    #[test]
    fn test_closed_source_terminates_stage() {
        let source: BoundedQueue<Line> = BoundedQueue::new(10);
        let sink = BoundedQueue::new(10);
        let cfg = config(Source::Queue(source.clone()), Sink::Queue(sink.clone()));
        let handle = thread::spawn(move || Stage::new(cfg, StageMetrics::new()).run());
        source.close();
        handle.join().unwrap().unwrap();
        assert!(sink.is_closed());
    }

    #[test]
    fn test_truncate_policy() {
        let sink = BoundedQueue::new(10);
        let metrics = StageMetrics::new();
        let mut cfg = config(
            Source::Reader(Box::new(Cursor::new(b"0123456789abc\nSTOP\n".to_vec()))),
            Sink::Queue(sink.clone()),
        );
        cfg.max_line_len = 10;
        cfg.sentinel = "STOP\n".to_string();
        Stage::new(cfg, metrics.clone()).run().unwrap();

        assert_eq!(sink.dequeue().unwrap(), "0123456789");
        assert_eq!(metrics.total_truncated(), 1);
    }

    #[test]
    fn test_fail_policy_closes_sink() {
        let sink: BoundedQueue<Line> = BoundedQueue::new(10);
        let mut cfg = config(
            Source::Reader(Box::new(Cursor::new(b"0123456789abc\n".to_vec()))),
            Sink::Queue(sink.clone()),
        );
        cfg.max_line_len = 10;
        cfg.line_policy = LinePolicy::Fail;
        let result = Stage::new(cfg, StageMetrics::new()).run();

        assert!(matches!(
            result,
            Err(PipelineError::LineTooLong { len: 14, max: 10 })
        ));
        assert!(sink.is_closed());
    }

    #[test]
    fn test_transform_applied_between_acquire_and_deliver() {
        use crate::transform::SubstringFold;

        let sink = BoundedQueue::new(10);
        let mut cfg = config(
            Source::Reader(Box::new(Cursor::new(b"a++b\nSTOP\n".to_vec()))),
            Sink::Queue(sink.clone()),
        );
        cfg.transform = Some(Box::new(SubstringFold::new("++", '^')));
        Stage::new(cfg, StageMetrics::new()).run().unwrap();

        assert_eq!(sink.dequeue().unwrap(), "a^b\n");
        // Sentinel passed through untransformed.
        assert_eq!(sink.dequeue().unwrap(), "STOP\n");
    }
}
