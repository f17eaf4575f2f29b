//! Pure per-line transforms applied by pipeline stages.
//!
//! A transform consumes one line and produces zero or more output lines.
//! Transforms may buffer state across calls (`FixedWidthReflow` does); that
//! state is owned by the single stage running the transform and is never
//! shared across threads.

/// A text transform run by a single stage.
pub trait Transform: Send {
    /// Process one input line, producing zero or more output lines.
    fn apply(&mut self, line: String) -> Vec<String>;

    /// Emit any buffered state at end-of-stream.
    fn flush(&mut self) -> Vec<String> {
        Vec::new()
    }

    /// Get a human-readable name for this transform.
    fn name(&self) -> &str {
        "transform"
    }
}

/// Replaces every non-overlapping occurrence of a pattern with a single
/// character.
///
/// The scan is a single left-to-right pass: after a replacement it resumes
/// immediately past the inserted character, so replacements never re-trigger
/// on text they introduced, but the remainder of the original line is still
/// scanned. The output is never longer than the input.
#[derive(Debug, Clone)]
pub struct SubstringFold {
    pattern: String,
    replacement: char,
}

impl SubstringFold {
    /// Create a fold replacing `pattern` with the single `replacement` char.
    pub fn new(pattern: impl Into<String>, replacement: char) -> Self {
        Self {
            pattern: pattern.into(),
            replacement,
        }
    }

    /// Apply the fold to one line. No-op if the pattern is empty or absent.
    pub fn fold(&self, line: &str) -> String {
        if self.pattern.is_empty() || !line.contains(&self.pattern) {
            return line.to_string();
        }
        let mut out = String::with_capacity(line.len());
        let mut rest = line;
        while let Some(idx) = rest.find(&self.pattern) {
            out.push_str(&rest[..idx]);
            out.push(self.replacement);
            rest = &rest[idx + self.pattern.len()..];
        }
        out.push_str(rest);
        out
    }
}

impl Transform for SubstringFold {
    fn apply(&mut self, line: String) -> Vec<String> {
        vec![self.fold(&line)]
    }

    fn name(&self) -> &str {
        "substring_fold"
    }
}

/// Re-chunks a continuous text stream into fixed-width lines.
///
/// Input lines are appended to an internal accumulator; whole `width`-char
/// lines are emitted as they become available. Text shorter than `width`
/// stays buffered until a later call, and `flush` emits the remainder as a
/// final short line so end-of-stream loses no characters.
#[derive(Debug)]
pub struct FixedWidthReflow {
    width: usize,
    buffer: String,
}

impl FixedWidthReflow {
    /// Create a reflow emitting lines of exactly `width` characters.
    pub fn new(width: usize) -> Self {
        Self {
            width,
            buffer: String::new(),
        }
    }

    /// Get the number of characters currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.chars().count()
    }

    fn drain_full_lines(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while self.buffer.chars().count() >= self.width {
            // Split on the char boundary after `width` chars.
            let split = self
                .buffer
                .char_indices()
                .nth(self.width)
                .map(|(i, _)| i)
                .unwrap_or(self.buffer.len());
            let rest = self.buffer.split_off(split);
            out.push(std::mem::replace(&mut self.buffer, rest));
        }
        out
    }
}

impl Transform for FixedWidthReflow {
    fn apply(&mut self, line: String) -> Vec<String> {
        self.buffer.push_str(&line);
        self.drain_full_lines()
    }

    fn flush(&mut self) -> Vec<String> {
        if self.buffer.is_empty() {
            Vec::new()
        } else {
            vec![std::mem::take(&mut self.buffer)]
        }
    }

    fn name(&self) -> &str {
        "fixed_width_reflow"
    }
}
