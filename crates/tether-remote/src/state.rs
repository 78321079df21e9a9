//! Per-session bookkeeping: output buffer and command history

use std::collections::VecDeque;

/// Bounded scrollback for session output.
///
/// Oldest lines are evicted once the cap is reached, so a long-running
/// session cannot grow without bound.
#[derive(Debug)]
pub struct OutputBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl OutputBuffer {
    /// Create a buffer retaining at most `capacity` lines
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    /// Append one line, evicting the oldest while at or over capacity
    pub fn push_line(&mut self, line: impl Into<String>) {
        while self.lines.len() >= self.capacity.max(1) {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Append a block of text, split into lines
    pub fn push_block(&mut self, text: &str) {
        for line in text.lines() {
            self.push_line(line);
        }
    }

    /// Retained lines, oldest first
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Number of retained lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Drop all retained lines
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Append-only command history that collapses immediate repeats
#[derive(Debug, Default)]
pub struct CommandHistory {
    entries: Vec<String>,
}

impl CommandHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command unless it duplicates the previous entry
    pub fn push(&mut self, command: &str) {
        if self.entries.last().map(String::as_str) == Some(command) {
            return;
        }
        self.entries.push(command.to_string());
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_collapses_immediate_repeat() {
        let mut history = CommandHistory::new();
        history.push("ls");
        history.push("ls");
        history.push("pwd");
        assert_eq!(history.entries(), ["ls", "pwd"]);
    }

    #[test]
    fn test_history_keeps_non_adjacent_repeats() {
        let mut history = CommandHistory::new();
        history.push("ls");
        history.push("pwd");
        history.push("ls");
        assert_eq!(history.entries(), ["ls", "pwd", "ls"]);
    }

    #[test]
    fn test_output_buffer_evicts_oldest() {
        let mut buffer = OutputBuffer::new(3);
        for i in 0..5 {
            buffer.push_line(format!("line {}", i));
        }
        let lines: Vec<_> = buffer.lines().collect();
        assert_eq!(lines, ["line 2", "line 3", "line 4"]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_output_buffer_zero_capacity_stays_bounded() {
        let mut buffer = OutputBuffer::new(0);
        for i in 0..10 {
            buffer.push_line(format!("line {}", i));
        }
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.lines().next(), Some("line 9"));
    }

    #[test]
    fn test_output_buffer_push_block_splits_lines() {
        let mut buffer = OutputBuffer::new(10);
        buffer.push_block("one\ntwo\nthree\n");
        let lines: Vec<_> = buffer.lines().collect();
        assert_eq!(lines, ["one", "two", "three"]);
    }
}
