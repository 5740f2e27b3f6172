use crate::models::{LogEntry, LogSeverity};
use chrono::{Local, Utc};
use std::collections::VecDeque;

pub const LOG_CAPACITY: usize = 100;

/// Bounded activity log. Pushing past capacity drops the oldest entry;
/// sequence numbers keep counting across evictions and clears.
#[derive(Debug)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_seq: u64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, severity: LogSeverity, message: impl Into<String>) -> &LogEntry {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        let entry = LogEntry {
            seq: self.next_seq,
            timestamp: Utc::now(),
            severity,
            message: message.into(),
        };
        self.next_seq += 1;
        self.entries.push_back(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// One line per entry, oldest first, as written by log export.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                format!(
                    "[{}] {:<7} {}\n",
                    entry.timestamp.with_timezone(&Local).format("%H:%M:%S"),
                    entry.severity.as_str().to_uppercase(),
                    entry.message
                )
            })
            .collect()
    }
}
