// Bounded most-recent-first event log
use chrono::Local;
use serde::Serialize;
use std::collections::VecDeque;

/// Most entries the log retains; the oldest is evicted on overflow.
pub const LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Alert,
    Info,
    Action,
}

/// Immutable once inserted; only eviction removes an entry.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: u64,
    pub time: String,
    #[serde(rename = "type")]
    pub category: LogCategory,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    next_id: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(LOG_CAPACITY),
            next_id: 1,
        }
    }

    /// Prepend an entry with a fresh unique id and a local time string,
    /// then truncate to the newest [`LOG_CAPACITY`] entries.
    pub fn add(&mut self, category: LogCategory, message: impl Into<String>) {
        let entry = LogEntry {
            id: self.next_id,
            time: Local::now().format("%H:%M:%S").to_string(),
            category,
            message: message.into(),
        };
        self.next_id += 1;
        self.entries.push_front(entry);
        self.entries.truncate(LOG_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries newest first.
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}
