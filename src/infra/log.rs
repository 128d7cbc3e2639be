//! Bounded, newest-first event log backing the panel's scrollback pane

use std::collections::VecDeque;
use time::macros::format_description;
use time::OffsetDateTime;

/// Default number of entries kept before the oldest are evicted.
pub const LOG_CAPACITY: usize = 200;

/// One timestamped line in the panel log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: OffsetDateTime,
    pub message: String,
}

impl LogEntry {
    /// Wall-clock stamp for display, local time when the offset is known.
    pub fn stamp(&self) -> String {
        let fmt = format_description!("[hour]:[minute]:[second]");
        self.at.format(&fmt).unwrap_or_else(|_| "--:--:--".to_string())
    }
}

/// Append-only log of user and network events, newest first.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: VecDeque::new(), capacity }
    }

    /// Prepend a line, evicting the oldest entry past capacity.
    pub fn push(&mut self, message: impl Into<String>) {
        let at = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        self.entries.push_front(LogEntry { at, message: message.into() });
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    /// Entries newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first() {
        let mut log = EventLog::new();
        log.push("first");
        log.push("second");
        let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut log = EventLog::with_capacity(3);
        for i in 0..5 {
            log.push(format!("entry {i}"));
        }
        assert_eq!(log.len(), 3);
        let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["entry 4", "entry 3", "entry 2"]);
    }

    #[test]
    fn test_stamp_formats() {
        let mut log = EventLog::new();
        log.push("x");
        let entry = log.iter().next().unwrap();
        // HH:MM:SS
        assert_eq!(entry.stamp().len(), 8);
    }
}
