// ── Bounded message log ──

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use strum::{Display, EnumString};

/// Default number of entries kept before the oldest is evicted.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    /// Received from the tracker, stored verbatim.
    Inbound,
    /// Recorded locally for an action this client issued.
    Client,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub received_at: DateTime<Utc>,
    pub direction: Direction,
    pub payload: Value,
}

/// FIFO of the most recent messages.
#[derive(Debug)]
pub(crate) struct MessageLog {
    entries: VecDeque<Arc<LogEntry>>,
    capacity: usize,
}

impl MessageLog {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, entry: LogEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Arc::new(entry));
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest first.
    pub(crate) fn snapshot(&self) -> Vec<Arc<LogEntry>> {
        self.entries.iter().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(n: usize) -> LogEntry {
        LogEntry {
            received_at: Utc::now(),
            direction: Direction::Inbound,
            payload: json!({ "n": n }),
        }
    }

    #[test]
    fn keeps_latest_entries_in_order() {
        let mut log = MessageLog::new(DEFAULT_LOG_CAPACITY);
        for n in 0..600 {
            log.push(entry(n));
        }
        let snap = log.snapshot();
        assert_eq!(snap.len(), 500);
        assert_eq!(snap[0].payload, json!({ "n": 100 }));
        assert_eq!(snap[499].payload, json!({ "n": 599 }));
    }

    #[test]
    fn zero_capacity_still_keeps_one() {
        let mut log = MessageLog::new(0);
        log.push(entry(1));
        log.push(entry(2));
        assert_eq!(log.len(), 1);
        log.clear();
        assert_eq!(log.len(), 0);
    }
}
