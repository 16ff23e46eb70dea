//! The log panel: a bounded, newest-first list of timestamped entries.

use std::collections::VecDeque;

use pistat_types::time::clock_hms;

#[derive(Debug)]
pub struct LogBook {
    entries: VecDeque<String>,
    capacity: usize,
}

impl LogBook {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Prepend `[HH:MM:SS] text`, evicting the oldest entry when full.
    pub fn push(&mut self, text: &str, unix_secs: u64) {
        self.entries
            .push_front(format!("[{}] {text}", clock_hms(unix_secs)));
        self.entries.truncate(self.capacity);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
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
}
