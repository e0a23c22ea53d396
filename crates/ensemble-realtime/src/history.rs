//! Bounded, most-recent-first prediction history.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::events::PredictionRecord;

/// Default number of records retained.
pub const DEFAULT_CAPACITY: usize = 100;

/// Thread-safe ring of recent predictions.
pub struct HistoryBuffer {
    inner: Mutex<VecDeque<PredictionRecord>>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Insert at the front, evicting the oldest record when full.
    pub fn push(&self, record: PredictionRecord) {
        let mut inner = self.inner.lock();
        inner.push_front(record);
        inner.truncate(self.capacity);
    }

    /// Records, newest first.
    pub fn snapshot(&self) -> Vec<PredictionRecord> {
        self.inner.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
