//! Recency list bounding the number of tracked indices
//!
//! Only caller queries refresh an index's position. Look-ahead fetches and
//! deliveries never do.

use std::collections::VecDeque;

/// Most-recently-requested-first list of tracked indices
#[derive(Debug, Clone)]
pub struct RecencyList {
    order: VecDeque<u64>,
    capacity: usize,
}

impl RecencyList {
    /// Create a list holding at most `capacity` indices
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Make `index` the most recent, returning the indices culled to stay
    /// within capacity, least recent first
    pub fn touch(&mut self, index: u64) -> Vec<u64> {
        self.remove(index);
        self.order.push_front(index);

        let mut evicted = Vec::new();
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_back() {
                evicted.push(oldest);
            }
        }
        evicted
    }

    /// Drop `index` from the list, returning whether it was present
    pub fn remove(&mut self, index: u64) -> bool {
        match self.order.iter().position(|&i| i == index) {
            Some(pos) => {
                self.order.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Number of indices in the list
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maximum number of indices held
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Indices from most to least recent
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.order.iter().copied()
    }
}
