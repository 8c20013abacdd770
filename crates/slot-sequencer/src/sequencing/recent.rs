use std::collections::VecDeque;

use super::domain::{TrackId, MAX_REPEAT_WINDOW};

/// Bounded FIFO of recently selected tracks for one playback session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentPlayWindow {
    capacity: usize,
    entries: VecDeque<TrackId>,
}

impl RecentPlayWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(MAX_REPEAT_WINDOW)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pushes `track_id`, evicting the oldest entries beyond capacity.
    pub fn record(&mut self, track_id: TrackId) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_back(track_id);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn contains(&self, track_id: TrackId) -> bool {
        self.entries.contains(&track_id)
    }

    /// Oldest first.
    pub fn window(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.entries.iter().copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
