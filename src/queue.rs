use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;

use crate::entry::{Entry, UserId};

/// Ordered playback queue for one guild. Insertion order is play order; the
/// owning player is the only mutator.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    entries: VecDeque<Entry>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, entry: Entry) {
        self.entries.push_back(entry);
    }

    /// Put an entry ahead of everything else (used when restoring a
    /// snapshot whose current entry should play first).
    pub fn push_front(&mut self, entry: Entry) {
        self.entries.push_front(entry);
    }

    /// Bulk append. Validation happens before this is called; by the time
    /// entries reach the queue the import is committed as a whole.
    pub fn import_many(&mut self, entries: impl IntoIterator<Item = Entry>) {
        self.entries.extend(entries);
    }

    pub fn peek_head(&self) -> Option<&Entry> {
        self.entries.front()
    }

    pub fn pop_head(&mut self) -> Option<Entry> {
        self.entries.pop_front()
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Entry> {
        self.entries.remove(index)
    }

    /// Drop every entry queued by `requester`; returns how many went away.
    pub fn remove_all_by(&mut self, requester: UserId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.requester_id != Some(requester));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn count_for(&self, requester: UserId) -> usize {
        self.entries
            .iter()
            .filter(|e| e.requester_id == Some(requester))
            .count()
    }

    /// Fisher-Yates over the full remaining sequence.
    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        let n = self.entries.len();
        for i in (1..n).rev() {
            let j = rng.gen_range(0..=i);
            self.entries.swap(i, j);
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Estimated wait before the entry at `position` starts. Sums the
    /// durations of everything strictly before it, plus whatever remains of
    /// the currently playing entry. Unknown durations count as zero, so the
    /// estimate is a floor, not a promise.
    pub fn estimate_time_until(&self, position: usize, current_remaining: Duration) -> Duration {
        let queued: u64 = self
            .entries
            .iter()
            .take(position)
            .map(|e| u64::from(e.duration_seconds))
            .sum();
        current_remaining + Duration::from_secs(queued)
    }
}
