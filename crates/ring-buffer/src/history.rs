//! Overwrite-Oldest History Ring

/// Bounded history with overwrite-oldest semantics and a single owner.
///
/// Used where one task both writes and reads (the relay loop, the display
/// client), so no synchronization is needed.
#[derive(Debug, Clone)]
pub struct HistoryRing<T> {
    storage: Vec<T>,
    capacity: usize,
    /// Index of the oldest item once the ring has wrapped
    start: usize,
    /// Items pushed since creation or the last clear
    pushed: u64,
}

impl<T> HistoryRing<T> {
    /// Create an empty ring holding at most `capacity` items (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            storage: Vec::with_capacity(capacity),
            capacity,
            start: 0,
            pushed: 0,
        }
    }

    /// Append an item, returning the evicted oldest item when full
    pub fn push(&mut self, item: T) -> Option<T> {
        self.pushed += 1;
        if self.storage.len() < self.capacity {
            self.storage.push(item);
            None
        } else {
            let evicted = std::mem::replace(&mut self.storage[self.start], item);
            self.start = (self.start + 1) % self.capacity;
            Some(evicted)
        }
    }

    /// Append every item of an iterator in order
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) {
        for item in items {
            self.push(item);
        }
    }

    /// Items oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (newer, older) = self.storage.split_at(self.start);
        older.iter().chain(newer.iter())
    }

    /// The last `n` items, oldest to newest
    pub fn last(&self, n: usize) -> impl Iterator<Item = &T> + '_ {
        let skip = self.len() - n.min(self.len());
        self.iter().skip(skip)
    }

    /// Oldest item still held
    pub fn oldest(&self) -> Option<&T> {
        self.iter().next()
    }

    /// Most recent item
    pub fn newest(&self) -> Option<&T> {
        self.iter().next_back()
    }

    /// Number of items held
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the ring holds nothing
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Maximum number of items held
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items pushed since creation or the last clear, including evicted ones
    pub fn pushed(&self) -> u64 {
        self.pushed
    }

    /// Drop every item and reset the push counter
    pub fn clear(&mut self) {
        self.storage.clear();
        self.start = 0;
        self.pushed = 0;
    }
}
