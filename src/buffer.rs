//! Reusable batch of tuples waiting to be merged into a diagram.
//!
//! Slots are allocated once and recycled across flushes. A tuple and its
//! terminal value are always written together, so they cannot drift apart.

use log::debug;

#[derive(Debug, Clone)]
pub struct Buffer {
    slots: Vec<Vec<u32>>,
    values: Vec<i64>,
    len: usize,
    capacity: usize,
    width: usize,
}

impl Buffer {
    /// Pre-allocate `capacity` slots of `width` entries each.
    pub fn new(capacity: usize, width: usize) -> Self {
        assert!(capacity > 0, "Buffer capacity must be positive");
        Self {
            slots: vec![vec![0; width]; capacity],
            values: vec![0; capacity],
            len: 0,
            capacity,
            width,
        }
    }

    /// Number of tuples currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Nominal capacity; [`push_unbounded`][Buffer::push_unbounded] may exceed it.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    fn next_slot(&mut self) -> usize {
        if self.len == self.slots.len() {
            self.slots.push(vec![0; self.width]);
            self.values.push(0);
        }
        self.len += 1;
        self.len - 1
    }

    /// Fill the next slot in place and store its value.
    ///
    /// Returns `false` once the buffer is full; the caller must then drain it
    /// (see [`DecisionDiagramIndex::insert`][crate::index::DecisionDiagramIndex::insert])
    /// and [`flush`][Buffer::flush] it before pushing again.
    pub fn push_with(&mut self, value: i64, fill: impl FnOnce(&mut [u32])) -> bool {
        let i = self.next_slot();
        fill(&mut self.slots[i]);
        self.values[i] = value;
        !self.is_full()
    }

    /// Copy `tuple` into the next slot. Same contract as [`push_with`][Buffer::push_with].
    pub fn push(&mut self, tuple: &[u32], value: i64) -> bool {
        assert_eq!(tuple.len(), self.width, "Tuple width mismatch");
        self.push_with(value, |slot| slot.copy_from_slice(tuple))
    }

    /// Append a tuple, growing the storage if needed. Never signals fullness.
    pub fn push_unbounded(&mut self, tuple: &[u32], value: i64) {
        assert_eq!(tuple.len(), self.width, "Tuple width mismatch");
        let i = self.next_slot();
        self.slots[i].copy_from_slice(tuple);
        self.values[i] = value;
        if self.len > self.capacity {
            self.capacity = self.len;
        }
    }

    /// Forget the content, keeping the storage.
    pub fn flush(&mut self) {
        debug!("Flushing buffer with {} tuples", self.len);
        self.len = 0;
    }

    pub fn tuples(&self) -> &[Vec<u32>] {
        &self.slots[..self.len]
    }

    pub fn values(&self) -> &[i64] {
        &self.values[..self.len]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u32], i64)> + '_ {
        self.tuples().iter().map(Vec::as_slice).zip(self.values().iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_push_signals_full() {
        let mut buf = Buffer::new(3, 2);
        assert!(buf.push(&[0, 1], 5));
        assert!(buf.push(&[0, 2], 6));
        assert!(!buf.push(&[0, 3], 7));
        assert!(buf.is_full());
        assert_eq!(buf.tuples(), &[vec![0, 1], vec![0, 2], vec![0, 3]]);
        assert_eq!(buf.values(), &[5, 6, 7]);
    }

    #[test]
    fn test_flush_reuses_storage() {
        let mut buf = Buffer::new(2, 3);
        buf.push(&[0, 1, 1], 1);
        buf.push(&[0, 2, 2], 2);
        buf.flush();
        assert!(buf.is_empty());
        assert!(buf.tuples().is_empty());

        assert!(buf.push_with(9, |slot| slot[2] = 4));
        // The slot is reused as is, only the written entry changed.
        assert_eq!(buf.tuples(), &[vec![0, 1, 4]]);
        assert_eq!(buf.values(), &[9]);
        assert_eq!(buf.slots.len(), 2);
    }

    #[test]
    fn test_push_unbounded_grows() {
        let mut buf = Buffer::new(1, 1);
        for i in 0..5 {
            buf.push_unbounded(&[i], i as i64 * 10);
        }
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.capacity(), 5);
        let collected: Vec<_> = buf.iter().map(|(t, v)| (t[0], v)).collect();
        assert_eq!(collected, vec![(0, 0), (1, 10), (2, 20), (3, 30), (4, 40)]);
    }

    #[test]
    #[should_panic(expected = "Tuple width mismatch")]
    fn test_push_wrong_width() {
        let mut buf = Buffer::new(2, 3);
        buf.push(&[1, 2], 1);
    }
}
