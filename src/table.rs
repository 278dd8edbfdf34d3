use std::cmp::min;
use std::ops::Index;

use crate::utils::StructuralHash;

#[derive(Clone, Default)]
struct Entry<T> {
    value: T,
    next: usize,
    occupied: bool,
}

/// Hash-consing arena with chained buckets.
///
/// Values are stored in a flat vector indexed from 1 (cell 0 is a sentry)
/// and chained per bucket. The vector grows on demand up to `2^bits` cells;
/// beyond that, allocation fails instead of panicking.
pub struct Table<T> {
    data: Vec<Entry<T>>,
    limit: usize,

    buckets: Vec<usize>,
    bitmask: u64,

    /// Index of the first *possibly* free (non-occupied) cell.
    min_free: usize,
    /// Number of occupied cells.
    real_size: usize,
}

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table holding at most `2^bits - 1` values.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Storage bits should be in the range 0..=31");

        let mut data = Vec::with_capacity(min(1 << bits, 1 << 10));
        data.push(Entry {
            value: T::default(),
            next: 0,
            occupied: true, // Set 0th cell as occupied (sentry).
        });

        let buckets_bits = min(bits, 16);
        let buckets_size = 1 << buckets_bits;

        Self {
            data,
            limit: 1 << bits,
            buckets: vec![0; buckets_size],
            bitmask: (buckets_size - 1) as u64,
            min_free: 1,
            real_size: 0,
        }
    }

    /// Allocate a new cell in the table and return its index,
    /// or `None` when the table is full.
    pub(crate) fn alloc(&mut self) -> Option<usize> {
        let index = (self.min_free..self.data.len())
            .find(|&i| !self.data[i].occupied)
            .unwrap_or(self.data.len());

        if index >= self.limit {
            return None;
        }
        if index == self.data.len() {
            self.data.push(Entry::default());
        }

        self.data[index].occupied = true;
        self.min_free = index + 1;
        self.real_size += 1;

        Some(index)
    }

    /// Add a new value to the table and return its index.
    pub fn add(&mut self, value: T) -> Option<usize> {
        let index = self.alloc()?;

        self.data[index].value = value;
        self.data[index].next = 0;

        Some(index)
    }
}

impl<T> Table<T> {
    /// Maximum number of cells (including the sentry).
    pub fn capacity(&self) -> usize {
        self.limit
    }
    /// Get the number of occupied cells.
    pub fn real_size(&self) -> usize {
        self.real_size
    }

    /// Get the reference to the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        &self.data[index].value
    }

    /// Check if the cell at the given index is occupied.
    pub fn is_occupied(&self, index: usize) -> bool {
        assert_ne!(index, 0, "Index is 0");
        index < self.data.len() && self.data[index].occupied
    }
    /// Get the index of the next cell.
    pub fn next(&self, index: usize) -> usize {
        assert_ne!(index, 0, "Index is 0");
        self.data[index].next
    }

    /// Iterate over `(index, value)` of all occupied cells.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.data
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, e)| e.occupied)
            .map(|(i, e)| (i, &e.value))
    }

    /// Drop every value for which `keep` returns `false`, relinking the buckets.
    ///
    /// Returns the number of dropped cells.
    pub fn retain(&mut self, mut keep: impl FnMut(usize, &T) -> bool) -> usize {
        let mut dropped = 0;
        for b in 0..self.buckets.len() {
            let mut index = self.buckets[b];
            let mut prev = 0;
            while index != 0 {
                let next = self.data[index].next;
                if keep(index, &self.data[index].value) {
                    if prev == 0 {
                        self.buckets[b] = index;
                    } else {
                        self.data[prev].next = index;
                    }
                    prev = index;
                } else {
                    self.data[index].occupied = false;
                    self.data[index].next = 0;
                    self.min_free = min(self.min_free, index);
                    self.real_size -= 1;
                    dropped += 1;
                }
                index = next;
            }
            if prev == 0 {
                self.buckets[b] = 0;
            } else {
                self.data[prev].next = 0;
            }
        }
        dropped
    }
}

impl<T> Table<T>
where
    T: StructuralHash + Default,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.structural_hash() & self.bitmask) as usize
    }

    /// Put a value into the table and return its index, reusing an equal
    /// value if one is already stored.
    ///
    /// Returns `None` when a new cell is needed but the table is full.
    pub fn put(&mut self, value: T) -> Option<usize>
    where
        T: Eq,
    {
        let bucket_index = self.bucket_index(&value);
        let mut index = self.buckets[bucket_index];

        if index == 0 {
            // Create new value and put it into the bucket.
            let i = self.add(value)?;
            self.buckets[bucket_index] = i;
            return Some(i);
        }

        loop {
            if &value == self.value(index) {
                return Some(index);
            }

            let next = self.next(index);

            if next == 0 {
                // Create new value and append it to the bucket.
                let i = self.add(value)?;
                self.data[index].next = i;
                return Some(i);
            }
            index = next;
        }
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
    struct Item(i32);

    impl StructuralHash for Item {
        fn structural_hash(&self) -> u64 {
            self.0.unsigned_abs() as u64
        }
    }

    #[test]
    fn test_alloc() {
        let mut table = Table::<()>::new(2);
        assert_eq!(table.alloc(), Some(1));
        assert_eq!(table.alloc(), Some(2));
        assert_eq!(table.alloc(), Some(3));
    }

    #[test]
    fn test_alloc_too_much() {
        let mut table = Table::<()>::new(2);
        for _ in 0..3 {
            assert!(table.alloc().is_some());
        }
        assert_eq!(table.alloc(), None);
        assert_eq!(table.real_size(), 3);
    }

    #[test]
    fn test_put_dedup() {
        let mut table = Table::new(4);
        let a = table.put(Item(5)).unwrap();
        let b = table.put(Item(-5)).unwrap();
        let c = table.put(Item(5)).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(table[a], Item(5));
        assert_eq!(table[b], Item(-5));
        // Same hash, so -5 is chained after 5.
        assert_eq!(table.next(a), b);
    }

    #[test]
    fn test_retain_relinks_and_reuses() {
        let mut table = Table::new(4);
        let a = table.put(Item(7)).unwrap();
        let b = table.put(Item(-7)).unwrap();
        let c = table.put(Item(3)).unwrap();

        let dropped = table.retain(|i, _| i != a);
        assert_eq!(dropped, 1);
        assert!(!table.is_occupied(a));
        assert!(table.is_occupied(b));
        assert!(table.is_occupied(c));

        // The chain still finds -7, and the freed cell is reused.
        assert_eq!(table.put(Item(-7)), Some(b));
        assert_eq!(table.put(Item(9)), Some(a));
        assert_eq!(table.iter().count(), 3);
    }
}
