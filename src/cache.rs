//! Direct-mapped computed table for `plus` and `multiply`.
//!
//! Each key maps to exactly one slot and a new result overwrites whatever
//! the slot held. The table only ever holds results whose operands and
//! result are live, so it must be cleared whenever nodes are reclaimed or
//! levels are reshuffled.

use crate::reference::Ref;
use crate::utils::{pair_all, StructuralHash};

/// A memoized binary operation.
///
/// Both operations are commutative; callers put the smaller operand first
/// so that `f + g` and `g + f` share a slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OpKey {
    Plus(Ref, Ref),
    Multiply(Ref, Ref),
}

impl StructuralHash for OpKey {
    fn structural_hash(&self) -> u64 {
        let (tag, f, g) = match *self {
            OpKey::Plus(f, g) => (1, f, g),
            OpKey::Multiply(f, g) => (2, f, g),
        };
        pair_all([tag, f.get() as u64, g.get() as u64])
    }
}

pub struct ComputedTable {
    slots: Vec<Option<(OpKey, Ref)>>,
    mask: u64,
    hits: usize,
    misses: usize,
}

impl ComputedTable {
    /// Table with `2^bits` slots.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Cache bits must be in range 0..=31, got {}", bits);
        let size = 1usize << bits;
        Self {
            slots: vec![None; size],
            mask: (size - 1) as u64,
            hits: 0,
            misses: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    fn slot(&self, key: &OpKey) -> usize {
        (key.structural_hash() & self.mask) as usize
    }

    pub fn get(&mut self, key: &OpKey) -> Option<Ref> {
        match self.slots[self.slot(key)] {
            Some((k, res)) if k == *key => {
                self.hits += 1;
                Some(res)
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: OpKey, res: Ref) {
        let i = self.slot(&key);
        self.slots[i] = Some((key, res));
    }

    /// Forget every result. Counters are kept.
    pub fn clear(&mut self) {
        self.slots.fill(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plus(f: u32, g: u32) -> OpKey {
        OpKey::Plus(Ref::new(f), Ref::new(g))
    }

    #[test]
    fn test_get_after_insert() {
        let mut cache = ComputedTable::new(6);
        assert_eq!(cache.capacity(), 64);

        cache.insert(plus(3, 4), Ref::new(7));
        assert_eq!(cache.get(&plus(3, 4)), Some(Ref::new(7)));
        assert_eq!(cache.get(&plus(4, 3)), None);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_ops_do_not_alias() {
        let mut cache = ComputedTable::new(10);
        let mul = OpKey::Multiply(Ref::new(3), Ref::new(4));

        cache.insert(plus(3, 4), Ref::new(7));
        assert_eq!(cache.get(&mul), None);
        cache.insert(mul, Ref::new(12));
        assert_eq!(cache.get(&mul), Some(Ref::new(12)));
    }

    #[test]
    fn test_single_slot_overwrites() {
        let mut cache = ComputedTable::new(0);
        cache.insert(plus(1, 2), Ref::new(5));
        cache.insert(plus(2, 3), Ref::new(6));
        assert_eq!(cache.get(&plus(1, 2)), None);
        assert_eq!(cache.get(&plus(2, 3)), Some(Ref::new(6)));
    }

    #[test]
    fn test_clear() {
        let mut cache = ComputedTable::new(4);
        cache.insert(plus(1, 2), Ref::new(5));
        cache.clear();
        assert_eq!(cache.get(&plus(1, 2)), None);
    }
}
