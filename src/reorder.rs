//! Level reordering for multi-valued decision diagrams.
//!
//! # Why ordering matters
//!
//! The size of a decision diagram is highly sensitive to which variable sits
//! at which level. Placing correlated variables next to each other lets more
//! sub-diagrams be shared; separating them can blow the size up.
//!
//! # Adjacent swap
//!
//! Swapping levels `k` and `k + 1` only touches nodes at those two levels.
//! A node at `k + 1` over variable `u` with children `c_x` (at or below `k`,
//! over variable `w`) becomes a node over `w` whose child for `w = y` is a
//! node over `u` with children `c_x|w=y`. Nodes at `k` that are reached
//! without passing through `k + 1` are simply moved up one level. Nodes
//! above `k + 1` are rebuilt with their new children; nodes below `k` are
//! untouched.
//!
//! Nodes are immutable, so the previous root stays valid until garbage
//! collection. This is what lets a failed reordering fall back to the
//! ordering it started from.
//!
//! # Arbitrary permutations
//!
//! [`Mdd::permute`] realizes any permutation of levels with adjacent swaps,
//! placing the variable destined for the top level first, then the next one,
//! and so on (bubble strategy).

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::mdd::{Mdd, MddError};
use crate::reference::Ref;
use crate::types::Level;

/// Statistics collected during reordering.
#[derive(Debug, Clone, Default)]
pub struct ReorderStats {
    /// Number of adjacent swaps performed
    pub swaps: usize,
    /// Initial diagram size (number of internal nodes)
    pub initial_size: usize,
    /// Final diagram size after reordering
    pub final_size: usize,
    /// Largest size seen after any swap
    pub peak_size: usize,
}

impl ReorderStats {
    /// Calculate the size reduction ratio.
    pub fn reduction_ratio(&self) -> f64 {
        if self.initial_size == 0 {
            return 0.0;
        }
        1.0 - (self.final_size as f64 / self.initial_size as f64)
    }

    /// Calculate the percentage reduction.
    pub fn reduction_percent(&self) -> f64 {
        self.reduction_ratio() * 100.0
    }
}

impl Mdd {
    /// Swap the variables at `level` and `level + 1`.
    ///
    /// Returns the new root. On failure, bounds are restored and `root`
    /// still denotes the original function.
    pub fn swap_adjacent(&self, root: Ref, level: Level) -> Result<Ref, MddError> {
        let lower = level;
        let upper = level.up();
        debug!("Swapping adjacent levels {} and {}", lower, upper);

        assert!(!lower.is_terminal(), "Cannot swap the terminal level");
        assert!(upper <= self.top(), "Level {} is above the top level", upper);

        let lower_bound = self.bound(lower);
        let upper_bound = self.bound(upper);
        self.set_bound(lower, upper_bound);
        self.set_bound(upper, lower_bound);
        // Cached results were computed under the old level semantics.
        self.clear_cache();

        let mut memo = HashMap::new();
        let res = self.swap_rec(root, lower, lower_bound, &mut memo);
        if res.is_err() {
            debug!("Swap failed, restoring bounds");
            self.set_bound(lower, lower_bound);
            self.set_bound(upper, upper_bound);
            self.clear_cache();
        }
        res
    }

    fn swap_rec(&self, node: Ref, lower: Level, lower_bound: u32, memo: &mut HashMap<Ref, Ref>) -> Result<Ref, MddError> {
        let n = self.node(node);
        if n.level < lower {
            return Ok(node);
        }
        if let Some(&res) = memo.get(&node) {
            return Ok(res);
        }

        let upper = lower.up();
        let res = if n.level > upper {
            let mut children = Vec::with_capacity(n.children.len());
            for &(v, c) in n.children.iter() {
                children.push((v, self.swap_rec(c, lower, lower_bound, memo)?));
            }
            self.mk_node(n.level, children)?
        } else if n.level == lower {
            // The upper variable was skipped: this node just moves up.
            self.mk_node(upper, n.children.to_vec())?
        } else {
            // Values of the lower variable that lead somewhere.
            let skips = n.children.iter().any(|&(_, c)| self.level(c) < lower);
            let values: Vec<u32> = if skips {
                (0..lower_bound).collect()
            } else {
                let mut set = BTreeSet::new();
                for &(_, c) in n.children.iter() {
                    set.extend(self.node(c).children.iter().map(|&(v, _)| v));
                }
                set.into_iter().collect()
            };

            let mut outer = Vec::with_capacity(values.len());
            for y in values {
                let inner: Vec<(u32, Ref)> = n
                    .children
                    .iter()
                    .map(|&(x, c)| (x, self.cofactor(c, lower, y)))
                    .collect();
                outer.push((y, self.mk_node(lower, inner)?));
            }
            self.mk_node(upper, outer)?
        };

        memo.insert(node, res);
        Ok(res)
    }

    /// Move the variable at level `l` to level `target[l - 1]`, for every `l`.
    ///
    /// The previous root is kept alive until the whole permutation has been
    /// realized; on failure the original bounds are restored and the caller
    /// keeps using its original root.
    pub fn permute(&self, root: Ref, target: &[u32]) -> Result<(Ref, ReorderStats), MddError> {
        let n = self.num_levels();

        let mut seen = vec![false; n as usize + 1];
        let valid = target.len() == n as usize
            && target
                .iter()
                .all(|&t| (1..=n).contains(&t) && !std::mem::replace(&mut seen[t as usize], true));
        if !valid {
            return Err(MddError::InvalidPermutation(target.to_vec()));
        }

        let original_bounds = self.bounds();
        let mut stats = ReorderStats {
            initial_size: self.node_count(root),
            ..Default::default()
        };
        stats.peak_size = stats.initial_size;

        // dest[l] = target level of the variable currently at level l
        let mut dest: Vec<u32> = std::iter::once(0).chain(target.iter().copied()).collect();
        let mut current = root;

        for goal in (1..=n).rev() {
            let Some(mut level) = (1..=n).find(|&l| dest[l as usize] == goal) else {
                unreachable!("target was checked to be a permutation");
            };
            while level < goal {
                match self.swap_adjacent(current, Level::new(level)) {
                    Ok(next) => current = next,
                    Err(e) => {
                        debug!("Permutation failed after {} swaps: {}", stats.swaps, e);
                        self.set_bounds(&original_bounds);
                        self.clear_cache();
                        return Err(e);
                    }
                }
                dest.swap(level as usize, level as usize + 1);
                level += 1;
                stats.swaps += 1;
                stats.peak_size = stats.peak_size.max(self.node_count(current));
                self.collect_garbage(&[root, current]);
            }
        }

        stats.final_size = self.node_count(current);
        debug!(
            "Permuted levels with {} swaps: {} -> {} nodes",
            stats.swaps, stats.initial_size, stats.final_size
        );
        Ok((current, stats))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::mdd::DONT_CARE;

    fn sample(mdd: &Mdd) -> Ref {
        let tuples = vec![
            vec![0, 1, 0, 3],
            vec![0, 1, 2, 0],
            vec![0, 0, 2, 1],
            vec![0, 2, 1, 1],
            vec![0, 2, 1, 3],
        ];
        mdd.create_edge(&tuples, &[1, 2, 3, 4, 5]).unwrap()
    }

    /// Value of `f` at an assignment given in the original level order,
    /// after levels were moved according to `target`.
    fn eval_permuted(mdd: &Mdd, f: Ref, original: &[u32], target: &[u32]) -> i64 {
        let mut a = vec![0; original.len()];
        for l in 1..original.len() {
            a[target[l - 1] as usize] = original[l];
        }
        mdd.evaluate(f, &a)
    }

    #[test]
    fn test_swap_preserves_function() {
        let mdd = Mdd::new(&[3, 3, 4], 12);
        let f = sample(&mdd);

        let g = mdd.swap_adjacent(f, Level::new(1)).unwrap();
        assert_eq!(mdd.bounds(), vec![3, 3, 4]);
        assert_eq!(mdd.cardinality(g), mdd.cardinality(f));
        assert_eq!(mdd.evaluate(g, &[0, 0, 1, 3]), 1);
        assert_eq!(mdd.evaluate(g, &[0, 2, 1, 0]), 2);
        assert_eq!(mdd.evaluate(g, &[0, 1, 2, 3]), 5);
    }

    #[test]
    fn test_swap_twice_is_identity() {
        let mdd = Mdd::new(&[3, 3, 4], 12);
        let f = sample(&mdd);

        let g = mdd.swap_adjacent(f, Level::new(2)).unwrap();
        assert_eq!(mdd.bounds(), vec![3, 4, 3]);
        let h = mdd.swap_adjacent(g, Level::new(2)).unwrap();
        assert_eq!(mdd.bounds(), vec![3, 3, 4]);
        assert_eq!(h, f);
    }

    #[test]
    fn test_swap_with_skipped_levels() {
        let mdd = Mdd::new(&[2, 3, 2], 12);
        let f = mdd
            .create_edge(&[vec![0, 1, DONT_CARE, 1], vec![0, 0, 2, 0]], &[7, 9])
            .unwrap();

        let before = mdd.cardinality(f);
        let g = mdd.swap_adjacent(f, Level::new(2)).unwrap();
        assert_eq!(mdd.cardinality(g), before);
        for x in 0..3 {
            // Old level 2 (size 3) is now level 3.
            assert_eq!(mdd.evaluate(g, &[0, 1, 1, x]), 7);
        }
        assert_eq!(mdd.evaluate(g, &[0, 0, 0, 2]), 9);
    }

    #[test]
    fn test_permute() {
        let mdd = Mdd::new(&[3, 3, 4], 12);
        let f = sample(&mdd);
        let target = [3, 1, 2];

        let (g, stats) = mdd.permute(f, &target).unwrap();
        assert_eq!(mdd.bounds(), vec![3, 4, 3]);
        assert_eq!(mdd.cardinality(g), mdd.cardinality(f));
        assert!(stats.swaps > 0);
        assert_eq!(stats.final_size, mdd.node_count(g));

        for (tuple, value) in [([0, 1, 0, 3], 1), ([0, 1, 2, 0], 2), ([0, 2, 1, 3], 5)] {
            assert_eq!(eval_permuted(&mdd, g, &tuple, &target), value);
        }
    }

    #[test]
    fn test_permute_identity() {
        let mdd = Mdd::new(&[3, 3, 4], 12);
        let f = sample(&mdd);
        let (g, stats) = mdd.permute(f, &[1, 2, 3]).unwrap();
        assert_eq!(g, f);
        assert_eq!(stats.swaps, 0);
        assert_eq!(stats.reduction_ratio(), 0.0);
    }

    #[test]
    fn test_permute_rejects_non_permutation() {
        let mdd = Mdd::new(&[3, 3, 4], 12);
        let f = sample(&mdd);
        assert!(matches!(mdd.permute(f, &[1, 1, 2]), Err(MddError::InvalidPermutation(_))));
        assert!(matches!(mdd.permute(f, &[1, 2]), Err(MddError::InvalidPermutation(_))));
    }

    #[test]
    fn test_permute_failure_rolls_back() {
        let mdd = Mdd::new(&[3, 3, 4], 5);
        let f = sample(&mdd);
        mdd.collect_garbage(&[f]);
        let before = mdd.cardinality(f);

        // Not enough room to hold both orderings at once.
        let res = mdd.permute(f, &[3, 2, 1]);
        if res.is_err() {
            assert_eq!(mdd.bounds(), vec![3, 3, 4]);
            mdd.collect_garbage(&[f]);
            assert_eq!(mdd.cardinality(f), before);
            assert_eq!(mdd.evaluate(f, &[0, 2, 1, 3]), 5);
        }
    }
}
