//! Enumeration of the assignments of a diagram.

use crate::mdd::Mdd;
use crate::reference::Ref;
use crate::types::Level;

/// Iterator over `(assignment, value)` pairs with a non-zero value.
///
/// Assignments have length `N + 1` (entry 0 unused) and come out in
/// lexicographic order, top level first. Levels skipped by an edge are
/// expanded over their whole domain.
pub struct Assignments<'a> {
    mdd: &'a Mdd,
    /// Stack of (node, level to assign next, partial assignment).
    stack: Vec<(Ref, Level, Vec<u32>)>,
}

impl<'a> Assignments<'a> {
    pub fn new(mdd: &'a Mdd, root: Ref) -> Self {
        let mut iter = Self { mdd, stack: Vec::new() };
        if !mdd.is_zero(root) {
            let assignment = vec![0; mdd.num_levels() as usize + 1];
            iter.stack.push((root, mdd.top(), assignment));
        }
        iter
    }
}

impl Iterator for Assignments<'_> {
    type Item = (Vec<u32>, i64);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, level, assignment)) = self.stack.pop() {
            let n = self.mdd.node(node);

            let Some(below) = level.down() else {
                // Reached the terminal level.
                return Some((assignment, n.value));
            };

            if n.level == level {
                for &(v, child) in n.children.iter().rev() {
                    let mut a = assignment.clone();
                    a[level.as_usize()] = v;
                    self.stack.push((child, below, a));
                }
            } else {
                // Skipped level: every value leads to the same node.
                for v in (0..self.mdd.bound(level)).rev() {
                    let mut a = assignment.clone();
                    a[level.as_usize()] = v;
                    self.stack.push((node, below, a));
                }
            }
        }
        None
    }
}

impl Mdd {
    /// Returns an iterator over all assignments with a non-zero value.
    pub fn assignments(&self, f: Ref) -> Assignments<'_> {
        Assignments::new(self, f)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::mdd::{Mdd, DONT_CARE};

    #[test]
    fn test_enumerate_sorted() {
        let mdd = Mdd::new(&[3, 3], 10);
        let f = mdd.create_edge(&[vec![0, 2, 1], vec![0, 1, 1], vec![0, 0, 2]], &[1, 2, 3]).unwrap();

        let all: Vec<_> = mdd.assignments(f).collect();
        assert_eq!(
            all,
            vec![(vec![0, 1, 1], 2), (vec![0, 2, 1], 1), (vec![0, 0, 2], 3)]
        );
    }

    #[test]
    fn test_enumerate_expands_skipped_levels() {
        let mdd = Mdd::new(&[2, 3], 10);
        let f = mdd.create_edge(&[vec![0, 1, DONT_CARE]], &[4]).unwrap();

        let all: Vec<_> = mdd.assignments(f).collect();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|(a, v)| a[1] == 1 && *v == 4));
        assert_eq!(all.len() as u64, mdd.cardinality(f).to_string().parse::<u64>().unwrap());
    }

    #[test]
    fn test_enumerate_zero() {
        let mdd = Mdd::new(&[2], 4);
        assert_eq!(mdd.assignments(mdd.zero()).count(), 0);
    }
}
