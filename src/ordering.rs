//! Mapping between semantic path positions and diagram levels.
//!
//! A tuple has `N` semantic positions: `0..N-1` are path labels (0 is the
//! label farthest from the origin) and `N-1` is the origin vertex. The
//! permutation `order` sends semantic position `i` to physical position
//! `order[i]`, i.e. diagram level `order[i] + 1`.

use std::io::{BufRead, Write};

use log::{debug, info};

use crate::error::{Error, Result};
use crate::io::LineReader;
use crate::mdd::Mdd;
use crate::reference::Ref;
use crate::reorder::ReorderStats;
use crate::types::Level;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VariableOrdering {
    /// Domain size per semantic position.
    bounds: Vec<u32>,
    /// Physical position (0-based) per semantic position.
    order: Vec<usize>,
}

fn check_permutation(order: &[usize], n: usize) -> bool {
    let mut seen = vec![false; n];
    order.len() == n && order.iter().all(|&p| p < n && !std::mem::replace(&mut seen[p], true))
}

impl VariableOrdering {
    /// Create an ordering; without `order`, semantic position `i` sits at level `i + 1`.
    pub fn new(bounds: Vec<u32>, order: Option<Vec<usize>>) -> Result<Self> {
        if bounds.is_empty() {
            return Err(Error::Configuration("at least one level is required".to_string()));
        }
        if let Some(i) = bounds.iter().position(|&b| b == 0) {
            return Err(Error::Configuration(format!("empty domain at position {}", i)));
        }

        let order = match order {
            None => (0..bounds.len()).collect(),
            Some(order) => {
                if !check_permutation(&order, bounds.len()) {
                    return Err(Error::Configuration(format!(
                        "order {:?} is not a permutation of 0..{}",
                        order,
                        bounds.len()
                    )));
                }
                order
            }
        };

        Ok(Self { bounds, order })
    }

    /// Number of levels `N`.
    pub fn size(&self) -> usize {
        self.bounds.len()
    }

    /// Number of label positions, `N - 1`.
    pub fn path_length(&self) -> usize {
        self.bounds.len() - 1
    }

    pub fn bounds(&self) -> &[u32] {
        &self.bounds
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Diagram level of semantic position `i`.
    pub fn level_of(&self, i: usize) -> Level {
        Level::new(self.order[i] as u32 + 1)
    }

    /// Diagram level holding the origin vertex.
    pub fn vertex_level(&self) -> Level {
        self.level_of(self.bounds.len() - 1)
    }

    /// Bounds per diagram level, bottom level first.
    pub fn level_bounds(&self) -> Vec<u32> {
        let mut res = vec![0; self.bounds.len()];
        for (i, &p) in self.order.iter().enumerate() {
            res[p] = self.bounds[i];
        }
        res
    }

    /// Place a labelled path and its origin vertex into a tuple of length `N + 1`.
    ///
    /// `path` lists labels from the most distant vertex down to the origin.
    /// Paths shorter than `N - 1` are left-padded with 0, so the origin's own
    /// label always lands on the last label position. `dest[0]` is not touched.
    pub fn copy_variables(&self, path: &[u32], origin_vertex: u32, dest: &mut [u32]) {
        let len = self.path_length();
        assert!(path.len() <= len, "Path of length {} does not fit {} positions", path.len(), len);
        assert_eq!(dest.len(), self.size() + 1, "Tuple length mismatch");

        let pad = len - path.len();
        for i in 0..len {
            let value = if i < pad { 0 } else { path[i - pad] };
            dest[self.order[i] + 1] = value;
        }
        dest[self.order[len] + 1] = origin_vertex;
    }

    /// Inverse of [`copy_variables`][Self::copy_variables]: padded labels and origin vertex.
    pub fn split_tuple(&self, tuple: &[u32]) -> (Vec<u32>, u32) {
        let len = self.path_length();
        let path = (0..len).map(|i| tuple[self.order[i] + 1]).collect();
        (path, tuple[self.order[len] + 1])
    }

    /// Convert variables listed top level first into an `order` permutation.
    pub fn order_from_sequence(sequence: &[usize]) -> Result<Vec<usize>> {
        let n = sequence.len();
        if !check_permutation(sequence, n) {
            return Err(Error::Configuration(format!(
                "{:?} does not list every variable exactly once",
                sequence
            )));
        }
        let mut order = vec![0; n];
        for (rank, &var) in sequence.iter().enumerate() {
            order[var] = n - 1 - rank;
        }
        Ok(order)
    }

    /// Level permutation for [`Mdd::permute`]: entry `l - 1` is where the
    /// variable now at level `l` must go.
    fn level_targets(&self, new_order: &[usize]) -> Vec<u32> {
        let mut target = vec![0; self.size()];
        for i in 0..self.size() {
            target[self.order[i]] = new_order[i] as u32 + 1;
        }
        target
    }

    /// Switch to `new_order`, moving the levels of `root` accordingly.
    ///
    /// On failure the ordering is unchanged and `root` keeps its meaning.
    pub fn reorder(&mut self, mdd: &Mdd, root: Ref, new_order: &[usize]) -> Result<(Ref, ReorderStats)> {
        if !check_permutation(new_order, self.size()) {
            return Err(Error::Configuration(format!(
                "order {:?} is not a permutation of 0..{}",
                new_order,
                self.size()
            )));
        }

        let target = self.level_targets(new_order);
        debug!("Reordering {:?} -> {:?} (level targets {:?})", self.order, new_order, target);

        let (root, stats) = mdd.permute(root, &target).map_err(|source| Error::ReorderFailure {
            order: new_order.to_vec(),
            source,
        })?;
        self.order = new_order.to_vec();

        info!(
            "Reordered to {:?}: {} swaps, {} -> {} nodes ({:.1}% smaller)",
            self.order,
            stats.swaps,
            stats.initial_size,
            stats.final_size,
            stats.reduction_percent()
        );
        Ok((root, stats))
    }

    /// One `bound order` line per semantic position.
    pub fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for (b, o) in self.bounds.iter().zip(&self.order) {
            writeln!(out, "{} {}", b, o)?;
        }
        Ok(())
    }

    /// Read `n` lines written by [`write`][Self::write].
    pub fn read<R: BufRead>(reader: &mut LineReader<R>, n: usize) -> Result<Self> {
        let mut bounds = Vec::with_capacity(n);
        let mut order = Vec::with_capacity(n);
        for _ in 0..n {
            let fields: Vec<u32> = reader
                .expect_fields(2, "bound and order")
                .map_err(Error::into_corrupt_index)?;
            bounds.push(fields[0]);
            order.push(fields[1] as usize);
        }
        if bounds.len() != order.len() || bounds.len() != n {
            return Err(Error::CorruptIndex(format!(
                "expected {} levels, found {} bounds and {} positions",
                n,
                bounds.len(),
                order.len()
            )));
        }
        VariableOrdering::new(bounds, Some(order)).map_err(|e| Error::CorruptIndex(e.to_string()))
    }
}
