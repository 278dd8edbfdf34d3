//! Bounded-depth labelled path extraction.
//!
//! A labelled path is the sequence of vertex labels met along a simple path
//! (no repeated vertex), starting at the origin vertex. Paths have at most
//! `max_depth` edges, hence at most `max_depth + 1` labels.
//!
//! # Example
//!
//! ```
//! use grapes_dd::graph::Graph;
//! use grapes_dd::paths::PathSet;
//!
//! // A -> B -> A
//! let mut g = Graph::new(0, "g", vec![1, 2, 1]);
//! g.add_edge(0, 1);
//! g.add_edge(1, 2);
//!
//! let paths = PathSet::extract(&g, 2);
//! // [A], [A,B], [A,B,A], [B], [B,A]
//! assert_eq!(paths.len(), 5);
//! let info = paths.get(&[1]).unwrap();
//! assert_eq!(info.occurrences, 2);
//! assert!(info.origins.contains(&0) && info.origins.contains(&2));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::graph::Graph;

/// Where a labelled path starts and how often it occurs.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PathInfo {
    /// Vertices the path starts from.
    pub origins: BTreeSet<u32>,
    /// Number of occurrences of the path in the whole graph.
    pub occurrences: u32,
}

/// Distinct labelled paths of one graph, origin label first.
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    paths: BTreeMap<Vec<u32>, PathInfo>,
}

impl PathSet {
    /// Paths starting from every vertex, vertices visited grouped by label.
    pub fn extract(graph: &Graph, max_depth: usize) -> Self {
        let starts: Vec<u32> = graph.vertices_by_label().into_values().flatten().collect();
        Self::extract_from(graph, max_depth, starts)
    }

    /// Paths starting from the given vertices only.
    pub fn extract_from(graph: &Graph, max_depth: usize, starts: impl IntoIterator<Item = u32>) -> Self {
        let mut set = Self::default();
        let mut visited = vec![false; graph.num_vertices()];
        let mut labels = Vec::with_capacity(max_depth + 1);
        for v in starts {
            set.visit(graph, v, v, max_depth, &mut visited, &mut labels);
        }
        debug!(
            "Extracted {} distinct paths (depth {}) from graph {}",
            set.paths.len(),
            max_depth,
            graph.id
        );
        set
    }

    fn visit(
        &mut self,
        graph: &Graph,
        origin: u32,
        v: u32,
        depth_left: usize,
        visited: &mut [bool],
        labels: &mut Vec<u32>,
    ) {
        visited[v as usize] = true;
        labels.push(graph.label(v));

        let info = self.paths.entry(labels.clone()).or_default();
        info.origins.insert(origin);
        info.occurrences += 1;

        if depth_left > 0 {
            for &w in graph.neighbors(v) {
                if !visited[w as usize] {
                    self.visit(graph, origin, w, depth_left - 1, visited, labels);
                }
            }
        }

        labels.pop();
        visited[v as usize] = false;
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, path: &[u32]) -> Option<&PathInfo> {
        self.paths.get(path)
    }

    /// Paths in lexicographic order of their labels.
    pub fn iter(&self) -> impl Iterator<Item = (&[u32], &PathInfo)> + '_ {
        self.paths.iter().map(|(p, i)| (p.as_slice(), i))
    }

    /// Number of `(path, origin)` pairs.
    pub fn num_tuples(&self) -> usize {
        self.paths.values().map(|i| i.origins.len()).sum()
    }
}

/// Labels of `path` from the most distant vertex down to the origin.
pub fn distant_first(path: &[u32]) -> Vec<u32> {
    path.iter().rev().copied().collect()
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn chain() -> Graph {
        // A -> B -> A
        let mut g = Graph::new(0, "chain", vec![1, 2, 1]);
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        g
    }

    #[test]
    fn test_extract_chain() {
        let paths = PathSet::extract(&chain(), 2);

        let expected: Vec<(Vec<u32>, Vec<u32>, u32)> = vec![
            (vec![1], vec![0, 2], 2),
            (vec![1, 2], vec![0], 1),
            (vec![1, 2, 1], vec![0], 1),
            (vec![2], vec![1], 1),
            (vec![2, 1], vec![1], 1),
        ];
        let actual: Vec<(Vec<u32>, Vec<u32>, u32)> = paths
            .iter()
            .map(|(p, i)| (p.to_vec(), i.origins.iter().copied().collect(), i.occurrences))
            .collect();
        assert_eq!(actual, expected);
        assert_eq!(paths.num_tuples(), 6);
    }

    #[test]
    fn test_depth_limits_length() {
        let paths = PathSet::extract(&chain(), 1);
        assert!(paths.iter().all(|(p, _)| p.len() <= 2));
        assert!(paths.get(&[1, 2, 1]).is_none());

        let single = PathSet::extract(&chain(), 0);
        assert_eq!(single.len(), 2);
        assert_eq!(single.num_tuples(), 3);
    }

    #[test]
    fn test_simple_paths_only() {
        // Triangle A -> A -> A -> A (back to start).
        let mut g = Graph::new(0, "cycle", vec![1, 1, 1]);
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        g.add_edge(2, 0);
        let paths = PathSet::extract(&g, 5);
        assert_eq!(paths.len(), 3);
        assert_eq!(paths.get(&[1, 1, 1]).unwrap().occurrences, 3);
        assert!(paths.get(&[1, 1, 1, 1]).is_none());
    }

    #[test]
    fn test_occurrences_count_every_route() {
        // Diamond: 0 -> 1, 0 -> 2, both labelled B.
        let mut g = Graph::new(0, "fork", vec![1, 2, 2]);
        g.add_edge(0, 1);
        g.add_edge(0, 2);
        let paths = PathSet::extract_from(&g, 1, [0]);
        let info = paths.get(&[1, 2]).unwrap();
        assert_eq!(info.occurrences, 2);
        assert_eq!(info.origins.len(), 1);
    }

    #[test]
    fn test_distant_first() {
        assert_eq!(distant_first(&[1, 2, 3]), vec![3, 2, 1]);
    }
}
