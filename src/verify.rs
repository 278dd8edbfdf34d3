//! Exact subgraph matching over the candidates produced by the index.
//!
//! An embedding maps every query vertex to a distinct target vertex with the
//! same label, such that every query edge is also a target edge. Extra target
//! edges are allowed.

use std::collections::BTreeSet;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::graph::{Graph, GraphsDb};
use crate::matching::GraphMatch;

/// Outcome of verifying a set of candidate graphs.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct VerificationReport {
    /// Graphs holding at least one embedding, sorted.
    pub matched: Vec<u32>,
    /// Embeddings per matched graph, in the order of `matched`.
    pub embeddings: Vec<u64>,
    /// Candidate graphs that were checked.
    pub num_candidates: usize,
}

impl VerificationReport {
    pub fn total_embeddings(&self) -> u64 {
        self.embeddings.iter().sum()
    }
}

struct Search<'a> {
    query: &'a Graph,
    target: &'a Graph,
    candidates: &'a [BTreeSet<u32>],
    /// Query vertices, fewest candidates first.
    plan: Vec<u32>,
    mapping: Vec<Option<u32>>,
    used: Vec<bool>,
    found: u64,
    limit: Option<u64>,
}

impl Search<'_> {
    fn feasible(&self, q: u32, t: u32) -> bool {
        if self.used[t as usize] || self.query.label(q) != self.target.label(t) {
            return false;
        }
        self.mapping.iter().enumerate().all(|(p, m)| match *m {
            None => true,
            Some(pt) => {
                let p = p as u32;
                (!self.query.has_edge(q, p) || self.target.has_edge(t, pt))
                    && (!self.query.has_edge(p, q) || self.target.has_edge(pt, t))
            }
        }) && (!self.query.has_edge(q, q) || self.target.has_edge(t, t))
    }

    fn done(&self) -> bool {
        self.limit.is_some_and(|l| self.found >= l)
    }

    fn extend(&mut self, depth: usize) {
        if depth == self.plan.len() {
            self.found += 1;
            return;
        }
        let q = self.plan[depth];
        let candidates = self.candidates;
        for &t in &candidates[q as usize] {
            if self.done() {
                return;
            }
            if (t as usize) < self.target.num_vertices() && self.feasible(q, t) {
                self.mapping[q as usize] = Some(t);
                self.used[t as usize] = true;
                self.extend(depth + 1);
                self.used[t as usize] = false;
                self.mapping[q as usize] = None;
            }
        }
    }
}

/// Number of embeddings of `query` into `target` with every query vertex
/// mapped inside its candidate set, stopping once `limit` is reached.
pub fn count_embeddings(query: &Graph, target: &Graph, candidates: &[BTreeSet<u32>], limit: Option<u64>) -> u64 {
    assert_eq!(candidates.len(), query.num_vertices(), "One candidate set per query vertex");
    if query.num_vertices() == 0 {
        return 1;
    }

    let mut plan: Vec<u32> = (0..query.num_vertices() as u32).collect();
    plan.sort_by_key(|&q| candidates[q as usize].len());

    let mut search = Search {
        query,
        target,
        candidates,
        plan,
        mapping: vec![None; query.num_vertices()],
        used: vec![false; target.num_vertices()],
        found: 0,
        limit,
    };
    search.extend(0);
    search.found
}

/// Verify every match against its graph in `db`, in parallel.
pub fn verify_matches(query: &Graph, db: &GraphsDb, matches: &[GraphMatch], limit: Option<u64>) -> VerificationReport {
    let mut results: Vec<(u32, u64)> = matches
        .par_iter()
        .filter_map(|m| {
            let Some(target) = db.graph(m.graph_id) else {
                warn!("Candidate graph {} is not in the database", m.graph_id);
                return None;
            };
            let candidates: Vec<BTreeSet<u32>> =
                (0..m.num_query_vertices() as u32).map(|q| m.candidates(q).clone()).collect();
            let n = count_embeddings(query, target, &candidates, limit);
            debug!("Graph {}: {} embeddings", m.graph_id, n);
            (n > 0).then_some((m.graph_id, n))
        })
        .collect();
    results.sort_unstable();

    let (matched, embeddings) = results.into_iter().unzip();
    let report = VerificationReport {
        matched,
        embeddings,
        num_candidates: matches.len(),
    };
    info!(
        "Verified {} candidate graphs: {} matched, {} embeddings",
        report.num_candidates,
        report.matched.len(),
        report.total_embeddings()
    );
    report
}
