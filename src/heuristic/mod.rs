//! Greedy search for a compact level ordering.
//!
//! The search fixes variables one at a time, from the top level down. For
//! each remaining candidate `v` it builds a small trial diagram over the
//! variables fixed so far plus `v`, filled with the index content projected
//! onto those variables (counts of colliding projections are summed), and
//! scores it with [`Heuristic::compute_metric`]. The candidate with the
//! highest score is fixed next; on ties the earlier candidate stays.
//!
//! Variables are semantic positions: `0..N-1` are path labels, `N-1` is the
//! origin vertex. The result lists them top level first; turn it into a
//! level permutation with [`VariableOrdering::order_from_sequence`].
//!
//! ```no_run
//! use grapes_dd::graph::GraphsDb;
//! use grapes_dd::heuristic::{EntropyHeuristic, Heuristic, OrderingCache};
//! use grapes_dd::index::{DecisionDiagramIndex, IndexConfig};
//! use grapes_dd::ordering::VariableOrdering;
//!
//! # fn main() -> grapes_dd::error::Result<()> {
//! let db = GraphsDb::read("graphs.gff", true)?;
//! let mut index = DecisionDiagramIndex::build(&db, &IndexConfig::default())?;
//!
//! let mut cache = OrderingCache::new();
//! let sequence = EntropyHeuristic.get(&index, &mut cache)?;
//! index.reorder(&VariableOrdering::order_from_sequence(&sequence)?)?;
//! # Ok(())
//! # }
//! ```

pub mod correlation;
pub mod entropy;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use log::{debug, info};

pub use self::correlation::CorrelationHeuristic;
pub use self::entropy::EntropyHeuristic;
use crate::error::{Error, Result};
use crate::index::{DecisionDiagramIndex, IndexStats};
use crate::mdd::Mdd;
use crate::ordering::VariableOrdering;
use crate::reference::Ref;

/// Score of a candidate variable. Compared by score only.
#[derive(Debug, Clone, Copy)]
pub struct OrderMetric {
    pub variable: usize,
    pub score: f64,
}

impl PartialEq for OrderMetric {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}

impl PartialOrd for OrderMetric {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.score.partial_cmp(&other.score)
    }
}

/// Figures recorded for one trial variable sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedTrial {
    pub score: f64,
    /// Internal nodes of the trial diagram.
    pub num_nodes: usize,
}

/// Memo of trial scores, scoped to one search.
#[derive(Debug, Default)]
pub struct OrderingCache {
    entries: BTreeMap<Vec<usize>, CachedTrial>,
    hits: usize,
    misses: usize,
}

impl OrderingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, sequence: &[usize]) -> Option<CachedTrial> {
        let res = self.entries.get(sequence).copied();
        if res.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        res
    }

    pub fn insert(&mut self, sequence: Vec<usize>, trial: CachedTrial) {
        self.entries.insert(sequence, trial);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn hits(&self) -> usize {
        self.hits
    }
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Every scored sequence, in lexicographic order.
    pub fn entries(&self) -> impl Iterator<Item = (&[usize], &CachedTrial)> + '_ {
        self.entries.iter().map(|(s, t)| (s.as_slice(), t))
    }

    /// Highest-scoring sequence among the longest ones scored.
    pub fn best(&self) -> Option<(&[usize], &CachedTrial)> {
        let longest = self.entries.keys().map(Vec::len).max()?;
        let mut best: Option<(&[usize], &CachedTrial)> = None;
        for (s, t) in self.entries() {
            if s.len() == longest && best.map_or(true, |(_, b)| t.score > b.score) {
                best = Some((s, t));
            }
        }
        best
    }
}

/// Diagram over a subset of the variables, first variable on top.
pub struct TrialDiagram {
    mdd: Mdd,
    root: Ref,
    variables: Vec<usize>,
}

impl TrialDiagram {
    pub fn mdd(&self) -> &Mdd {
        &self.mdd
    }
    pub fn root(&self) -> Ref {
        self.root
    }
    /// Variables, top level first.
    pub fn variables(&self) -> &[usize] {
        &self.variables
    }

    /// Non-zero terminal values, one per assignment.
    pub fn values(&self) -> Vec<i64> {
        self.mdd.assignments(self.root).map(|(_, v)| v).collect()
    }

    /// Assignments with values listed in [`variables`][Self::variables] order.
    pub fn rows(&self) -> impl Iterator<Item = (Vec<u32>, i64)> + '_ {
        let k = self.variables.len();
        self.mdd
            .assignments(self.root)
            .map(move |(a, value)| ((0..k).map(|j| a[k - j]).collect(), value))
    }

    pub fn num_nodes(&self) -> usize {
        self.mdd.node_count(self.root)
    }
}

/// One ordering search over a fixed index.
pub struct OrderingSearch {
    /// Index content, one row of semantic values per assignment.
    rows: Vec<(Vec<u32>, i64)>,
    bounds: Vec<u32>,
    storage_bits: usize,
    partial_ordering: Vec<usize>,
    unbounded_vars: Vec<usize>,
}

impl OrderingSearch {
    pub fn new(index: &DecisionDiagramIndex) -> Self {
        let ordering = index.ordering();
        let rows: Vec<(Vec<u32>, i64)> = index
            .assignments()
            .map(|(a, value)| {
                let semantic = ordering.order().iter().map(|&p| a[p + 1]).collect();
                (semantic, value)
            })
            .collect();
        debug!("Ordering search over {} rows", rows.len());

        Self {
            rows,
            bounds: ordering.bounds().to_vec(),
            storage_bits: index.storage_bits(),
            partial_ordering: Vec::new(),
            unbounded_vars: (0..ordering.size()).collect(),
        }
    }

    pub fn num_vars(&self) -> usize {
        self.bounds.len()
    }

    /// Variables fixed so far, top level first.
    pub fn partial_ordering(&self) -> &[usize] {
        &self.partial_ordering
    }

    /// Candidates not fixed yet.
    pub fn unbounded_vars(&self) -> &[usize] {
        &self.unbounded_vars
    }

    /// Project the index content onto `variables` (top level first).
    pub fn trial(&self, variables: &[usize]) -> Result<TrialDiagram> {
        let k = variables.len();
        let level_bounds: Vec<u32> = variables.iter().rev().map(|&v| self.bounds[v]).collect();
        let mdd = Mdd::new(&level_bounds, self.storage_bits);

        let mut projected: BTreeMap<Vec<u32>, i64> = BTreeMap::new();
        for (row, value) in &self.rows {
            let mut tuple = vec![0; k + 1];
            for (j, &v) in variables.iter().enumerate() {
                tuple[k - j] = row[v];
            }
            *projected.entry(tuple).or_default() += value;
        }
        let (tuples, values): (Vec<Vec<u32>>, Vec<i64>) = projected.into_iter().unzip();

        let root = mdd.create_edge(&tuples, &values).map_err(Error::Search)?;
        Ok(TrialDiagram {
            mdd,
            root,
            variables: variables.to_vec(),
        })
    }

    /// Score of `variables`, memoized in `cache`.
    pub fn evaluate<H: Heuristic + ?Sized>(&self, heuristic: &H, cache: &mut OrderingCache, variables: &[usize]) -> Result<f64> {
        if let Some(cached) = cache.get(variables) {
            return Ok(cached.score);
        }
        let trial = self.trial(variables)?;
        let score = heuristic.compute_metric(&trial);
        debug!("{} {:?} -> {}", heuristic.name(), variables, score);
        cache.insert(
            variables.to_vec(),
            CachedTrial {
                score,
                num_nodes: trial.num_nodes(),
            },
        );
        Ok(score)
    }

    fn fix(&mut self, variable: usize) {
        self.unbounded_vars.retain(|&v| v != variable);
        self.partial_ordering.push(variable);
    }

    /// Run the greedy search, returning every variable top level first.
    pub fn run<H: Heuristic + ?Sized>(mut self, heuristic: &H, cache: &mut OrderingCache) -> Result<Vec<usize>> {
        for v in heuristic.seed(&self, cache)? {
            self.fix(v);
        }

        while self.unbounded_vars.len() > 1 {
            let mut best: Option<OrderMetric> = None;
            let mut trial = self.partial_ordering.clone();
            for &v in &self.unbounded_vars {
                trial.push(v);
                let metric = OrderMetric {
                    variable: v,
                    score: self.evaluate(heuristic, cache, &trial)?,
                };
                trial.pop();
                if best.map_or(true, |b| metric > b) {
                    best = Some(metric);
                }
            }
            let Some(best) = best else {
                break;
            };
            debug!("{}: fixing variable {} (score {})", heuristic.name(), best.variable, best.score);
            self.fix(best.variable);
        }

        if let Some(&last) = self.unbounded_vars.first() {
            self.fix(last);
        }
        info!("{} ordering: {:?}", heuristic.name(), self.partial_ordering);
        Ok(self.partial_ordering)
    }
}

/// Scores trial diagrams; higher is better.
pub trait Heuristic {
    fn name(&self) -> &'static str;

    fn compute_metric(&self, trial: &TrialDiagram) -> f64;

    /// Variables to fix, top first, before the greedy loop starts.
    fn seed(&self, _search: &OrderingSearch, _cache: &mut OrderingCache) -> Result<Vec<usize>> {
        Ok(Vec::new())
    }

    /// Variables of `index`, top level first.
    fn get(&self, index: &DecisionDiagramIndex, cache: &mut OrderingCache) -> Result<Vec<usize>> {
        OrderingSearch::new(index).run(self, cache)
    }
}

/// Result of applying one candidate ordering.
#[derive(Debug, Clone)]
pub struct OrderingReport {
    pub name: String,
    pub order: Vec<usize>,
    pub stats: IndexStats,
}

/// Apply every named sequence and its reverse to a copy of `index`.
///
/// The current ordering of `index` is reported first, as `default`.
pub fn evaluate_orderings(index: &DecisionDiagramIndex, sequences: &[(String, Vec<usize>)]) -> Result<Vec<OrderingReport>> {
    let mut reports = vec![OrderingReport {
        name: "default".to_string(),
        order: index.ordering().order().to_vec(),
        stats: index.get_stats(),
    }];

    for (name, sequence) in sequences {
        let reversed: Vec<usize> = sequence.iter().rev().copied().collect();
        for (name, sequence) in [(name.clone(), sequence.clone()), (format!("{}_rev", name), reversed)] {
            let order = VariableOrdering::order_from_sequence(&sequence)?;
            let mut copy = index.try_clone()?;
            copy.reorder(&order)?;
            info!("{}: {:?} -> {} nodes", name, order, copy.get_stats().num_unique_nodes);
            reports.push(OrderingReport {
                name,
                order,
                stats: copy.get_stats(),
            });
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use test_log::test;

    use super::*;
    use crate::encoder::LabelEncoder;
    use crate::graph::GraphsDb;
    use crate::index::IndexConfig;

    pub(super) fn sample_index() -> DecisionDiagramIndex {
        let text = "#g0\n4\nA\nB\nA\nC\n3\n0 1\n1 2\n2 3\n#g1\n3\nB\nA\nA\n2\n0 1\n0 2\n";
        let db = GraphsDb::from_reader(Cursor::new(text), true, LabelEncoder::new()).unwrap();
        let config = IndexConfig {
            max_depth: 2,
            storage_bits: 14,
            ..IndexConfig::default()
        };
        DecisionDiagramIndex::build(&db, &config).unwrap()
    }

    /// Prefers trials with few nodes.
    struct Smallest;

    impl Heuristic for Smallest {
        fn name(&self) -> &'static str {
            "smallest"
        }
        fn compute_metric(&self, trial: &TrialDiagram) -> f64 {
            -(trial.num_nodes() as f64)
        }
    }

    #[test]
    fn test_trial_projects_and_sums() {
        let index = sample_index();
        let search = OrderingSearch::new(&index);
        let vertex = index.num_levels() - 1;
        assert_eq!(search.num_vars(), index.num_levels());

        // Projection on the vertex alone: one row per vertex code, summing counts.
        let trial = search.trial(&[vertex]).unwrap();
        let total: i64 = trial.values().iter().sum();
        let all: i64 = index.assignments().map(|(_, v)| v).sum();
        assert_eq!(total, all);
        assert_eq!(trial.values().len(), index.vertices().size());

        let pair = search.trial(&[vertex, 0]).unwrap();
        assert!(pair.rows().all(|(r, _)| r.len() == 2));
        assert_eq!(pair.values().iter().sum::<i64>(), all);
    }

    #[test]
    fn test_search_returns_permutation() {
        let index = sample_index();
        let mut cache = OrderingCache::new();
        let seq = Smallest.get(&index, &mut cache).unwrap();

        let mut sorted = seq.clone();
        sorted.sort();
        assert_eq!(sorted, (0..index.num_levels()).collect::<Vec<_>>());
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_cache_is_reused() {
        let index = sample_index();
        let mut cache = OrderingCache::new();
        let first = Smallest.get(&index, &mut cache).unwrap();
        let misses = cache.misses();
        let second = Smallest.get(&index, &mut cache).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.misses(), misses);
        assert!(cache.hits() > 0);
    }

    #[test]
    fn test_cache_best() {
        let mut cache = OrderingCache::new();
        assert!(cache.best().is_none());
        cache.insert(vec![0], CachedTrial { score: 9.0, num_nodes: 1 });
        cache.insert(vec![1, 0], CachedTrial { score: 1.0, num_nodes: 3 });
        cache.insert(vec![0, 1], CachedTrial { score: 2.0, num_nodes: 2 });
        let (seq, trial) = cache.best().unwrap();
        assert_eq!(seq, &[0, 1]);
        assert_eq!(trial.num_nodes, 2);
    }

    #[test]
    fn test_order_metric_compares_scores() {
        let a = OrderMetric { variable: 0, score: 1.0 };
        let b = OrderMetric { variable: 5, score: 1.0 };
        let c = OrderMetric { variable: 1, score: 2.0 };
        assert!(a == b);
        assert!(c > a);
    }

    #[test]
    fn test_evaluate_orderings() {
        let index = sample_index();
        let n = index.num_levels();
        let seq: Vec<usize> = (0..n).rev().collect();
        let reports = evaluate_orderings(&index, &[("reverse".to_string(), seq)]).unwrap();

        let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["default", "reverse", "reverse_rev"]);
        for r in &reports {
            assert_eq!(r.stats.cardinality, reports[0].stats.cardinality);
        }
        // Listing 0..n top first puts variable 0 on the top level.
        assert_eq!(reports[2].order, (0..n).rev().collect::<Vec<_>>());
        // The index itself is untouched.
        assert_eq!(index.ordering().order(), (0..n).collect::<Vec<_>>().as_slice());
    }
}
