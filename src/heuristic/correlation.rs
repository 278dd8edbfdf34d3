use std::collections::BTreeMap;

use log::debug;

use super::{Heuristic, OrderMetric, OrderingCache, OrderingSearch, TrialDiagram};
use crate::error::Result;

/// Places next the variable most associated with the ones already fixed.
///
/// The metric is Cramér's V of the contingency table whose rows are the
/// values of the fixed variables and whose columns are the values of the
/// candidate, cells holding summed counts. The search is seeded with the
/// most associated pair of variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationHeuristic;

/// Cramér's V of `(row key, column, count)` observations.
pub fn cramers_v<'a>(cells: impl IntoIterator<Item = (&'a [u32], u32, i64)>) -> f64 {
    let mut rows: BTreeMap<&[u32], usize> = BTreeMap::new();
    let mut cols: BTreeMap<u32, usize> = BTreeMap::new();
    let mut observed: BTreeMap<(usize, usize), f64> = BTreeMap::new();

    for (row, col, count) in cells {
        let r = rows.len();
        let r = *rows.entry(row).or_insert(r);
        let c = cols.len();
        let c = *cols.entry(col).or_insert(c);
        *observed.entry((r, c)).or_default() += count as f64;
    }

    let k = rows.len().min(cols.len()).saturating_sub(1);
    if k == 0 {
        return 0.0;
    }

    let mut row_sums = vec![0.0; rows.len()];
    let mut col_sums = vec![0.0; cols.len()];
    for (&(r, c), &o) in &observed {
        row_sums[r] += o;
        col_sums[c] += o;
    }
    let n: f64 = row_sums.iter().sum();
    if n <= 0.0 {
        return 0.0;
    }

    let ratio: f64 = observed
        .iter()
        .map(|(&(r, c), &o)| o * o / (row_sums[r] * col_sums[c]))
        .sum();
    let chi2 = (n * (ratio - 1.0)).max(0.0);
    (chi2 / (n * k as f64)).sqrt()
}

impl Heuristic for CorrelationHeuristic {
    fn name(&self) -> &'static str {
        "correlation"
    }

    fn compute_metric(&self, trial: &TrialDiagram) -> f64 {
        let rows: Vec<(Vec<u32>, i64)> = trial.rows().collect();
        cramers_v(
            rows.iter()
                .filter_map(|(values, count)| values.split_last().map(|(&col, row)| (row, col, *count))),
        )
    }

    fn seed(&self, search: &OrderingSearch, cache: &mut OrderingCache) -> Result<Vec<usize>> {
        let vars = search.unbounded_vars();
        let mut best: Option<(usize, OrderMetric)> = None;
        for (i, &a) in vars.iter().enumerate() {
            for &b in &vars[i + 1..] {
                let metric = OrderMetric {
                    variable: b,
                    score: search.evaluate(self, cache, &[a, b])?,
                };
                if best.map_or(true, |(_, m)| metric > m) {
                    best = Some((a, metric));
                }
            }
        }
        Ok(match best {
            Some((a, m)) => {
                debug!("correlation: seeding with ({}, {}), V = {}", a, m.variable, m.score);
                vec![a, m.variable]
            }
            None => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::heuristic::tests::sample_index;

    fn table(cells: &[(u32, u32, i64)]) -> f64 {
        let keys: Vec<[u32; 1]> = cells.iter().map(|&(r, _, _)| [r]).collect();
        cramers_v(keys.iter().zip(cells).map(|(k, &(_, c, n))| (&k[..], c, n)))
    }

    #[test]
    fn test_perfect_association() {
        let v = table(&[(0, 0, 10), (1, 1, 10), (2, 2, 5)]);
        assert!((v - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_independence() {
        let v = table(&[(0, 0, 5), (0, 1, 5), (1, 0, 5), (1, 1, 5)]);
        assert!(v.abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_tables() {
        assert_eq!(table(&[]), 0.0);
        assert_eq!(table(&[(0, 0, 3), (0, 1, 4)]), 0.0);
        assert_eq!(table(&[(0, 2, 3), (1, 2, 4)]), 0.0);
    }

    #[test]
    fn test_partial_association() {
        let v = table(&[(0, 0, 8), (0, 1, 2), (1, 0, 2), (1, 1, 8)]);
        assert!(v > 0.0 && v < 1.0);
        assert!((v - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_seed_is_a_pair() {
        let index = sample_index();
        let search = OrderingSearch::new(&index);
        let mut cache = OrderingCache::new();
        let seed = CorrelationHeuristic.seed(&search, &mut cache).unwrap();
        assert_eq!(seed.len(), 2);
        assert!(seed[0] < seed[1]);

        let n = index.num_levels();
        assert_eq!(cache.len(), n * (n - 1) / 2);
    }

    #[test]
    fn test_deterministic_permutation() {
        let index = sample_index();
        let a = CorrelationHeuristic.get(&index, &mut OrderingCache::new()).unwrap();
        let b = CorrelationHeuristic.get(&index, &mut OrderingCache::new()).unwrap();
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..index.num_levels()).collect::<Vec<_>>());
    }
}
