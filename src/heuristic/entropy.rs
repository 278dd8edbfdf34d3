use super::{Heuristic, TrialDiagram};

/// Favors projections whose counts are concentrated on few assignments.
///
/// The metric is `Σ p·log2(p)` over the terminal values of the trial, i.e.
/// the negated Shannon entropy of the projected counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntropyHeuristic;

/// `Σ p·log2(p)` of the distribution proportional to `values`.
pub fn negative_entropy(values: &[i64]) -> f64 {
    let total: f64 = values.iter().map(|&v| v as f64).sum();
    if total <= 0.0 {
        return 0.0;
    }
    values
        .iter()
        .filter(|&&v| v > 0)
        .map(|&v| {
            let p = v as f64 / total;
            p * p.log2()
        })
        .sum()
}

impl Heuristic for EntropyHeuristic {
    fn name(&self) -> &'static str {
        "entropy"
    }

    fn compute_metric(&self, trial: &TrialDiagram) -> f64 {
        negative_entropy(&trial.values())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::heuristic::tests::sample_index;
    use crate::heuristic::{OrderingCache, OrderingSearch};

    #[test]
    fn test_negative_entropy() {
        assert_eq!(negative_entropy(&[]), 0.0);
        assert_eq!(negative_entropy(&[7]), 0.0);
        assert!((negative_entropy(&[1, 1]) + 1.0).abs() < 1e-12);
        assert!((negative_entropy(&[1, 1, 1, 1]) + 2.0).abs() < 1e-12);
        // Skewed counts are closer to zero than uniform ones.
        assert!(negative_entropy(&[9, 1]) > negative_entropy(&[5, 5]));
    }

    #[test]
    fn test_vertex_is_never_first() {
        // Projecting on the origin vertex spreads counts over every vertex,
        // which is the least concentrated single-variable projection.
        let index = sample_index();
        let vertex = index.num_levels() - 1;
        let search = OrderingSearch::new(&index);
        let mut cache = OrderingCache::new();

        let vertex_score = search.evaluate(&EntropyHeuristic, &mut cache, &[vertex]).unwrap();
        let label_score = search.evaluate(&EntropyHeuristic, &mut cache, &[0]).unwrap();
        assert!(label_score > vertex_score);

        let seq = EntropyHeuristic.get(&index, &mut OrderingCache::new()).unwrap();
        assert_ne!(seq[0], vertex);
    }

    #[test]
    fn test_deterministic() {
        let index = sample_index();
        let a = EntropyHeuristic.get(&index, &mut OrderingCache::new()).unwrap();
        let b = EntropyHeuristic.get(&index, &mut OrderingCache::new()).unwrap();
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..index.num_levels()).collect::<Vec<_>>());
    }
}
