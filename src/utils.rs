//! Hashing helpers shared by the node table and the operation cache.

/// [Szudzik pairing][szudzik] of `a` and `b`: `b² + a` if `a < b`, else `a² + a + b`.
///
/// Wraps on overflow, so it is injective only while both arguments stay
/// below `2^32`.
///
/// [szudzik]: https://en.wikipedia.org/wiki/Pairing_function#Other_pairing_functions
pub fn pair(a: u64, b: u64) -> u64 {
    if a < b {
        b.wrapping_mul(b).wrapping_add(a)
    } else {
        a.wrapping_mul(a).wrapping_add(a).wrapping_add(b)
    }
}

/// Order-sensitive hash of a sequence, built from [`pair`].
pub fn pair_all(values: impl IntoIterator<Item = u64>) -> u64 {
    values
        .into_iter()
        .fold(0x9e37_79b9_7f4a_7c15, |acc, x| pair(acc.rotate_left(7), x))
}

/// Hash of a value's structure, used to pick a bucket or a cache slot.
pub trait StructuralHash {
    fn structural_hash(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_small_values() {
        // Row a, column b:
        //     0  1  2
        // 0   0  1  4
        // 1   2  3  5
        // 2   6  7  8
        let grid = [[0, 1, 4], [2, 3, 5], [6, 7, 8]];
        for (a, row) in grid.iter().enumerate() {
            for (b, &expected) in row.iter().enumerate() {
                assert_eq!(pair(a as u64, b as u64), expected);
            }
        }
    }

    #[test]
    fn test_pair_wraps() {
        let big = u64::MAX - 1;
        // Must not panic in debug builds.
        let _ = pair(big, 3);
        let _ = pair(3, big);
        let _ = pair_all([big, big, big]);
    }

    #[test]
    fn test_pair_all_is_order_sensitive() {
        assert_ne!(pair_all([1, 2, 3]), pair_all([3, 2, 1]));
        assert_ne!(pair_all([1, 2]), pair_all([1, 2, 0]));
        assert_eq!(pair_all([1, 2, 3]), pair_all(vec![1, 2, 3]));
    }
}
