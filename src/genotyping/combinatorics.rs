/// Iterator over unordered pairs drawn with replacement from an ordered pool.
///
/// For a pool `[a, b, c]` the pairs come out as `(a,a) (a,b) (a,c) (b,b) (b,c) (c,c)`;
/// the order depends only on the order of the pool.
#[derive(Debug, Clone)]
pub struct PairsWithReplacement<'a, T> {
    pool: &'a [T],
    first: usize,
    second: usize,
}

impl<'a, T> Iterator for PairsWithReplacement<'a, T> {
    type Item = (&'a T, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.first >= self.pool.len() {
            return None;
        }
        let pair = (&self.pool[self.first], &self.pool[self.second]);
        self.second += 1;
        if self.second == self.pool.len() {
            self.first += 1;
            self.second = self.first;
        }
        Some(pair)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.pool.len();
        if self.first >= n {
            return (0, Some(0));
        }
        // pairs whose first index is past `first`, plus what is left in the current row
        let tail = n - self.first - 1;
        let remaining = tail * (tail + 1) / 2 + (n - self.second);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for PairsWithReplacement<'_, T> {}

/// Enumerate all 2-combinations with replacement of `pool`, preserving its order.
pub fn pairs_with_replacement<T>(pool: &[T]) -> PairsWithReplacement<'_, T> {
    PairsWithReplacement {
        pool,
        first: 0,
        second: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerates_in_lexicographic_index_order() {
        let pool = [0, 3, 7];
        let pairs: Vec<(i32, i32)> = pairs_with_replacement(&pool)
            .map(|(a, b)| (*a, *b))
            .collect();
        assert_eq!(pairs, vec![(0, 0), (0, 3), (0, 7), (3, 3), (3, 7), (7, 7)]);
    }

    #[test]
    fn count_matches_multiset_coefficient() {
        for n in 0..8usize {
            let pool: Vec<usize> = (0..n).collect();
            let iter = pairs_with_replacement(&pool);
            assert_eq!(iter.len(), n * (n + 1) / 2);
            assert_eq!(iter.count(), n * (n + 1) / 2);
        }
    }

    #[test]
    fn single_element_pool_yields_one_pair() {
        let pool = ["x"];
        let pairs: Vec<_> = pairs_with_replacement(&pool).collect();
        assert_eq!(pairs, vec![(&"x", &"x")]);
    }
}
