/// Deals `items` round-robin into at most `k` buckets. With input sorted by
/// size descending this spreads the largest files across all buckets, which
/// evens out both the count and the total size per bucket. Empty buckets are
/// dropped, so there are never more buckets than items.
pub fn partition<T>(items: Vec<T>, k: usize) -> Vec<Vec<T>> {
    let k = k.max(1);
    let mut buckets = (0..k.min(items.len()))
        .map(|_| Vec::with_capacity(items.len().div_ceil(k)))
        .collect::<Vec<_>>();

    for (position, item) in items.into_iter().enumerate() {
        buckets[position % k].push(item);
    }

    buckets
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::partition;

    fn sizes() -> Vec<u32> {
        vec![1, 2, 3, 4, 5, 6, 7, 8, 100, 110, 120, 130, 140, 150, 160, 170]
    }

    #[test]
    fn partition_4() {
        assert_eq!(
            partition(sizes(), 4),
            vec![
                vec![1, 5, 100, 140],
                vec![2, 6, 110, 150],
                vec![3, 7, 120, 160],
                vec![4, 8, 130, 170],
            ]
        );
    }

    #[test]
    fn partition_3() {
        assert_eq!(
            partition(sizes(), 3),
            vec![
                vec![1, 4, 7, 110, 140, 170],
                vec![2, 5, 8, 120, 150],
                vec![3, 6, 100, 130, 160],
            ]
        );
    }

    #[test]
    fn partition_more_buckets_than_items() {
        assert_eq!(partition(vec![1, 2], 3), vec![vec![1], vec![2]]);
    }

    #[test]
    fn partition_empty() {
        assert_eq!(partition(Vec::<u32>::new(), 4), Vec::<Vec<u32>>::new());
    }

    #[test]
    fn partition_zero_treated_as_one() {
        assert_eq!(partition(vec![1, 2, 3], 0), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn partition_covers_input_exactly_once() {
        let items = (0..97).collect::<Vec<u32>>();
        for k in 1..=20 {
            let buckets = partition(items.clone(), k);
            assert_eq!(buckets.len(), k.min(items.len()));
            assert!(buckets.iter().all(|bucket| !bucket.is_empty()));

            let flattened = buckets.into_iter().flatten().collect::<Vec<_>>();
            assert_eq!(flattened.len(), items.len());
            let unique = flattened.into_iter().collect::<BTreeSet<_>>();
            assert_eq!(unique, items.iter().copied().collect());
        }
    }
}
