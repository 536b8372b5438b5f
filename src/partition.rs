//! Splitting a query set into per-worker shards.

use serde::Serialize;

use crate::{DorkError, Query, Result};

/// A contiguous block of queries owned by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkShard {
    /// Worker id, equal to the shard's index.
    pub worker_id: usize,
    /// Queries in input order.
    pub queries: Vec<Query>,
}

impl WorkShard {
    /// Returns the number of queries in the shard.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Returns whether the shard has no queries.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Largest accepted worker count.
pub const MAX_WORKERS: i64 = 1024;

/// Checks that `worker_count` lies in `1..=MAX_WORKERS`.
pub fn validate_worker_count(worker_count: i64) -> Result<usize> {
    if !(1..=MAX_WORKERS).contains(&worker_count) {
        return Err(DorkError::InvalidWorkerCount(worker_count));
    }
    usize::try_from(worker_count).map_err(|_| DorkError::InvalidWorkerCount(worker_count))
}

/// Splits `queries` into exactly `worker_count` contiguous shards.
///
/// The first `len % worker_count` shards receive one extra query, so shard
/// sizes never differ by more than one and concatenating the shards in
/// order yields the input sequence. An empty input yields empty shards.
/// Counts outside `1..=MAX_WORKERS` are rejected.
pub fn partition(queries: Vec<Query>, worker_count: i64) -> Result<Vec<WorkShard>> {
    let workers = validate_worker_count(worker_count)?;

    let base = queries.len() / workers;
    let extra = queries.len() % workers;

    let mut remaining = queries.into_iter();
    Ok((0..workers)
        .map(|worker_id| {
            let size = base + usize::from(worker_id < extra);
            WorkShard {
                worker_id,
                queries: remaining.by_ref().take(size).collect(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries(n: usize) -> Vec<Query> {
        (0..n)
            .map(|i| Query::new(format!("q{}", i), "niche", i))
            .collect()
    }

    fn assert_balanced_and_ordered(n: usize, workers: i64) {
        let input = queries(n);
        let shards = partition(input.clone(), workers).unwrap();
        assert_eq!(shards.len(), workers as usize);

        let sizes: Vec<usize> = shards.iter().map(WorkShard::len).collect();
        let max = *sizes.iter().max().unwrap();
        let min = *sizes.iter().min().unwrap();
        assert!(max - min <= 1, "n={} workers={} sizes={:?}", n, workers, sizes);

        let flattened: Vec<Query> = shards.into_iter().flat_map(|s| s.queries).collect();
        assert_eq!(flattened, input);
    }

    #[test]
    fn test_partition_balanced_for_many_shapes() {
        for n in 1..=25 {
            for workers in 1..=8 {
                assert_balanced_and_ordered(n, workers);
            }
        }
    }

    #[test]
    fn test_partition_ten_over_four() {
        let shards = partition(queries(10), 4).unwrap();
        let sizes: Vec<usize> = shards.iter().map(WorkShard::len).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
        assert_eq!(shards[1].queries[0].text, "q3");
    }

    #[test]
    fn test_partition_worker_ids_follow_shard_index() {
        let shards = partition(queries(5), 3).unwrap();
        for (i, shard) in shards.iter().enumerate() {
            assert_eq!(shard.worker_id, i);
        }
    }

    #[test]
    fn test_partition_more_workers_than_queries() {
        let shards = partition(queries(2), 5).unwrap();
        assert_eq!(shards.len(), 5);
        assert_eq!(shards.iter().filter(|s| s.is_empty()).count(), 3);
    }

    #[test]
    fn test_partition_empty_input() {
        let shards = partition(Vec::new(), 3).unwrap();
        assert_eq!(shards.len(), 3);
        assert!(shards.iter().all(WorkShard::is_empty));
    }

    #[test]
    fn test_partition_rejects_non_positive_worker_count() {
        for workers in [0, -1, i64::MIN] {
            assert!(matches!(
                partition(queries(3), workers),
                Err(DorkError::InvalidWorkerCount(w)) if w == workers
            ));
        }
    }

    #[test]
    fn test_partition_accepts_max_workers() {
        let shards = partition(queries(3), MAX_WORKERS).unwrap();
        assert_eq!(shards.len(), MAX_WORKERS as usize);
        assert_eq!(shards.iter().filter(|s| !s.is_empty()).count(), 3);
    }

    #[test]
    fn test_partition_rejects_worker_count_above_ceiling() {
        for workers in [MAX_WORKERS + 1, 1 << 40, i64::MAX] {
            assert!(matches!(
                partition(queries(3), workers),
                Err(DorkError::InvalidWorkerCount(w)) if w == workers
            ));
        }
    }
}
