//! Kernel row cache
//!
//! The solver asks for whole rows of the Q matrix restricted to the active
//! set. Rows are cached with a fill mask so that entries computed while the
//! active set was small are reused after it grows again. Eviction is LRU at
//! row granularity under a byte budget.

use lru::LruCache;
use std::mem;
use std::num::NonZeroUsize;

/// Fewest rows a cache holds regardless of the budget: SMO needs two rows
/// per iteration.
const MIN_ROWS: usize = 2;

struct CachedRow {
    values: Vec<f64>,
    filled: Vec<bool>,
}

impl CachedRow {
    fn new(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
            filled: vec![false; len],
        }
    }
}

/// LRU cache of matrix rows
pub struct KernelCache {
    rows: LruCache<usize, CachedRow>,
    row_len: usize,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a cache for rows of `row_len` entries using at most
    /// `budget_bytes` (but never fewer than two rows)
    pub fn new(row_len: usize, budget_bytes: usize) -> Self {
        let capacity = (budget_bytes / Self::row_bytes(row_len)).max(MIN_ROWS);
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            rows: LruCache::new(capacity),
            row_len,
            hits: 0,
            misses: 0,
        }
    }

    fn row_bytes(row_len: usize) -> usize {
        (row_len * (mem::size_of::<f64>() + mem::size_of::<bool>())).max(1)
    }

    /// Write entry `j` of row `i` into `out[j]` for every `j` in `wanted`
    ///
    /// Entries missing from the cache are obtained from `compute(j)` and
    /// stored. The row becomes the most recently used one.
    pub fn fill_row<F>(&mut self, i: usize, wanted: &[usize], mut compute: F, out: &mut [f64])
    where
        F: FnMut(usize) -> f64,
    {
        let mut row = match self.rows.pop(&i) {
            Some(row) => row,
            None => CachedRow::new(self.row_len),
        };

        for &j in wanted {
            if row.filled[j] {
                self.hits += 1;
            } else {
                row.values[j] = compute(j);
                row.filled[j] = true;
                self.misses += 1;
            }
            out[j] = row.values[j];
        }

        self.rows.put(i, row);
    }

    /// Whether entry `j` of row `i` is cached, without touching LRU order
    #[cfg(test)]
    fn contains(&self, i: usize, j: usize) -> bool {
        self.rows.peek(&i).is_some_and(|row| row.filled[j])
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.rows.cap().get(),
            size: self.rows.len(),
            bytes_used: self.rows.len() * Self::row_bytes(self.row_len),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries served from the cache
    pub hits: u64,
    /// Entries that had to be computed
    pub misses: u64,
    /// Maximum number of rows
    pub capacity: usize,
    /// Rows currently held
    pub size: usize,
    pub bytes_used: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(i: usize, j: usize) -> f64 {
        (i * 10 + j) as f64
    }

    #[test]
    fn test_fill_row_computes_then_hits() {
        let mut cache = KernelCache::new(4, 1 << 20);
        let mut out = vec![0.0; 4];
        let mut calls = 0;

        let counted = |j| {
            calls += 1;
            value(1, j)
        };
        cache.fill_row(1, &[0, 1, 2, 3], counted, &mut out);
        assert_eq!(out, vec![10.0, 11.0, 12.0, 13.0]);
        assert_eq!(calls, 4);

        let mut out = vec![0.0; 4];
        cache.fill_row(1, &[0, 1, 2, 3], |_| panic!("row should be cached"), &mut out);
        assert_eq!(out, vec![10.0, 11.0, 12.0, 13.0]);

        let stats = cache.stats();
        assert_eq!(stats.hits, 4);
        assert_eq!(stats.misses, 4);
    }

    #[test]
    fn test_partial_rows_are_completed() {
        let mut cache = KernelCache::new(5, 1 << 20);
        let mut out = vec![0.0; 5];

        cache.fill_row(0, &[3, 1], |j| value(0, j), &mut out);
        assert!(cache.contains(0, 1));
        assert!(cache.contains(0, 3));
        assert!(!cache.contains(0, 2));

        let mut computed = Vec::new();
        let recorded = |j| {
            computed.push(j);
            value(0, j)
        };
        cache.fill_row(0, &[0, 1, 2, 3, 4], recorded, &mut out);
        assert_eq!(computed, vec![0, 2, 4]);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_only_wanted_entries_written() {
        let mut cache = KernelCache::new(3, 1 << 20);
        let mut out = vec![-1.0; 3];
        cache.fill_row(2, &[1], |j| value(2, j), &mut out);
        assert_eq!(out, vec![-1.0, 21.0, -1.0]);
    }

    #[test]
    fn test_eviction_respects_budget() {
        let row_len = 100;
        let budget = 3 * KernelCache::row_bytes(row_len);
        let mut cache = KernelCache::new(row_len, budget);
        let all: Vec<usize> = (0..row_len).collect();
        let mut out = vec![0.0; row_len];

        for i in 0..10 {
            cache.fill_row(i, &all, |j| value(i, j), &mut out);
            let stats = cache.stats();
            assert!(stats.size <= 3);
            assert!(stats.bytes_used <= budget);
        }

        // Least recently used rows were evicted
        assert!(!cache.contains(0, 0));
        assert!(cache.contains(9, 0));
        assert!(cache.contains(7, 0));
    }

    #[test]
    fn test_minimum_two_rows() {
        let mut cache = KernelCache::new(1000, 1);
        assert_eq!(cache.stats().capacity, 2);

        let mut out = vec![0.0; 1000];
        cache.fill_row(0, &[0], |_| 1.0, &mut out);
        cache.fill_row(1, &[0], |_| 2.0, &mut out);
        assert!(cache.contains(0, 0));
        assert!(cache.contains(1, 0));
    }

    #[test]
    fn test_lru_order_follows_use() {
        let mut cache = KernelCache::new(1, 2 * KernelCache::row_bytes(1));
        let mut out = vec![0.0; 1];

        cache.fill_row(0, &[0], |_| 0.0, &mut out);
        cache.fill_row(1, &[0], |_| 1.0, &mut out);
        // Touch row 0 so row 1 becomes the eviction candidate
        cache.fill_row(0, &[0], |_| 0.0, &mut out);
        cache.fill_row(2, &[0], |_| 2.0, &mut out);

        assert!(cache.contains(0, 0));
        assert!(!cache.contains(1, 0));
        assert!(cache.contains(2, 0));
    }
}
