//! Thread pool setup and sequential/parallel iteration helpers

use crate::core::{Result, SVMError};
use rayon::prelude::*;

/// Whether independent training units may run on the rayon pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = the current rayon pool (sequential if it has a single thread)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Map `f` over `iter`, keeping the input order in the output
    #[inline]
    pub fn maybe_par_map<T, B, I, F>(self, iter: I, f: F) -> Vec<B>
    where
        T: Send,
        B: Send,
        I: IntoIterator<Item = T> + IntoParallelIterator<Item = T>,
        F: Fn(T) -> B + Sync + Send,
    {
        if self.is_parallel() {
            iter.into_par_iter().map(f).collect()
        } else {
            iter.into_iter().map(f).collect()
        }
    }
}

/// Run a closure with the thread pool selected by `n_threads`
///
/// `0` runs on the current (usually global) pool, `1` runs sequentially and
/// `n > 1` builds a dedicated pool of `n` threads for the duration of `f`.
pub fn run_with_threads<T: Send>(
    n_threads: usize,
    f: impl FnOnce(Parallelism) -> T + Send,
) -> Result<T> {
    let parallelism = Parallelism::from_threads(n_threads);

    if n_threads <= 1 {
        return Ok(f(parallelism));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()
        .map_err(|e| SVMError::InvalidParameters(format!("cannot build thread pool: {e}")))?;
    Ok(pool.install(|| f(Parallelism::Parallel)))
}
