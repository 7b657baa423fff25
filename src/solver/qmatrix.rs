//! Q matrices of the dual problems
//!
//! The solver never sees feature vectors. It asks a [`QMatrix`] for rows of
//! Q restricted to a set of variable indices, and for the diagonal.

use crate::cache::{CacheStats, KernelCache};
use crate::core::FeatureVector;
use crate::kernel::{Kernel, KernelFunction};

/// Row access to the quadratic term of a dual problem
pub trait QMatrix {
    /// Number of dual variables
    fn len(&self) -> usize;

    /// Q_ii for every variable
    fn diag(&self) -> &[f64];

    /// Write Q_ij into `out[j]` for every `j` in `wanted`
    fn fill_row(&mut self, i: usize, wanted: &[usize], out: &mut [f64]);

    fn cache_stats(&self) -> CacheStats;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Kernel evaluation over a fixed list of training vectors
struct KernelRows<'a> {
    kernel: KernelFunction,
    x: Vec<&'a FeatureVector>,
    norms: Vec<f64>,
}

impl<'a> KernelRows<'a> {
    fn new(kernel: KernelFunction, x: Vec<&'a FeatureVector>) -> Self {
        let norms = if kernel.uses_norms() {
            x.iter().map(|v| v.norm_squared()).collect()
        } else {
            Vec::new()
        };
        Self { kernel, x, norms }
    }

    fn len(&self) -> usize {
        self.x.len()
    }

    fn eval(&self, i: usize, j: usize) -> f64 {
        if self.norms.is_empty() {
            self.kernel.compute(self.x[i], self.x[j])
        } else {
            self.kernel
                .compute_with_norms(self.x[i], self.x[j], self.norms[i], self.norms[j])
        }
    }
}

/// Q_ij = y_i y_j K(x_i, x_j), used by C-SVC and nu-SVC
pub struct SvcQ<'a> {
    rows: KernelRows<'a>,
    y: Vec<f64>,
    cache: KernelCache,
    qd: Vec<f64>,
}

impl<'a> SvcQ<'a> {
    /// `y` holds +1/-1 per vector
    pub fn new(
        kernel: KernelFunction,
        x: Vec<&'a FeatureVector>,
        y: &[f64],
        cache_bytes: usize,
    ) -> Self {
        let rows = KernelRows::new(kernel, x);
        let qd = (0..rows.len()).map(|i| rows.eval(i, i)).collect();
        Self {
            cache: KernelCache::new(rows.len(), cache_bytes),
            rows,
            y: y.to_vec(),
            qd,
        }
    }
}

impl QMatrix for SvcQ<'_> {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn diag(&self) -> &[f64] {
        &self.qd
    }

    fn fill_row(&mut self, i: usize, wanted: &[usize], out: &mut [f64]) {
        let Self { rows, y, cache, .. } = self;
        let yi = y[i];
        cache.fill_row(i, wanted, |j| yi * y[j] * rows.eval(i, j), out);
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Q_ij = K(x_i, x_j), used by one-class SVM
pub struct OneClassQ<'a> {
    rows: KernelRows<'a>,
    cache: KernelCache,
    qd: Vec<f64>,
}

impl<'a> OneClassQ<'a> {
    pub fn new(kernel: KernelFunction, x: Vec<&'a FeatureVector>, cache_bytes: usize) -> Self {
        let rows = KernelRows::new(kernel, x);
        let qd = (0..rows.len()).map(|i| rows.eval(i, i)).collect();
        Self {
            cache: KernelCache::new(rows.len(), cache_bytes),
            rows,
            qd,
        }
    }
}

impl QMatrix for OneClassQ<'_> {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn diag(&self) -> &[f64] {
        &self.qd
    }

    fn fill_row(&mut self, i: usize, wanted: &[usize], out: &mut [f64]) {
        let Self { rows, cache, .. } = self;
        cache.fill_row(i, wanted, |j| rows.eval(i, j), out);
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Q matrix of the regression duals
///
/// Variables k and k + l both refer to training vector k, with signs +1 and
/// -1. The cache holds plain kernel rows over the l training vectors and
/// signed rows are assembled from them.
pub struct SvrQ<'a> {
    rows: KernelRows<'a>,
    sign: Vec<f64>,
    index: Vec<usize>,
    cache: KernelCache,
    qd: Vec<f64>,
    kernel_row: Vec<f64>,
    wanted_real: Vec<usize>,
}

impl<'a> SvrQ<'a> {
    pub fn new(kernel: KernelFunction, x: Vec<&'a FeatureVector>, cache_bytes: usize) -> Self {
        let rows = KernelRows::new(kernel, x);
        let l = rows.len();

        let sign: Vec<f64> = (0..2 * l).map(|k| if k < l { 1.0 } else { -1.0 }).collect();
        let index: Vec<usize> = (0..2 * l).map(|k| k % l.max(1)).collect();
        let qd = index.iter().map(|&k| rows.eval(k, k)).collect();

        Self {
            cache: KernelCache::new(l, cache_bytes),
            rows,
            sign,
            index,
            qd,
            kernel_row: vec![0.0; l],
            wanted_real: Vec::with_capacity(l),
        }
    }
}

impl QMatrix for SvrQ<'_> {
    fn len(&self) -> usize {
        self.sign.len()
    }

    fn diag(&self) -> &[f64] {
        &self.qd
    }

    fn fill_row(&mut self, i: usize, wanted: &[usize], out: &mut [f64]) {
        let Self {
            rows,
            sign,
            index,
            cache,
            kernel_row,
            wanted_real,
            ..
        } = self;

        wanted_real.clear();
        wanted_real.extend(wanted.iter().map(|&k| index[k]));
        wanted_real.sort_unstable();
        wanted_real.dedup();

        let real_i = index[i];
        cache.fill_row(real_i, wanted_real, |j| rows.eval(real_i, j), kernel_row);

        let si = sign[i];
        for &k in wanted {
            out[k] = si * sign[k] * kernel_row[index[k]];
        }
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KernelType;
    use approx::assert_relative_eq;

    fn points() -> Vec<FeatureVector> {
        vec![
            FeatureVector::new(vec![1, 2], vec![1.0, 0.0]),
            FeatureVector::new(vec![1, 2], vec![0.0, 2.0]),
            FeatureVector::new(vec![1], vec![-1.0]),
        ]
    }

    fn linear() -> KernelFunction {
        KernelFunction::new(KernelType::Linear, 3, 0.0, 0.0)
    }

    #[test]
    fn test_svc_q_signs() {
        let x = points();
        let mut q = SvcQ::new(linear(), x.iter().collect(), &[1.0, -1.0, 1.0], 1 << 20);
        let mut out = vec![0.0; 3];
        q.fill_row(0, &[0, 1, 2], &mut out);

        assert_eq!(q.len(), 3);
        assert_eq!(q.diag(), &[1.0, 4.0, 1.0]);
        // K(0,2) = -1 and both labels are +1
        assert_eq!(out, vec![1.0, 0.0, -1.0]);

        q.fill_row(1, &[0, 1, 2], &mut out);
        assert_eq!(out, vec![0.0, 4.0, 0.0]);
    }

    #[test]
    fn test_one_class_q_is_kernel() {
        let x = points();
        let mut q = OneClassQ::new(linear(), x.iter().collect(), 1 << 20);
        let mut out = vec![0.0; 3];
        q.fill_row(2, &[0, 2], &mut out);
        assert_eq!(out[0], -1.0);
        assert_eq!(out[2], 1.0);
    }

    #[test]
    fn test_svr_q_layout() {
        let x = points();
        let mut q = SvrQ::new(linear(), x.iter().collect(), 1 << 20);
        assert_eq!(q.len(), 6);
        assert_eq!(q.diag(), &[1.0, 4.0, 1.0, 1.0, 4.0, 1.0]);

        let all: Vec<usize> = (0..6).collect();
        let mut out = vec![0.0; 6];
        q.fill_row(3, &all, &mut out);
        // Row of variable 3 is -K(0, .) against the first half, K(0, .) against the second
        assert_eq!(out, vec![-1.0, 0.0, 1.0, 1.0, 0.0, -1.0]);

        q.fill_row(0, &[2, 5], &mut out);
        assert_eq!(out[2], -1.0);
        assert_eq!(out[5], 1.0);
    }

    #[test]
    fn test_rbf_rows_use_norms() {
        let x = points();
        let kernel = KernelFunction::new(KernelType::Rbf, 3, 0.5, 0.0);
        let mut q = OneClassQ::new(kernel, x.iter().collect(), 1 << 20);
        let mut out = vec![0.0; 3];
        q.fill_row(0, &[0, 1, 2], &mut out);

        for j in 0..3 {
            assert_relative_eq!(out[j], kernel.compute(&x[0], &x[j]), epsilon = 1e-12);
        }
        assert!(q.cache_stats().misses > 0);
    }
}
