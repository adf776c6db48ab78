//! Distance-decay normalization.
//!
//! Hi-C contact frequency decays with genomic distance. The model is fit
//! once per round from the intra matrix after area normalization: cells are
//! bucketed by bin distance, each sufficiently-populated bucket contributes
//! a trimmed mean, and isotonic smoothing enforces that the curve never
//! increases with distance.

use crate::config::NormParams;
use crate::error::ScafError;
use crate::matrix::IntraMat;
use anyhow::Result;

/// Fitted expected-count curve `E[d]` for `d ∈ [0, r_max]`, plus the global
/// mean normalized count `la` feeding the binomial quality floor.
#[derive(Debug, Clone)]
pub struct NormModel {
    expected: Vec<f64>,
    pub la: f64,
}

impl NormModel {
    /// Largest fitted bin distance.
    pub fn r_max(&self) -> u32 {
        (self.expected.len() - 1) as u32
    }

    /// Expected normalized count at bin distance `d`; 0 beyond the fit.
    pub fn expected_at(&self, d: u32) -> f64 {
        self.expected.get(d as usize).copied().unwrap_or(0.0)
    }

    // Needed by the integration tests in tests/.
    #[doc(hidden)]
    pub fn from_parts(expected: Vec<f64>, la: f64) -> Self {
        Self { expected, la }
    }

    /// Fit the curve from the intra matrix. Signals `NoBands` when fewer
    /// than `params.min_bands` distance buckets hold enough samples.
    pub fn fit(intra: &IntraMat, params: &NormParams) -> Result<Self> {
        let max_d = intra.max_band() as usize;
        let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); max_d];
        intra.for_each_cell(|d, count, denom| {
            if denom > params.eps {
                buckets[d as usize].push(count / denom);
            }
        });

        // Keep the contiguous prefix of buckets with enough samples.
        let mut expected = Vec::new();
        for bucket in &mut buckets {
            if bucket.len() < params.min_samples {
                break;
            }
            expected.push(trimmed_mean(bucket, params.trim_frac));
        }
        if (expected.len() as u32) < params.min_bands {
            return Err(ScafError::NoBands.into());
        }

        pav_non_increasing(&mut expected);

        // Global mean normalized count over the fitted range.
        let mut sum = 0.0f64;
        let mut n = 0u64;
        let r_max = (expected.len() - 1) as u32;
        intra.for_each_cell(|d, count, denom| {
            if d <= r_max && denom > params.eps {
                sum += count / denom;
                n += 1;
            }
        });
        let la = if n > 0 { sum / n as f64 } else { 0.0 };

        Ok(Self { expected, la })
    }
}

/// Mean after trimming `trim_frac` of the samples from each tail.
fn trimmed_mean(samples: &mut [f64], trim_frac: f64) -> f64 {
    samples.sort_unstable_by(|a, b| a.partial_cmp(b).expect("no NaN in norm samples"));
    let mut k = (samples.len() as f64 * trim_frac) as usize;
    if 2 * k >= samples.len() {
        k = 0;
    }
    let kept = &samples[k..samples.len() - k];
    kept.iter().sum::<f64>() / kept.len() as f64
}

/// Pool-adjacent-violators from `d = 0` upward, enforcing
/// `E[d] >= E[d+1]`.
fn pav_non_increasing(values: &mut [f64]) {
    let mut pools: Vec<(f64, usize)> = Vec::with_capacity(values.len());
    for &v in values.iter() {
        pools.push((v, 1));
        while pools.len() > 1 {
            let (last, ln) = pools[pools.len() - 1];
            let (prev, pn) = pools[pools.len() - 2];
            if last > prev {
                pools.pop();
                let n = ln + pn;
                let merged = (last * ln as f64 + prev * pn as f64) / n as f64;
                *pools.last_mut().expect("non-empty pools") = (merged, n);
            } else {
                break;
            }
        }
    }
    let mut i = 0usize;
    for (v, n) in pools {
        for _ in 0..n {
            values[i] = v;
            i += 1;
        }
    }
}

/// Quality floor for a scaffold pair with `n0` flank cells: the `quantile`
/// quantile of `Binomial(n0, la)` as a mean per-cell score, where `la` is
/// the noise baseline of the normalized inter scores. An edge must beat the
/// upper tail of that baseline to be considered at all.
pub fn qla(n0: u32, la: f64, quantile: f64) -> f64 {
    if n0 == 0 {
        return f64::INFINITY;
    }
    qbinom(quantile, n0, la.clamp(0.0, 1.0)) as f64 / n0 as f64
}

/// Smallest `k` with `P(X <= k) >= p` for `X ~ Binomial(n, pr)`.
///
/// Incremental CDF summation; falls back to a normal approximation when the
/// point mass at zero underflows.
pub fn qbinom(p: f64, n: u32, pr: f64) -> u32 {
    if pr <= 0.0 || n == 0 {
        return 0;
    }
    if pr >= 1.0 {
        return n;
    }
    let nf = n as f64;
    let mut pmf = (nf * (1.0 - pr).ln()).exp();
    if pmf == 0.0 {
        let mean = nf * pr;
        let sd = (nf * pr * (1.0 - pr)).sqrt();
        let k = (mean + probit(p) * sd).ceil();
        return (k.max(0.0) as u32).min(n);
    }
    let ratio = pr / (1.0 - pr);
    let mut cdf = pmf;
    let mut k = 0u32;
    while cdf < p && k < n {
        pmf *= (nf - k as f64) / (k as f64 + 1.0) * ratio;
        cdf += pmf;
        k += 1;
    }
    k
}

/// Standard normal quantile (Beasley-Springer-Moro approximation).
fn probit(p: f64) -> f64 {
    const A: [f64; 4] = [2.50662823884, -18.61500062529, 41.39119773534, -25.44106049637];
    const B: [f64; 4] = [-8.47351093090, 23.08336743743, -21.06224101826, 3.13082909833];
    const C: [f64; 9] = [
        0.3374754822726147,
        0.9761690190917186,
        0.1607979714918209,
        0.0276438810333863,
        0.0038405729373609,
        0.0003951896511919,
        0.0000321767881768,
        0.0000002888167364,
        0.0000003960315187,
    ];
    let y = p - 0.5;
    if y.abs() < 0.42 {
        let r = y * y;
        y * (((A[3] * r + A[2]) * r + A[1]) * r + A[0])
            / ((((B[3] * r + B[2]) * r + B[1]) * r + B[0]) * r + 1.0)
    } else {
        let r = if y > 0.0 { 1.0 - p } else { p };
        let r = (-r.ln()).ln();
        let mut x = C[0];
        let mut t = 1.0;
        for c in &C[1..] {
            t *= r;
            x += c * t;
        }
        if y < 0.0 {
            -x
        } else {
            x
        }
    }
}
