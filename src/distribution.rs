//! Gamma distributions fitted to aggregated term statistics.
//!
//! Fitting is by method of moments: for mean `μ` and variance `σ²`,
//! shape `k = μ² / σ²` and scale `θ = σ² / μ`. The numerics (regularized
//! incomplete gamma functions) come from `statrs`; scoring code only sees the
//! [`TailDistribution`] capability.
//!
//! Past [`NORMAL_SHAPE_LIMIT`] the tail is evaluated on the normal
//! distribution with the same mean and variance. The incomplete gamma
//! evaluation does not terminate in reasonable time for such shapes, which
//! the variance epsilon of [`fit_distribution`] produces routinely.

use crate::stats::FeatureStatistics;
use crate::Error;
use statrs::distribution::{ContinuousCDF, Gamma, Normal};
use statrs::function::erf;

/// Shapes above this are evaluated with the moment-matched normal.
///
/// Gamma skewness is `2 / sqrt(k)`, about `2e-5` here.
pub const NORMAL_SHAPE_LIMIT: f64 = 1e10;

/// Upper-tail queries over a continuous score distribution.
pub trait TailDistribution {
    /// `P(X > x)`.
    fn cdf_complement(&self, x: f64) -> f64;

    /// The score `x` with `P(X > x) = p`, for `p` in `(0, 1]`.
    fn quantile_complement(&self, p: f64) -> Result<f64, Error>;
}

/// A gamma distribution with method-of-moments parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedGamma {
    shape: f64,
    scale: f64,
    tail: Tail,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tail {
    Gamma(Gamma),
    Normal(Normal),
}

impl FittedGamma {
    /// Build from shape `k` and scale `θ`.
    pub fn new(shape: f64, scale: f64) -> Result<Self, Error> {
        let tail = if shape > NORMAL_SHAPE_LIMIT && scale > 0.0 {
            Tail::Normal(Normal::new(shape * scale, shape.sqrt() * scale)?)
        } else {
            Tail::Gamma(Gamma::new(shape, 1.0 / scale)?)
        };
        Ok(Self { shape, scale, tail })
    }

    /// Shape parameter `k`.
    pub fn shape(&self) -> f64 {
        self.shape
    }

    /// Scale parameter `θ`.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Mean `kθ`.
    pub fn mean(&self) -> f64 {
        self.shape * self.scale
    }
}

// `ContinuousCDF::inverse_cdf` stops after 16 bisection steps, which is too
// coarse for cutoff scores; this keeps halving until the bracket stops shrinking.
const MAX_BISECTIONS: usize = 1024;

impl TailDistribution for FittedGamma {
    fn cdf_complement(&self, x: f64) -> f64 {
        match &self.tail {
            Tail::Gamma(gamma) => gamma.sf(x),
            // Scores are non-negative, as under the gamma.
            Tail::Normal(_) if x <= 0.0 => 1.0,
            Tail::Normal(normal) => normal.sf(x),
        }
    }

    fn quantile_complement(&self, p: f64) -> Result<f64, Error> {
        if !(p > 0.0 && p <= 1.0) {
            return Err(Error::InvalidProbability(p));
        }
        if p == 1.0 {
            return Ok(0.0);
        }
        if let Tail::Normal(_) = self.tail {
            let std_dev = self.shape.sqrt() * self.scale;
            let x = self.mean() + std_dev * std::f64::consts::SQRT_2 * erf::erfc_inv(2.0 * p);
            return Ok(x.max(0.0));
        }

        let mut lo = 0.0;
        let mut hi = if self.mean() > 0.0 { self.mean() } else { 1.0 };
        while self.cdf_complement(hi) > p {
            lo = hi;
            hi *= 2.0;
            if !hi.is_finite() {
                return Ok(f64::INFINITY);
            }
        }

        for _ in 0..MAX_BISECTIONS {
            let mid = lo + (hi - lo) / 2.0;
            if mid <= lo || mid >= hi {
                break;
            }
            if self.cdf_complement(mid) > p {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(lo + (hi - lo) / 2.0)
    }
}

/// Fit a gamma distribution to one (usually aggregated) statistic.
///
/// A non-positive variance is replaced by `f64::EPSILON` so the shape stays
/// finite. That substitution is a numerical patch only; the resulting
/// distribution is a near-point mass and says nothing statistically useful.
///
/// A zero expected value has no scale and is rejected with
/// [`Error::ZeroExpectedValue`].
pub fn fit_distribution(stats: &FeatureStatistics) -> Result<FittedGamma, Error> {
    if stats.expected_value == 0.0 {
        return Err(Error::ZeroExpectedValue);
    }
    let variance = if stats.variance <= 0.0 {
        tracing::warn!(
            variance = stats.variance,
            "non-positive variance, substituting machine epsilon"
        );
        f64::EPSILON
    } else {
        stats.variance
    };

    let shape = stats.expected_value.powi(2) / variance;
    let scale = variance / stats.expected_value;
    FittedGamma::new(shape, scale)
}

/// Sum the term statistics, then fit the sum.
pub fn fit_aggregate(term_stats: &[FeatureStatistics]) -> Result<FittedGamma, Error> {
    let query_stats: FeatureStatistics = term_stats.iter().sum();
    fit_distribution(&query_stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn method_of_moments_parameters() {
        let dist = fit_distribution(&FeatureStatistics::new(6.0, 12.0, 10)).unwrap();
        assert_relative_eq!(dist.shape(), 3.0);
        assert_relative_eq!(dist.scale(), 2.0);
        assert_relative_eq!(dist.mean(), 6.0);
    }

    #[test]
    fn aggregate_sums_before_fitting() {
        let terms = [
            FeatureStatistics::new(2.0, 3.0, 4),
            FeatureStatistics::new(4.0, 9.0, 5),
        ];
        let dist = fit_aggregate(&terms).unwrap();
        // mean 6, variance 12
        assert_relative_eq!(dist.shape(), 3.0);
        assert_relative_eq!(dist.scale(), 2.0);
    }

    #[test]
    fn exponential_tail() {
        // shape 1 is exponential with mean θ
        let dist = FittedGamma::new(1.0, 4.0).unwrap();
        assert_relative_eq!(dist.cdf_complement(4.0), (-1.0f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(dist.cdf_complement(0.0), 1.0);
        let x = dist.quantile_complement(0.01).unwrap();
        assert_relative_eq!(x, -4.0 * 0.01f64.ln(), epsilon = 1e-7);
    }

    #[test]
    fn quantile_inverts_tail() {
        let dist = fit_distribution(&FeatureStatistics::new(64.05, 183.8, 1)).unwrap();
        for p in [0.9, 0.5, 1e-3, 1e-6] {
            let x = dist.quantile_complement(p).unwrap();
            assert_relative_eq!(dist.cdf_complement(x), p, max_relative = 1e-9);
        }
    }

    #[test]
    fn quantile_of_whole_mass_is_zero() {
        let dist = FittedGamma::new(2.0, 3.0).unwrap();
        assert_eq!(dist.quantile_complement(1.0).unwrap(), 0.0);
    }

    #[test]
    fn quantile_rejects_out_of_range() {
        let dist = FittedGamma::new(2.0, 3.0).unwrap();
        for p in [0.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                dist.quantile_complement(p),
                Err(Error::InvalidProbability(_))
            ));
        }
    }

    #[test]
    fn zero_variance_gets_epsilon() {
        let dist = fit_distribution(&FeatureStatistics::new(1.0, 0.0, 3)).unwrap();
        assert!(dist.shape().is_finite());
        assert_relative_eq!(dist.shape(), 1.0 / f64::EPSILON);
    }

    #[test]
    fn zero_variance_tail_is_a_step_at_the_mean() {
        let dist = fit_distribution(&FeatureStatistics::new(13.0, 0.0, 200)).unwrap();
        assert!(dist.shape() > NORMAL_SHAPE_LIMIT);
        assert_eq!(dist.cdf_complement(12.0), 1.0);
        assert_relative_eq!(dist.cdf_complement(13.0), 0.5, epsilon = 1e-6);
        assert_eq!(dist.cdf_complement(14.0), 0.0);
        assert_eq!(dist.cdf_complement(-1.0), 1.0);

        for p in [0.9, 0.5, 1e-3, 1e-9] {
            let x = dist.quantile_complement(p).unwrap();
            assert_relative_eq!(x, 13.0, max_relative = 1e-6);
        }
    }

    #[test]
    fn large_shape_normal_tail_matches_moments() {
        // shape 2e10
        let dist = fit_distribution(&FeatureStatistics::new(100.0, 5e-7, 1)).unwrap();
        assert!(dist.shape() > NORMAL_SHAPE_LIMIT);
        let sd = 5e-7f64.sqrt();
        // one standard deviation above the mean leaves ~15.87% of the mass
        assert_relative_eq!(dist.cdf_complement(100.0 + sd), 0.158_655_253_931_457, epsilon = 1e-9);
        let x = dist.quantile_complement(0.158_655_253_931_457).unwrap();
        assert_relative_eq!(x, 100.0 + sd, epsilon = 1e-9);
    }

    #[test]
    fn zero_expected_value_is_an_error() {
        let err = fit_distribution(&FeatureStatistics::new(0.0, 2.0, 3)).unwrap_err();
        assert!(matches!(err, Error::ZeroExpectedValue));
        assert!(matches!(fit_aggregate(&[]), Err(Error::ZeroExpectedValue)));
    }

    #[test]
    fn negative_expected_value_is_rejected_by_numerics() {
        let err = fit_distribution(&FeatureStatistics::new(-2.0, 1.0, 3)).unwrap_err();
        assert!(matches!(err, Error::Distribution(_)));
    }
}
