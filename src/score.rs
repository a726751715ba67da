//! Taily shard scoring.
//!
//! 1. Fit a gamma distribution to the query's aggregated statistics over the
//!    whole collection and pick the cutoff score `s_c` above which `ntop` of
//!    the documents matching all terms are expected to fall.
//! 2. For every shard, fit the shard's own distribution and take the mass above
//!    `s_c`, times the shard's `all` estimate.
//! 3. Rescale those expectations so they sum to `ntop`.
//!
//! The output is each shard's expected share of the top `ntop` results, in
//! input order. Ties are left for the caller to break.

use crate::distribution::{fit_aggregate, fit_distribution, TailDistribution};
use crate::estimate;
use crate::stats::QueryStatistics;
use crate::Error;

/// Estimate the global cutoff score for the whole collection.
///
/// Returns `0.0` for a query without terms. When `ntop` is at least the
/// number of documents expected to match every term, the whole distribution
/// is above the cutoff and `0.0` is returned as well.
pub fn estimate_cutoff(stats: &QueryStatistics, ntop: usize) -> Result<f64, Error> {
    if stats.term_stats.is_empty() {
        return Ok(0.0);
    }
    let dist = fit_aggregate(&stats.term_stats)?;
    let all = estimate::all(stats);
    if all == 0.0 {
        return Err(Error::NoMatchingDocuments);
    }
    let p_c = (ntop as f64 / all).min(1.0);
    tracing::debug!(all, p_c, "estimating cutoff");
    dist.quantile_complement(p_c)
}

/// Probability that a document of the shard described by `stats` scores
/// strictly above `cutoff`.
///
/// A non-positive cutoff admits every document (`1.0`). A shard whose
/// aggregated mean or variance is zero has no mass to estimate (`0.0`).
pub fn score_above_cutoff(cutoff: f64, stats: &QueryStatistics) -> Result<f64, Error> {
    if cutoff <= 0.0 {
        return Ok(1.0);
    }
    let query_stats = stats.aggregate();
    if query_stats.expected_value == 0.0 || query_stats.variance == 0.0 {
        return Ok(0.0);
    }
    let dist = fit_distribution(&query_stats)?;
    Ok(dist.cdf_complement(cutoff))
}

/// Score shards given the collection-wide and per-shard query statistics.
///
/// - `global_stats`: term statistics for the entire collection
/// - `shard_stats`: term statistics for each shard, same term order
/// - `ntop`: how many top results the caller is shooting for
///
/// The scores are non-negative and sum to `ntop` unless no shard is expected
/// to hold any document above the cutoff, in which case all are `0.0`.
pub fn score_shards(
    global_stats: &QueryStatistics,
    shard_stats: &[QueryStatistics],
    ntop: usize,
) -> Result<Vec<f64>, Error> {
    let shard_all: Vec<f64> = shard_stats.iter().map(estimate::all).collect();
    let global_cutoff = estimate_cutoff(global_stats, ntop)?;
    tracing::debug!(global_cutoff, shards = shard_stats.len(), "scoring shards");

    let shard_coefs = shard_stats
        .iter()
        .zip(&shard_all)
        .enumerate()
        .map(|(shard, (stats, &all))| {
            let coef = score_above_cutoff(global_cutoff, stats)? * all;
            tracing::trace!(shard, all, coef, "shard coefficient");
            Ok::<f64, Error>(coef)
        })
        .collect::<Result<Vec<f64>, Error>>()?;

    let normalization_factor: f64 = shard_coefs.iter().sum();
    tracing::debug!(normalization_factor, "normalizing shard scores");

    let ntop = ntop as f64;
    Ok(shard_coefs
        .into_iter()
        .map(|coef| {
            if normalization_factor > 0.0 {
                coef * ntop / normalization_factor
            } else {
                0.0
            }
        })
        .collect())
}
