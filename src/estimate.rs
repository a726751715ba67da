//! Match-count estimators.
//!
//! Both treat term occurrences as independent events over the partition's
//! documents. `all` normalizes each term by the `any` estimate rather than by
//! the collection size, which is how the published Taily estimator is defined.
//!
//! References:
//! - Aly, Hiemstra & Demeester (2013). "Taily: Shard Selection Using the Tail
//!   of Score Distributions."

use crate::stats::QueryStatistics;

/// Expected number of documents containing **any** of the query terms.
///
/// `|C| * (1 - Π (1 - df_i / |C|))`. No terms gives `0.0`, as does an empty
/// (or negative-sized) partition.
pub fn any(stats: &QueryStatistics) -> f64 {
    if stats.collection_size <= 0 {
        return 0.0;
    }
    let collection_size = stats.collection_size as f64;
    let none_product: f64 = stats
        .term_stats
        .iter()
        .map(|t| 1.0 - t.frequency as f64 / collection_size)
        .product();
    collection_size * (1.0 - none_product)
}

/// Expected number of documents containing **all** of the query terms.
///
/// `any * Π (df_i / any)`; `0.0` when `any` is zero.
pub fn all(stats: &QueryStatistics) -> f64 {
    let any = any(stats);
    if any == 0.0 {
        return 0.0;
    }
    let all_product: f64 = stats
        .term_stats
        .iter()
        .map(|t| t.frequency as f64 / any)
        .product();
    any * all_product
}
