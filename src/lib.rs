//! `taily`: shard selection from the tail of score distributions.
//!
//! Given per-term score statistics for a whole collection and for each of its
//! shards, estimate how many of a query's top `ntop` results every shard holds,
//! without running the query anywhere:
//! - `stats` summarizes a term's feature values (mean, variance, frequency)
//!   and stores them as fixed 24-byte records.
//! - `distribution` fits a gamma distribution to summed term statistics.
//! - `estimate` approximates how many documents match any / all query terms.
//! - `score` derives the collection-wide cutoff and scores each shard.
//!
//! Scope:
//! - Pure, deterministic numeric computation over caller-provided statistics
//! - Random-access statistics files (`store`) and a JSON collection manifest
//!   (`config`) for callers that keep statistics on disk
//!
//! Non-goals:
//! - Executing queries against shards
//! - Building indexes or extracting feature values from them
//! - Distributing shard requests
//!
//! References:
//! - Aly, Hiemstra & Demeester (2013). "Taily: Shard Selection Using the Tail
//!   of Score Distributions." SIGIR.

pub mod config;
pub mod distribution;
pub mod estimate;
pub mod score;
pub mod stats;
pub mod store;

pub use distribution::{fit_aggregate, fit_distribution, FittedGamma, TailDistribution};
pub use error::Error;
pub use score::{estimate_cutoff, score_above_cutoff, score_shards};
pub use stats::{FeatureStatistics, QueryStatistics, RECORD_SIZE};

mod error {
    /// Errors for shard scoring and statistics I/O.
    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        /// A distribution fit was attempted on statistics with zero expected value.
        #[error("cannot fit a distribution with zero expected value")]
        ZeroExpectedValue,
        /// The query is expected to match no document in the whole collection.
        #[error("no document is expected to match all query terms")]
        NoMatchingDocuments,
        /// A tail probability outside `(0, 1]`.
        #[error("tail probability out of range: {0}")]
        InvalidProbability(f64),
        /// The numerics library rejected the fitted parameters.
        #[error("invalid distribution parameters: {0}")]
        Distribution(#[from] statrs::StatsError),
        /// A statistics record ended early.
        #[error("truncated statistics record at byte {offset}")]
        TruncatedRecord {
            /// Byte offset at which the input ran out.
            offset: u64,
        },
        /// A term index whose record offset overflows the file offset type.
        #[error("term index {term_index} is out of range")]
        TermIndexOutOfRange {
            /// The requested term index.
            term_index: usize,
        },
        /// Reading or writing a statistics or manifest file failed.
        #[error(transparent)]
        Io(#[from] std::io::Error),
        /// A manifest or feature file was not valid JSON for its schema.
        #[error("malformed json: {0}")]
        Json(#[from] serde_json::Error),
    }
}
