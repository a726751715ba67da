//! Collection layout: where each partition's statistics file lives and how
//! many documents the partition holds.
//!
//! ```json
//! {
//!   "full": { "stats": "full_index.stats", "size": 30 },
//!   "shards": [
//!     { "stats": "0.stats", "size": 10 },
//!     { "stats": "1.stats", "size": 10 }
//!   ]
//! }
//! ```
//!
//! Relative `stats` paths are resolved against the manifest's directory.

use crate::stats::QueryStatistics;
use crate::store;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One partition: the full collection or a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionEntry {
    /// Statistics file of the partition.
    pub stats: PathBuf,
    /// Number of documents in the partition.
    pub size: i64,
}

impl PartitionEntry {
    /// Read the statistics of `terms` for this partition.
    pub fn query_statistics(&self, terms: &[usize]) -> Result<QueryStatistics, Error> {
        let term_stats = store::read_query_stats(&self.stats, terms)?;
        Ok(QueryStatistics::new(term_stats, self.size))
    }
}

/// The full collection plus its shards, in shard order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionManifest {
    /// Statistics over the whole collection.
    pub full: PartitionEntry,
    /// Per-shard statistics.
    #[serde(default)]
    pub shards: Vec<PartitionEntry>,
}

impl CollectionManifest {
    /// Parse a manifest file, resolving relative paths against its directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut manifest: Self = serde_json::from_str(&text)?;
        if let Some(base) = path.parent() {
            manifest.resolve_relative_to(base);
        }
        tracing::debug!(
            path = %path.display(),
            shards = manifest.shards.len(),
            "loaded collection manifest"
        );
        Ok(manifest)
    }

    /// Rewrite relative `stats` paths as `base.join(stats)`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for entry in std::iter::once(&mut self.full).chain(self.shards.iter_mut()) {
            if entry.stats.is_relative() {
                entry.stats = base.join(&entry.stats);
            }
        }
    }

    /// Assemble the full-collection and per-shard statistics of one query.
    pub fn query_statistics(
        &self,
        terms: &[usize],
    ) -> Result<(QueryStatistics, Vec<QueryStatistics>), Error> {
        let global = self.full.query_statistics(terms)?;
        let shards = self
            .shards
            .iter()
            .map(|shard| shard.query_statistics(terms))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok((global, shards))
    }
}
