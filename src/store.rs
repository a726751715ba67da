//! Statistics files: one fixed-size record per term, in term-index order.
//!
//! There is no header, version or checksum. A term's record is found by
//! seeking to `term_index * RECORD_SIZE`, so a query only reads the records of
//! its own terms.

use crate::stats::{FeatureStatistics, RECORD_SIZE};
use crate::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Summarize each term's feature values and write the records to `path`.
///
/// `term_features[i]` holds the feature values of term `i`. Returns the
/// statistics that were written.
pub fn write_index_stats<P: AsRef<Path>>(
    path: P,
    term_features: &[Vec<f64>],
) -> Result<Vec<FeatureStatistics>, Error> {
    let stats: Vec<FeatureStatistics> = term_features
        .iter()
        .map(|features| FeatureStatistics::from_features(features))
        .collect();
    write_stats(path, &stats)?;
    Ok(stats)
}

/// Write already computed records to `path`, replacing the file.
pub fn write_stats<P: AsRef<Path>>(path: P, stats: &[FeatureStatistics]) -> Result<(), Error> {
    let path = path.as_ref();
    let mut w = BufWriter::new(File::create(path)?);
    for s in stats {
        s.write_to(&mut w)?;
    }
    w.flush()?;
    tracing::debug!(path = %path.display(), terms = stats.len(), "wrote term statistics");
    Ok(())
}

/// Number of records in a statistics file.
///
/// The file length must be a whole number of records; a partial trailing
/// record is [`Error::TruncatedRecord`] at the start of that record. Lookups
/// through [`read_query_stats`] check only the records they read, so complete
/// records before a torn tail stay readable.
pub fn term_count<P: AsRef<Path>>(path: P) -> Result<usize, Error> {
    let len = std::fs::metadata(path)?.len();
    let record = RECORD_SIZE as u64;
    if len % record != 0 {
        return Err(Error::TruncatedRecord {
            offset: len - len % record,
        });
    }
    Ok((len / record) as usize)
}

/// Read the records of `terms`, in the given order.
pub fn read_query_stats<P: AsRef<Path>>(
    path: P,
    terms: &[usize],
) -> Result<Vec<FeatureStatistics>, Error> {
    let mut r = BufReader::new(File::open(path)?);
    terms
        .iter()
        .map(|&term| FeatureStatistics::read_at(&mut r, term))
        .collect()
}

/// Read every record of a statistics file.
pub fn read_index_stats<P: AsRef<Path>>(path: P) -> Result<Vec<FeatureStatistics>, Error> {
    let path = path.as_ref();
    let count = term_count(path)?;
    let mut r = BufReader::new(File::open(path)?);
    (0..count)
        .map(|_| FeatureStatistics::read_from(&mut r))
        .collect()
}
