//! Per-term score statistics and their fixed-size binary record.
//!
//! A [`FeatureStatistics`] summarizes the feature values (per-document term
//! scores) of one term inside one partition: the full collection or a single
//! shard. Statistics of a multi-term query are approximated by summing the
//! per-term moments; this is what Taily does, not a sum of independent random
//! variables, and the scores depend on it.
//!
//! On disk each record is 24 bytes, native byte order, no header:
//!
//! | offset | field            | type  |
//! |--------|------------------|-------|
//! | 0      | `expected_value` | `f64` |
//! | 8      | `variance`       | `f64` |
//! | 16     | `frequency`      | `i64` |
//!
//! Record `i` of a statistics file lives at byte `i * RECORD_SIZE`.

use crate::Error;
use std::io::{Read, Seek, SeekFrom, Write};
use std::iter::Sum;
use std::ops::Add;

/// Size of one serialized [`FeatureStatistics`] record in bytes.
pub const RECORD_SIZE: usize = 2 * std::mem::size_of::<f64>() + std::mem::size_of::<i64>();

/// Mean, population variance and document frequency of one term's feature values.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct FeatureStatistics {
    /// Sample mean of the feature values.
    pub expected_value: f64,
    /// Population variance (divided by `frequency`, not `frequency - 1`).
    pub variance: f64,
    /// Number of documents carrying the term.
    pub frequency: i64,
}

impl FeatureStatistics {
    /// The additive identity `{0, 0, 0}`, also the statistics of an empty sample.
    pub const ZERO: Self = Self {
        expected_value: 0.0,
        variance: 0.0,
        frequency: 0,
    };

    /// Create statistics from already computed moments.
    pub fn new(expected_value: f64, variance: f64, frequency: i64) -> Self {
        Self {
            expected_value,
            variance,
            frequency,
        }
    }

    /// Summarize a term's feature values.
    ///
    /// Two passes: the mean first, then the squared deviations from it.
    /// An empty input yields [`FeatureStatistics::ZERO`].
    pub fn from_features(features: &[f64]) -> Self {
        if features.is_empty() {
            return Self::ZERO;
        }
        let count = features.len() as f64;
        let expected_value = features.iter().sum::<f64>() / count;
        let variance = features
            .iter()
            .map(|&f| (expected_value - f).powi(2))
            .sum::<f64>()
            / count;
        Self {
            expected_value,
            variance,
            frequency: features.len() as i64,
        }
    }

    /// Encode as one 24-byte record.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..8].copy_from_slice(&self.expected_value.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.variance.to_ne_bytes());
        buf[16..24].copy_from_slice(&self.frequency.to_ne_bytes());
        buf
    }

    /// Decode one 24-byte record.
    pub fn from_bytes(buf: &[u8; RECORD_SIZE]) -> Self {
        let mut f64_bytes = [0u8; 8];
        let mut i64_bytes = [0u8; 8];

        f64_bytes.copy_from_slice(&buf[0..8]);
        let expected_value = f64::from_ne_bytes(f64_bytes);
        f64_bytes.copy_from_slice(&buf[8..16]);
        let variance = f64::from_ne_bytes(f64_bytes);
        i64_bytes.copy_from_slice(&buf[16..24]);
        let frequency = i64::from_ne_bytes(i64_bytes);

        Self {
            expected_value,
            variance,
            frequency,
        }
    }

    /// Write this record at the writer's current position.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), Error> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Read one record from the reader's current position.
    ///
    /// Running out of input mid-record is reported as [`Error::TruncatedRecord`]
    /// with `offset` set to the number of bytes that were available.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        let mut buf = [0u8; RECORD_SIZE];
        let mut filled = 0;
        while filled < RECORD_SIZE {
            match reader.read(&mut buf[filled..]) {
                Ok(0) => return Err(Error::TruncatedRecord { offset: filled as u64 }),
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Self::from_bytes(&buf))
    }

    /// Seek to record `term_index` and read it.
    ///
    /// An index whose byte offset does not fit in a `u64` is
    /// [`Error::TermIndexOutOfRange`].
    pub fn read_at<R: Read + Seek + ?Sized>(reader: &mut R, term_index: usize) -> Result<Self, Error> {
        let offset = u64::try_from(term_index)
            .ok()
            .and_then(|i| i.checked_mul(RECORD_SIZE as u64))
            .ok_or(Error::TermIndexOutOfRange { term_index })?;
        reader.seek(SeekFrom::Start(offset))?;
        Self::read_from(reader).map_err(|e| match e {
            Error::TruncatedRecord { offset: partial } => Error::TruncatedRecord {
                offset: offset.saturating_add(partial),
            },
            other => other,
        })
    }
}

impl Add for FeatureStatistics {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            expected_value: self.expected_value + other.expected_value,
            variance: self.variance + other.variance,
            frequency: self.frequency + other.frequency,
        }
    }
}

impl Sum for FeatureStatistics {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a FeatureStatistics> for FeatureStatistics {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Statistics needed to score one query against one partition.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct QueryStatistics {
    /// One entry per query term, in query-term order.
    pub term_stats: Vec<FeatureStatistics>,
    /// Total number of documents in the partition.
    pub collection_size: i64,
}

impl QueryStatistics {
    /// Bundle term statistics with the partition size.
    pub fn new(term_stats: Vec<FeatureStatistics>, collection_size: i64) -> Self {
        Self {
            term_stats,
            collection_size,
        }
    }

    /// Component-wise sum of all term statistics.
    pub fn aggregate(&self) -> FeatureStatistics {
        self.term_stats.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn record_size_is_24() {
        assert_eq!(RECORD_SIZE, 24);
    }

    #[test]
    fn empty_features_are_zero() {
        assert_eq!(FeatureStatistics::from_features(&[]), FeatureStatistics::ZERO);
    }

    #[test]
    fn population_variance() {
        let stats = FeatureStatistics::from_features(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.frequency, 8);
        assert_relative_eq!(stats.expected_value, 5.0);
        assert_relative_eq!(stats.variance, 4.0);
    }

    #[test]
    fn single_value_has_zero_variance() {
        let stats = FeatureStatistics::from_features(&[9.0]);
        assert_eq!(stats, FeatureStatistics::new(9.0, 0.0, 1));
    }

    #[test]
    fn sum_starts_from_zero() {
        let terms = [
            FeatureStatistics::new(1.5, 0.5, 3),
            FeatureStatistics::new(2.0, 1.0, 4),
        ];
        let total: FeatureStatistics = terms.iter().sum();
        assert_eq!(total, FeatureStatistics::new(3.5, 1.5, 7));
        let none: FeatureStatistics = std::iter::empty::<FeatureStatistics>().sum();
        assert_eq!(none, FeatureStatistics::ZERO);
    }

    #[test]
    fn record_roundtrip_is_bit_exact() {
        let stats = FeatureStatistics::new(0.1 + 0.2, 1.0 / 3.0, 732_226);
        let mut buf = Vec::new();
        stats.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), RECORD_SIZE);

        let back = FeatureStatistics::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back.expected_value.to_bits(), stats.expected_value.to_bits());
        assert_eq!(back.variance.to_bits(), stats.variance.to_bits());
        assert_eq!(back.frequency, stats.frequency);
    }

    #[test]
    fn read_at_seeks_by_term_index() {
        let terms = [
            FeatureStatistics::new(1.0, 2.0, 3),
            FeatureStatistics::new(4.0, 5.0, 6),
            FeatureStatistics::new(7.0, 8.0, 9),
        ];
        let mut buf = Vec::new();
        for t in &terms {
            t.write_to(&mut buf).unwrap();
        }
        let mut cursor = Cursor::new(buf);
        assert_eq!(FeatureStatistics::read_at(&mut cursor, 2).unwrap(), terms[2]);
        assert_eq!(FeatureStatistics::read_at(&mut cursor, 0).unwrap(), terms[0]);
    }

    #[test]
    fn read_past_end_is_truncated() {
        let mut buf = Vec::new();
        FeatureStatistics::new(1.0, 1.0, 1).write_to(&mut buf).unwrap();
        buf.truncate(RECORD_SIZE - 4);
        let mut cursor = Cursor::new(buf);

        match FeatureStatistics::read_at(&mut cursor, 0) {
            Err(Error::TruncatedRecord { offset }) => assert_eq!(offset, 20),
            other => panic!("expected truncated record, got {other:?}"),
        }
        match FeatureStatistics::read_at(&mut cursor, 5) {
            Err(Error::TruncatedRecord { offset }) => assert_eq!(offset, 120),
            other => panic!("expected truncated record, got {other:?}"),
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn huge_term_index_is_out_of_range() {
        let mut buf = Vec::new();
        FeatureStatistics::new(1.0, 2.0, 3).write_to(&mut buf).unwrap();
        FeatureStatistics::new(4.0, 5.0, 6).write_to(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);

        for term_index in [usize::MAX / RECORD_SIZE + 1, usize::MAX] {
            match FeatureStatistics::read_at(&mut cursor, term_index) {
                Err(Error::TermIndexOutOfRange { term_index: t }) => assert_eq!(t, term_index),
                other => panic!("expected out-of-range term, got {other:?}"),
            }
        }
    }

    fn small_stats() -> impl Strategy<Value = FeatureStatistics> {
        (-1000i32..1000, 0i32..1000, 0i64..1_000_000).prop_map(|(e, v, f)| {
            // Quarter steps keep every partial sum exactly representable.
            FeatureStatistics::new(e as f64 / 4.0, v as f64 / 4.0, f)
        })
    }

    proptest! {
        #[test]
        fn from_features_counts_and_averages(values in prop::collection::vec(-1e3f64..1e3, 1..64)) {
            let stats = FeatureStatistics::from_features(&values);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            prop_assert_eq!(stats.frequency, values.len() as i64);
            prop_assert!((stats.expected_value - mean).abs() <= 1e-9 * (1.0 + mean.abs()));
            prop_assert!(stats.variance >= 0.0);
        }

        #[test]
        fn addition_is_commutative_and_associative(a in small_stats(), b in small_stats(), c in small_stats()) {
            prop_assert_eq!(a + b, b + a);
            prop_assert_eq!((a + b) + c, a + (b + c));
        }
    }
}
