//! Stored summaries and re-aggregating them over a date range
//!
//! Once a buffer flushes, metrics live in the backing store as [`Summary`] rows whose values
//! are already serialized. The read path hands those rows back through a [`SummarySource`],
//! and a [`Summarizer`] folds them into one number per metric name.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::combine::{Combinator, Sum, Summarized, summarize_matching};

/// Resolution of a stored summary row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryType {
    /// One bucket of the store buffer
    Realtime,
    /// One day
    Daily,
    /// One week
    Weekly,
    /// One month
    Monthly,
    /// One year
    Yearly,
}

impl fmt::Display for SummaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SummaryType::Realtime => "realtime",
            SummaryType::Daily => "daily",
            SummaryType::Weekly => "weekly",
            SummaryType::Monthly => "monthly",
            SummaryType::Yearly => "yearly",
        })
    }
}

/// An immutable row read back from the backing store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    timestamp: i64,
    #[serde(rename = "type")]
    summary_type: SummaryType,
    values: BTreeMap<String, String>,
}

impl Summary {
    /// Create a summary from pre-serialized values
    pub fn new<K, V>(
        timestamp: i64,
        summary_type: SummaryType,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            timestamp,
            summary_type,
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Epoch milliseconds
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Resolution of this row
    pub fn summary_type(&self) -> SummaryType {
        self.summary_type
    }

    /// Serialized values keyed by metric name
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

/// Inclusive range of epoch milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateRange {
    /// First millisecond included
    pub start: i64,
    /// Last millisecond included
    pub end: i64,
}

impl DateRange {
    /// Create a range. `start` and `end` are swapped if given in reverse.
    pub fn new(start: i64, end: i64) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// True if `timestamp` falls inside the range
    pub fn contains(&self, timestamp: i64) -> bool {
        (self.start..=self.end).contains(&timestamp)
    }
}

/// Errors produced while reading or re-aggregating summaries
#[derive(Debug)]
#[non_exhaustive]
pub enum SummaryError {
    /// A stored value is not a number
    InvalidValue {
        /// Metric name
        key: String,
        /// The stored text
        value: String,
    },
    /// The source could not be read
    Source(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for SummaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryError::InvalidValue { key, value } => {
                write!(f, "stored value `{value}` for `{key}` is not a number")
            }
            SummaryError::Source(_) => f.write_str("failed to read summaries"),
        }
    }
}

impl std::error::Error for SummaryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SummaryError::InvalidValue { .. } => None,
            SummaryError::Source(e) => Some(e.as_ref()),
        }
    }
}

/// The read path over the backing store.
pub trait SummarySource {
    /// Summaries for `entity_id` whose timestamp falls within `range`, in any order.
    fn summaries(
        &self,
        entity_id: &str,
        range: DateRange,
    ) -> Result<Box<dyn Iterator<Item = Summary> + '_>, SummaryError>;
}

impl<T: SummarySource + ?Sized> SummarySource for &T {
    fn summaries(
        &self,
        entity_id: &str,
        range: DateRange,
    ) -> Result<Box<dyn Iterator<Item = Summary> + '_>, SummaryError> {
        (**self).summaries(entity_id, range)
    }
}

impl<T: SummarySource + ?Sized> SummarySource for std::sync::Arc<T> {
    fn summaries(
        &self,
        entity_id: &str,
        range: DateRange,
    ) -> Result<Box<dyn Iterator<Item = Summary> + '_>, SummaryError> {
        (**self).summaries(entity_id, range)
    }
}

/// Answers range queries over a [`SummarySource`], combining values with `C`.
///
/// ```
/// use coalesce_core::{DateRange, Number, Summarizer, Summary, SummaryError, SummarySource, SummaryType};
///
/// struct Rows(Vec<Summary>);
///
/// impl SummarySource for Rows {
///     fn summaries(
///         &self,
///         _entity_id: &str,
///         range: DateRange,
///     ) -> Result<Box<dyn Iterator<Item = Summary> + '_>, SummaryError> {
///         Ok(Box::new(self.0.iter().filter(move |s| range.contains(s.timestamp())).cloned()))
///     }
/// }
///
/// let rows = Rows(vec![
///     Summary::new(1, SummaryType::Realtime, [("a", "1")]),
///     Summary::new(2, SummaryType::Realtime, [("a", "2"), ("b", "3")]),
/// ]);
/// let totals = Summarizer::new(rows).range("one", DateRange::new(0, 10)).unwrap();
/// assert_eq!(totals["a"], Number::from(3));
/// assert_eq!(totals["b"], Number::from(3));
/// ```
pub struct Summarizer<S, C = Sum> {
    source: S,
    _strategy: PhantomData<fn() -> C>,
}

impl<S: SummarySource> Summarizer<S> {
    /// Summarize with [`Sum`]
    pub fn new(source: S) -> Self {
        Self::with_strategy(source)
    }
}

impl<S: SummarySource, C: Combinator> Summarizer<S, C> {
    /// Summarize with the strategy `C`
    pub fn with_strategy(source: S) -> Self {
        Self {
            source,
            _strategy: PhantomData,
        }
    }

    /// Combine every field of every summary for `entity_id` in `range`
    pub fn range(&self, entity_id: &str, range: DateRange) -> Result<Summarized, SummaryError> {
        let rows = self.source.summaries(entity_id, range)?;
        summarize_matching::<C>(rows, |_| true)
    }

    /// Like [`Summarizer::range`], restricted to `fields`. Fields with no stored values are
    /// absent from the result.
    pub fn range_fields<'f>(
        &self,
        entity_id: &str,
        fields: impl IntoIterator<Item = &'f str>,
        range: DateRange,
    ) -> Result<Summarized, SummaryError> {
        let wanted: HashSet<&str> = fields.into_iter().collect();
        let rows = self.source.summaries(entity_id, range)?;
        summarize_matching::<C>(rows, |key| wanted.contains(key))
    }

    /// The wrapped source
    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use rstest::rstest;

    use super::*;
    use crate::Number;
    use crate::combine::{Max, summarize, summarize_sum};

    struct Rows(Vec<Summary>);

    impl SummarySource for Rows {
        fn summaries(
            &self,
            _entity_id: &str,
            range: DateRange,
        ) -> Result<Box<dyn Iterator<Item = Summary> + '_>, SummaryError> {
            Ok(Box::new(
                self.0
                    .iter()
                    .filter(move |s| range.contains(s.timestamp()))
                    .cloned(),
            ))
        }
    }

    fn row(timestamp: i64, values: &[(&str, &str)]) -> Summary {
        Summary::new(timestamp, SummaryType::Realtime, values.iter().copied())
    }

    #[rstest]
    #[case(vec![row(1, &[("a", "1")]), row(2, &[("a", "2"), ("b", "3")])])]
    #[case(vec![row(2, &[("a", "2"), ("b", "3")]), row(1, &[("a", "1")])])]
    fn summarize_is_order_independent_for_sum(#[case] rows: Vec<Summary>) {
        let totals = summarize_sum(rows).unwrap();
        check!(totals.len() == 2);
        check!(totals["a"] == Number::from(3));
        check!(totals["b"] == Number::from(3));
    }

    #[test]
    fn summarize_with_other_strategies() {
        let rows = vec![row(1, &[("a", "1")]), row(2, &[("a", "2.5")])];
        let totals = summarize::<Max>(rows).unwrap();
        check!(totals["a"] == Number::from(2.5));
    }

    #[test]
    fn summarize_rejects_non_numbers() {
        let rows = vec![row(1, &[("a", "1")]), row(2, &[("a", "lots")])];
        let_assert!(Err(SummaryError::InvalidValue { key, value }) = summarize_sum(rows));
        check!(key == "a");
        check!(value == "lots");
    }

    #[test]
    fn summarizer_filters_by_range() {
        let summarizer = Summarizer::new(Rows(vec![
            row(1, &[("a", "1")]),
            row(50, &[("a", "10")]),
            row(100, &[("a", "100")]),
        ]));
        let totals = summarizer.range("one", DateRange::new(1, 50)).unwrap();
        check!(totals["a"] == Number::from(11));
    }

    #[test]
    fn range_fields_only_returns_requested_keys() {
        let summarizer = Summarizer::new(Rows(vec![
            row(1, &[("a", "1"), ("b", "2"), ("c", "3")]),
            row(2, &[("a", "4"), ("c", "oops")]),
        ]));
        let totals = summarizer
            .range_fields("one", ["a", "b", "missing"], DateRange::new(0, 10))
            .unwrap();
        check!(totals.len() == 2);
        check!(totals["a"] == Number::from(5));
        check!(totals["b"] == Number::from(2));
    }

    #[test]
    fn summary_type_displays_lowercase() {
        check!(SummaryType::Realtime.to_string() == "realtime");
        check!(SummaryType::Yearly.to_string() == "yearly");
    }

    #[test]
    fn date_range_normalizes_order() {
        let range = DateRange::new(10, 1);
        check!(range == DateRange { start: 1, end: 10 });
        check!(range.contains(10));
        check!(!range.contains(11));
    }
}
