//! Named measurements and how they merge

use std::collections::BTreeMap;
use std::collections::btree_map::{self, Entry};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::combine::{Combinator, KeepLast, Sum};
use crate::number::Number;

/// How a metric folds in a later value for the same name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// Values add up, e.g. request counts
    Aggregate,
    /// The latest value replaces the previous one, e.g. a gauge
    Absolute,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordType::Aggregate => "aggregate",
            RecordType::Absolute => "absolute",
        })
    }
}

/// A single numeric measurement tagged with its merge policy.
///
/// The record type is fixed at construction, [`Metric::merge`] is the only way to change the
/// value.
///
/// ```
/// use coalesce_core::{Metric, RecordType};
///
/// let mut requests = Metric::aggregate(1);
/// requests.merge(&Metric::aggregate(2));
/// assert_eq!(requests.value(), 3.into());
///
/// let mut temperature = Metric::absolute(21.5);
/// temperature.merge(&Metric::absolute(19.0));
/// assert_eq!(temperature.value(), 19.0.into());
/// assert_eq!(temperature.record_type(), RecordType::Absolute);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "type")]
    record_type: RecordType,
    value: Number,
}

impl Metric {
    /// Create a metric with the given value and merge policy
    pub fn new(value: impl Into<Number>, record_type: RecordType) -> Self {
        Self {
            record_type,
            value: value.into(),
        }
    }

    /// Shorthand for `Metric::new(value, RecordType::Aggregate)`
    pub fn aggregate(value: impl Into<Number>) -> Self {
        Self::new(value, RecordType::Aggregate)
    }

    /// Shorthand for `Metric::new(value, RecordType::Absolute)`
    pub fn absolute(value: impl Into<Number>) -> Self {
        Self::new(value, RecordType::Absolute)
    }

    /// The current value
    pub fn value(&self) -> Number {
        self.value
    }

    /// The merge policy
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Fold a later measurement into this one.
    ///
    /// The policy of `self` decides: aggregate metrics add `incoming`, absolute metrics take
    /// its value. `incoming`'s own policy is ignored.
    pub fn merge(&mut self, incoming: &Metric) -> &mut Self {
        self.value = match self.record_type {
            RecordType::Aggregate => Sum::combine(Some(self.value), incoming.value),
            RecordType::Absolute => KeepLast::combine(Some(self.value), incoming.value),
        };
        self
    }
}

/// The metrics reported for one entity at one instant, keyed by name.
///
/// Iteration and serialization follow name order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metrics {
    inner: BTreeMap<String, Metric>,
}

impl Metrics {
    /// An empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, replacing any metric with the same name
    pub fn with(mut self, name: impl Into<String>, metric: Metric) -> Self {
        self.insert(name, metric);
        self
    }

    /// Insert `metric` under `name`, returning the metric it replaced
    pub fn insert(&mut self, name: impl Into<String>, metric: Metric) -> Option<Metric> {
        self.inner.insert(name.into(), metric)
    }

    /// Look up a metric by name
    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.inner.get(name)
    }

    /// Number of distinct metric names
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when no metrics are present
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate metrics in name order
    pub fn iter(&self) -> btree_map::Iter<'_, String, Metric> {
        self.inner.iter()
    }

    /// Merge `other` into `self` and return `self`.
    ///
    /// Names present in both are merged with [`Metric::merge`] (the receiver's metric is the
    /// earlier one), names present in only one side are kept as they are.
    ///
    /// ```
    /// use coalesce_core::{Metric, Metrics};
    ///
    /// let mut a = Metrics::new().with("hits", Metric::aggregate(1));
    /// let b = Metrics::new()
    ///     .with("hits", Metric::aggregate(4))
    ///     .with("load", Metric::absolute(0.5));
    /// a.merge(b);
    /// assert_eq!(a.get("hits").unwrap().value(), 5.into());
    /// assert_eq!(a.len(), 2);
    /// ```
    pub fn merge(&mut self, other: Metrics) -> &mut Self {
        for (name, incoming) in other.inner {
            match self.inner.entry(name) {
                Entry::Occupied(mut existing) => {
                    existing.get_mut().merge(&incoming);
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(incoming);
                }
            }
        }
        self
    }
}

impl FromIterator<(String, Metric)> for Metrics {
    fn from_iter<I: IntoIterator<Item = (String, Metric)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Metrics {
    type Item = (&'a String, &'a Metric);
    type IntoIter = btree_map::Iter<'a, String, Metric>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl IntoIterator for Metrics {
    type Item = (String, Metric);
    type IntoIter = btree_map::IntoIter<String, Metric>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}
