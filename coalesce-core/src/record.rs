//! Single-metric ingest events

use serde::{Deserialize, Serialize};

use crate::metric::{Metric, Metrics, RecordType};
use crate::number::Number;

/// A single named measurement for one entity, as produced by an ingest client.
///
/// ```
/// use coalesce_core::{MetricRecord, RecordType};
///
/// let record = MetricRecord::new("host-1", "requests", 3, 1_700_000_000_000, RecordType::Aggregate);
/// let metrics = record.to_metrics();
/// assert_eq!(metrics.get("requests").unwrap().value(), 3.into());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    entity_id: String,
    name: String,
    value: Number,
    timestamp: i64,
    #[serde(rename = "type")]
    record_type: RecordType,
}

impl MetricRecord {
    /// Create a record
    pub fn new(
        entity_id: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Number>,
        timestamp: i64,
        record_type: RecordType,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            name: name.into(),
            value: value.into(),
            timestamp,
            record_type,
        }
    }

    /// The entity this measurement belongs to
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Metric name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Measured value
    pub fn value(&self) -> Number {
        self.value
    }

    /// Epoch milliseconds
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Merge policy
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// A one-entry [`Metrics`] holding this measurement
    pub fn to_metrics(&self) -> Metrics {
        Metrics::new().with(self.name.clone(), Metric::new(self.value, self.record_type))
    }
}
