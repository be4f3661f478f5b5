//! Transport payload

use serde::{Deserialize, Serialize};

use crate::metric::Metrics;

/// One flushed buffer entry, as handed to a transport.
///
/// `timestamp` is the start of the entry's bucket. Serializes to camelCase fields:
///
/// ```
/// use coalesce_core::{Message, Metric, Metrics};
///
/// let message = Message::new("one", 120_000, Metrics::new().with("hits", Metric::aggregate(2)));
/// assert_eq!(
///     serde_json::to_string(&message).unwrap(),
///     r#"{"entityId":"one","timestamp":120000,"metrics":{"hits":{"type":"aggregate","value":2}}}"#,
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Entity the metrics belong to
    pub entity_id: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Merged metrics
    pub metrics: Metrics,
}

impl Message {
    /// Create a message
    pub fn new(entity_id: impl Into<String>, timestamp: i64, metrics: Metrics) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp,
            metrics,
        }
    }
}
