#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod bucket;
pub mod combine;
pub mod message;
pub mod metric;
pub mod number;
pub mod record;
pub mod summary;

pub use bucket::{Bucket, Granularity};
pub use combine::{Combinator, KeepLast, Max, Min, Sum};
pub use message::Message;
pub use metric::{Metric, Metrics, RecordType};
pub use number::{Number, ParseNumberError};
pub use record::MetricRecord;
pub use summary::{DateRange, Summarizer, Summary, SummaryError, SummarySource, SummaryType};
