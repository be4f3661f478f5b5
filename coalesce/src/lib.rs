// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod config;

pub use config::{Config, ConfigError, FlushConfig, StoreConfig};

pub use coalesce_core::{
    Bucket, DateRange, Granularity, Message, Metric, MetricRecord, Metrics, Number, RecordType,
    Summarizer, Summary, SummaryError, SummarySource, SummaryType,
};

pub use coalesce_buffer::{
    BufferEntry, BufferError, DataStore, EncodeError, FlushBuffer, FlushStats, Format,
    JsonFormat, PeriodicFlush, SinkError, StoreBuffer, Tick, Transport,
};

/// Strategies for combining values, and re-aggregating stored summaries
pub mod combine {
    pub use coalesce_core::combine::{
        Combinator, KeepLast, Max, Min, Sum, Summarized, merge_result_maps, summarize,
        summarize_sum,
    };
}

/// Buffer builders
pub mod builder {
    pub use coalesce_buffer::flush::{FlushBufferBuilder, YouMustConfigureATransport};
    pub use coalesce_buffer::store::{StoreBufferBuilder, YouMustConfigureADataStore};
}

/// Where buffers read the current time from
pub mod timesource {
    pub use coalesce_timesource::{Time, TimeSource, from_epoch_millis, to_epoch_millis};

    #[cfg(feature = "test-util")]
    pub use coalesce_timesource::fakes;

    #[cfg(feature = "tokio-time")]
    pub use coalesce_timesource::tokio::TokioTime;
}

/// In-memory sinks for tests
///
/// This requires that the `test-util` feature be enabled.
#[cfg(feature = "test-util")]
pub mod test_util {
    pub use coalesce_buffer::test_util::{FailingDataStore, VecDataStore, VecTransport};
}
