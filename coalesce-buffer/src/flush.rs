// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Periodically flushed buffer in front of a [`Transport`]

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use coalesce_core::{Bucket, Granularity, MetricRecord, Metrics};
use hashbrown::{HashMap, hash_map::Entry};

use crate::{
    BufferEntry, BufferError, Format, JsonFormat, Transport,
    error::validate,
    rate_limit::rate_limited,
    task::Tick,
};

/// What a single [`FlushBuffer::flush`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct FlushStats {
    /// Entries sent successfully
    pub sent: usize,
    /// Entries dropped because they could not be encoded
    pub dropped: usize,
    /// Entries the transport rejected
    pub failed: usize,
}

struct Inner<T, F> {
    transport: T,
    format: F,
    granularity: Granularity,
    pending: Mutex<HashMap<(String, Bucket), Metrics>>,
}

/// Merges writes per `(entity, bucket)` and sends everything it holds on every flush.
///
/// Unlike [`StoreBuffer`](crate::StoreBuffer), entries for many buckets coexist and a flush
/// does not care whether their windows are over. Adding never talks to the transport. Drive
/// [`FlushBuffer::flush`] from a [`PeriodicFlush`](crate::PeriodicFlush), which also flushes
/// once more on shutdown.
///
/// Cloning is cheap and returns a handle to the same buffer.
///
/// ```
/// use coalesce_buffer::{FlushBuffer, test_util::VecTransport};
/// use coalesce_core::{Metric, Metrics};
///
/// let transport = VecTransport::default();
/// let buffer = FlushBuffer::new(transport.clone());
/// buffer.add("one", 1_000, Metrics::new().with("hits", Metric::aggregate(1))).unwrap();
/// buffer.add("one", 1_001, Metrics::new().with("hits", Metric::aggregate(1))).unwrap();
/// assert_eq!(buffer.len(), 1);
///
/// buffer.flush();
/// assert!(buffer.is_empty());
/// let sent = transport.messages();
/// assert_eq!(sent.len(), 1);
/// assert_eq!(sent[0].metrics.get("hits").unwrap().value(), 2.into());
/// ```
pub struct FlushBuffer<T, F = JsonFormat> {
    inner: Arc<Inner<T, F>>,
}

impl<T, F> Clone for FlushBuffer<T, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, F> fmt::Debug for FlushBuffer<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushBuffer")
            .field("granularity", &self.inner.granularity)
            .finish_non_exhaustive()
    }
}

impl FlushBuffer<YouMustConfigureATransport> {
    /// Creates a [`FlushBufferBuilder`]
    pub fn builder() -> FlushBufferBuilder {
        FlushBufferBuilder::new()
    }
}

impl<T: Transport> FlushBuffer<T> {
    /// A JSON-encoding buffer with the default granularity
    pub fn new(transport: T) -> Self {
        FlushBufferBuilder::new().transport(transport).build()
    }
}

impl<T: Transport, F: Format> FlushBuffer<T, F> {
    /// Buffer `data` for `entity_id` at `timestamp` (epoch milliseconds), merging it into any
    /// entry already held for the same entity and bucket.
    pub fn add(&self, entity_id: &str, timestamp: i64, data: Metrics) -> Result<(), BufferError> {
        validate(entity_id, timestamp)?;
        let bucket = self.inner.granularity.bucket(timestamp);
        match self.lock().entry((entity_id.to_owned(), bucket)) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().merge(data);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(data);
            }
        }
        Ok(())
    }

    /// Buffer a single measurement
    pub fn record(&self, record: &MetricRecord) -> Result<(), BufferError> {
        self.add(record.entity_id(), record.timestamp(), record.to_metrics())
    }

    /// Send every buffered entry to the transport, one payload each, and leave the buffer
    /// empty.
    ///
    /// Entries that fail to encode are logged and dropped. Transport failures are logged and
    /// the remaining entries are still sent; nothing is put back into the buffer.
    pub fn flush(&self) -> FlushStats {
        let taken = std::mem::take(&mut *self.lock());
        let mut stats = FlushStats::default();
        if taken.is_empty() {
            return stats;
        }
        tracing::debug!(count = taken.len(), "flushing metric buffer");

        for ((entity_id, bucket), data) in taken {
            let message = BufferEntry::new(entity_id, bucket, data).into_message();
            let payload = match self.inner.format.encode(&message) {
                Ok(payload) => payload,
                Err(err) => {
                    stats.dropped += 1;
                    tracing::error!(
                        entity_id = %message.entity_id,
                        %bucket,
                        ?err,
                        "dropping metric entry that couldn't be encoded"
                    );
                    continue;
                }
            };
            match self.inner.transport.send(&payload) {
                Ok(()) => stats.sent += 1,
                Err(err) => {
                    stats.failed += 1;
                    rate_limited!(
                        Duration::from_secs(1),
                        tracing::warn!(
                            entity_id = %message.entity_id,
                            %bucket,
                            ?err,
                            "couldn't send metric entry"
                        )
                    );
                }
            }
        }
        stats
    }

    /// Number of buffered `(entity, bucket)` entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The configured bucket width
    pub fn granularity(&self) -> Granularity {
        self.inner.granularity
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, Bucket), Metrics>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport + 'static, F: Format + 'static> Tick for FlushBuffer<T, F> {
    fn tick(&self) {
        self.flush();
    }

    fn shut_down(&self) {
        let stats = self.flush();
        tracing::debug!(?stats, "final flush complete");
    }
}

/// Marker type to ensure that a transport is always set.
///
/// A [`FlushBuffer`] cannot be built without one.
#[derive(Default, Debug)]
#[non_exhaustive]
pub struct YouMustConfigureATransport;

/// Builder for [`FlushBuffer`]
///
/// Defaults to a two minute [`Granularity`] and [`JsonFormat`].
pub struct FlushBufferBuilder<T = YouMustConfigureATransport, F = JsonFormat> {
    transport: T,
    format: F,
    granularity: Granularity,
}

impl<T, F> fmt::Debug for FlushBufferBuilder<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushBufferBuilder")
            .field("granularity", &self.granularity)
            .finish_non_exhaustive()
    }
}

impl Default for FlushBufferBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlushBufferBuilder {
    /// Initialize the builder
    pub fn new() -> Self {
        Self {
            transport: YouMustConfigureATransport,
            format: JsonFormat,
            granularity: Granularity::DEFAULT,
        }
    }
}

impl<T, F> FlushBufferBuilder<T, F> {
    /// Sets where flushed entries are sent
    pub fn transport<S: Transport>(self, transport: S) -> FlushBufferBuilder<S, F> {
        FlushBufferBuilder {
            transport,
            format: self.format,
            granularity: self.granularity,
        }
    }

    /// Sets how flushed entries are encoded
    pub fn format<G: Format>(self, format: G) -> FlushBufferBuilder<T, G> {
        FlushBufferBuilder {
            transport: self.transport,
            format,
            granularity: self.granularity,
        }
    }

    /// Sets the bucket width used to key entries
    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Sets the bucket width in milliseconds
    ///
    /// # Panics
    /// If `millis` is not positive
    #[track_caller]
    pub fn granularity_millis(self, millis: i64) -> Self {
        let granularity = Granularity::from_millis(millis);
        assert!(
            granularity.is_some(),
            "granularity must be positive, not {millis}"
        );
        self.granularity(granularity.unwrap_or_default())
    }
}

impl<T: Transport, F: Format> FlushBufferBuilder<T, F> {
    /// Build the buffer
    pub fn build(self) -> FlushBuffer<T, F> {
        FlushBuffer {
            inner: Arc::new(Inner {
                transport: self.transport,
                format: self.format,
                granularity: self.granularity,
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use coalesce_core::{Message, Metric, MetricRecord, Metrics, RecordType};

    use super::{FlushBuffer, FlushStats};
    use crate::{BufferError, EncodeError, Format, JsonFormat, test_util::VecTransport};

    const G: i64 = 1_000;

    fn buffer(transport: VecTransport) -> FlushBuffer<VecTransport> {
        FlushBuffer::builder()
            .transport(transport)
            .granularity_millis(G)
            .build()
    }

    fn hits(n: i64) -> Metrics {
        Metrics::new().with("hits", Metric::aggregate(n))
    }

    #[test]
    fn add_merges_per_entity_and_bucket() {
        let transport = VecTransport::default();
        let buffer = buffer(transport.clone());
        buffer.add("one", 10, hits(1)).unwrap();
        buffer.add("one", 20, hits(2)).unwrap();
        buffer.add("one", G + 10, hits(4)).unwrap();
        buffer.add("two", 10, hits(8)).unwrap();

        check!(buffer.len() == 3);
        check!(transport.is_empty());
    }

    #[test]
    fn flush_sends_everything_and_empties() {
        let transport = VecTransport::default();
        let buffer = buffer(transport.clone());
        buffer.add("one", 10, hits(1)).unwrap();
        buffer.add("one", 20, hits(2)).unwrap();
        buffer.add("one", 5 * G, hits(4)).unwrap();

        let stats = buffer.flush();
        check!(stats == FlushStats { sent: 2, dropped: 0, failed: 0 });
        check!(buffer.is_empty());

        let mut sent = transport.messages();
        sent.sort_by_key(|m| m.timestamp);
        check!(sent.len() == 2);
        check!(sent[0].timestamp == 0);
        check!(sent[0].metrics.get("hits").unwrap().value() == 3.into());
        check!(sent[1].timestamp == 5 * G);

        check!(buffer.flush() == FlushStats::default());
        check!(transport.len() == 2);
    }

    #[test]
    fn record_buffers_a_single_metric() {
        let transport = VecTransport::default();
        let buffer = buffer(transport.clone());
        let record = MetricRecord::new("one", "load", 0.5, 10, RecordType::Absolute);
        buffer.record(&record).unwrap();
        buffer
            .record(&MetricRecord::new("one", "load", 0.75, 20, RecordType::Absolute))
            .unwrap();
        buffer.flush();

        let sent = transport.messages();
        check!(sent.len() == 1);
        check!(sent[0].entity_id == "one");
        check!(sent[0].metrics.get("load").unwrap().value() == 0.75.into());
    }

    #[test]
    fn rejects_invalid_input() {
        let buffer = buffer(VecTransport::default());
        let_assert!(Err(BufferError::MissingEntityId) = buffer.add("", 10, hits(1)));
        let_assert!(Err(BufferError::InvalidTimestamp(-1)) = buffer.add("one", -1, hits(1)));
        check!(buffer.is_empty());
    }

    struct RefuseEntity(&'static str);

    impl Format for RefuseEntity {
        fn encode(&self, message: &Message) -> Result<String, EncodeError> {
            if message.entity_id == self.0 {
                return Err(EncodeError::new("refused"));
            }
            JsonFormat.encode(message)
        }
    }

    #[test]
    fn encode_failures_drop_only_that_entry() {
        let transport = VecTransport::default();
        let buffer = FlushBuffer::builder()
            .transport(transport.clone())
            .format(RefuseEntity("bad"))
            .granularity_millis(G)
            .build();
        buffer.add("bad", 10, hits(1)).unwrap();
        buffer.add("good", 10, hits(1)).unwrap();

        let stats = buffer.flush();
        check!(stats == FlushStats { sent: 1, dropped: 1, failed: 0 });
        check!(buffer.is_empty());
        let sent = transport.messages();
        check!(sent.len() == 1);
        check!(sent[0].entity_id == "good");
    }

    #[test]
    fn transport_failures_do_not_stop_the_batch() {
        let transport = VecTransport::rejecting(["bad"]);
        let buffer = buffer(transport.clone());
        buffer.add("bad", 10, hits(1)).unwrap();
        buffer.add("good", 10, hits(1)).unwrap();
        buffer.add("fine", 10, hits(1)).unwrap();

        let stats = buffer.flush();
        check!(stats == FlushStats { sent: 2, dropped: 0, failed: 1 });
        check!(buffer.is_empty());
        check!(transport.len() == 2);
    }
}
