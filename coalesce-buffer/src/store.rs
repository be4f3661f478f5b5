// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Bucket-coalescing buffer in front of a [`DataStore`]

use std::{
    cmp::Ordering,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use coalesce_core::{Bucket, Granularity, Metrics};
use coalesce_timesource::TimeSource;
use hashbrown::{HashMap, hash_map::EntryRef};

use crate::{BufferEntry, BufferError, DataStore, error::validate, task::Tick};

/// The one open window shared by every entity.
///
/// A window is only created together with its first entry, so an open window is never empty.
struct Window {
    bucket: Bucket,
    pending: HashMap<String, Metrics>,
}

impl Window {
    fn open(bucket: Bucket, entity_id: &str, data: Metrics) -> Self {
        let mut pending = HashMap::new();
        pending.insert(entity_id.to_owned(), data);
        Self { bucket, pending }
    }

    fn merge(&mut self, entity_id: &str, data: Metrics) {
        match self.pending.entry_ref(entity_id) {
            EntryRef::Occupied(mut occupied) => {
                occupied.get_mut().merge(data);
            }
            EntryRef::Vacant(vacant) => {
                vacant.insert(data);
            }
        }
    }

    fn into_entries(self) -> impl Iterator<Item = BufferEntry> {
        let bucket = self.bucket;
        self.pending
            .into_iter()
            .map(move |(entity_id, data)| BufferEntry::new(entity_id, bucket, data))
    }
}

/// What a write did to the window, decided under the lock and carried out after it.
enum Outcome {
    Buffered,
    Rolled(Window),
    Late(Metrics),
}

struct Inner<D> {
    store: D,
    granularity: Granularity,
    time_source: TimeSource,
    window: Mutex<Option<Window>>,
}

/// Coalesces writes for the currently open time bucket before they reach a [`DataStore`].
///
/// The buffer holds at most one bucket at a time, shared by all entities:
///
/// - the first write opens a window at its bucket;
/// - writes for the open bucket are merged per entity, without touching the store;
/// - a write for a later bucket flushes every buffered entity (one store call each) and opens a
///   new window holding only that write;
/// - a write for an earlier bucket is persisted immediately and leaves the window alone.
///
/// [`StoreBuffer::heartbeat`] closes a window once the clock has moved past it, even if no
/// later write arrives. Run it on an interval with [`PeriodicFlush`](crate::PeriodicFlush).
///
/// Every decision and rotation happens under one lock. Store calls happen after the lock is
/// released, on entries already moved out of the window.
///
/// Cloning is cheap and returns a handle to the same buffer.
///
/// ```
/// use coalesce_buffer::{StoreBuffer, test_util::VecDataStore};
/// use coalesce_core::{Granularity, Metric, Metrics};
///
/// let store = VecDataStore::default();
/// let buffer = StoreBuffer::builder()
///     .data_store(store.clone())
///     .granularity(Granularity::from_millis(1_000).unwrap())
///     .build();
///
/// let hit = || Metrics::new().with("hits", Metric::aggregate(1));
/// buffer.persist("one", 1_100, hit()).unwrap();
/// buffer.persist("one", 1_900, hit()).unwrap();
/// assert!(store.is_empty());
///
/// // a write for the next bucket closes the previous one
/// buffer.persist("one", 2_000, hit()).unwrap();
/// let written = store.take();
/// assert_eq!(written.len(), 1);
/// assert_eq!(written[0].data().get("hits").unwrap().value(), 2.into());
/// ```
pub struct StoreBuffer<D> {
    inner: Arc<Inner<D>>,
}

impl<D> Clone for StoreBuffer<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D> fmt::Debug for StoreBuffer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBuffer")
            .field("granularity", &self.inner.granularity)
            .field("time_source", &self.inner.time_source)
            .finish_non_exhaustive()
    }
}

impl StoreBuffer<YouMustConfigureADataStore> {
    /// Creates a [`StoreBufferBuilder`]
    pub fn builder() -> StoreBufferBuilder {
        StoreBufferBuilder::new()
    }
}

impl<D: DataStore> StoreBuffer<D> {
    /// A buffer with the default granularity, reading the system clock
    pub fn new(store: D) -> Self {
        StoreBufferBuilder::new().data_store(store).build()
    }

    /// Buffer `data` for `entity_id` at `timestamp` (epoch milliseconds).
    ///
    /// Returns an error without touching the buffer if `entity_id` is empty or `timestamp` is
    /// not positive. A failure to persist late data is returned as [`BufferError::Sink`];
    /// failures while flushing a closed window are logged instead, and do not stop the
    /// remaining entities of that window from being flushed.
    pub fn persist(
        &self,
        entity_id: &str,
        timestamp: i64,
        data: Metrics,
    ) -> Result<(), BufferError> {
        validate(entity_id, timestamp)?;
        let bucket = self.inner.granularity.bucket(timestamp);

        let outcome = {
            let mut window = self.lock();
            Self::apply(&mut window, entity_id, bucket, data)
        };

        match outcome {
            Outcome::Buffered => Ok(()),
            Outcome::Rolled(closed) => {
                tracing::debug!(%bucket, closed = %closed.bucket, "bucket advanced");
                self.flush_window(closed);
                Ok(())
            }
            Outcome::Late(data) => {
                tracing::debug!(%entity_id, %bucket, "writing late data through");
                self.inner
                    .store
                    .persist(entity_id, bucket, &data)
                    .map_err(BufferError::Sink)
            }
        }
    }

    fn apply(
        window: &mut Option<Window>,
        entity_id: &str,
        bucket: Bucket,
        data: Metrics,
    ) -> Outcome {
        match window {
            None => {
                *window = Some(Window::open(bucket, entity_id, data));
                Outcome::Buffered
            }
            Some(open) => match bucket.cmp(&open.bucket) {
                Ordering::Equal => {
                    open.merge(entity_id, data);
                    Outcome::Buffered
                }
                Ordering::Greater => {
                    let closed = std::mem::replace(open, Window::open(bucket, entity_id, data));
                    Outcome::Rolled(closed)
                }
                Ordering::Less => Outcome::Late(data),
            },
        }
    }

    /// Flush the open window if the time source's clock has moved past its bucket.
    ///
    /// Returns how many entities were flushed.
    pub fn heartbeat(&self) -> usize {
        self.heartbeat_at(self.inner.time_source.now_millis())
    }

    /// Flush the open window if `now` (epoch milliseconds) falls in a later bucket.
    ///
    /// Returns how many entities were flushed.
    pub fn heartbeat_at(&self, now: i64) -> usize {
        let now_bucket = self.inner.granularity.bucket(now);
        let expired = {
            let mut window = self.lock();
            if window.as_ref().is_some_and(|open| now_bucket > open.bucket) {
                window.take()
            } else {
                None
            }
        };
        match expired {
            Some(closed) => self.flush_window(closed),
            None => 0,
        }
    }

    /// Flush the open window whether or not its bucket has elapsed.
    ///
    /// Meant for shutdown. Returns how many entities were flushed.
    pub fn drain(&self) -> usize {
        let window = self.lock().take();
        match window {
            Some(closed) => self.flush_window(closed),
            None => 0,
        }
    }

    /// Number of entities buffered in the open window
    pub fn pending_entities(&self) -> usize {
        self.lock().as_ref().map_or(0, |open| open.pending.len())
    }

    /// Bucket of the open window, `None` when nothing is buffered
    pub fn current_bucket(&self) -> Option<Bucket> {
        self.lock().as_ref().map(|open| open.bucket)
    }

    /// A copy of what is buffered for `entity_id`
    pub fn pending(&self, entity_id: &str) -> Option<Metrics> {
        self.lock()
            .as_ref()
            .and_then(|open| open.pending.get(entity_id).cloned())
    }

    /// The configured bucket width
    pub fn granularity(&self) -> Granularity {
        self.inner.granularity
    }

    fn flush_window(&self, closed: Window) -> usize {
        let bucket = closed.bucket;
        let count = closed.pending.len();
        tracing::debug!(count, %bucket, "flushing metric buffer");

        let mut failures = 0usize;
        for entry in closed.into_entries() {
            let (entity_id, bucket, data) = entry.into_parts();
            if let Err(err) = self.inner.store.persist(&entity_id, bucket, &data) {
                failures += 1;
                tracing::error!(%entity_id, %bucket, ?err, "failed to persist buffered metrics");
            }
        }
        if failures > 0 {
            tracing::warn!(failures, count, %bucket, "metric buffer flush was incomplete");
        }
        count
    }

    fn lock(&self) -> MutexGuard<'_, Option<Window>> {
        // the window is always consistent before a store call, so a poisoned lock is still usable
        self.inner
            .window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: DataStore + 'static> Tick for StoreBuffer<D> {
    fn tick(&self) {
        self.heartbeat();
    }

    fn shut_down(&self) {
        self.drain();
    }
}

/// Marker type to ensure that a data store is always set.
///
/// A [`StoreBuffer`] cannot be built without one.
#[derive(Default, Debug)]
#[non_exhaustive]
pub struct YouMustConfigureADataStore;

/// Builder for [`StoreBuffer`]
///
/// Defaults to a two minute [`Granularity`] and the system clock.
///
/// **Note: a data store is required**:
/// ```compile_fail
/// use coalesce_buffer::StoreBuffer;
/// let buffer = StoreBuffer::builder().build();
/// ```
pub struct StoreBufferBuilder<D = YouMustConfigureADataStore> {
    store: D,
    granularity: Granularity,
    time_source: TimeSource,
}

impl<D> fmt::Debug for StoreBufferBuilder<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBufferBuilder")
            .field("granularity", &self.granularity)
            .field("time_source", &self.time_source)
            .finish_non_exhaustive()
    }
}

impl Default for StoreBufferBuilder<YouMustConfigureADataStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBufferBuilder<YouMustConfigureADataStore> {
    /// Initialize the builder
    pub fn new() -> Self {
        Self {
            store: YouMustConfigureADataStore,
            granularity: Granularity::DEFAULT,
            time_source: TimeSource::System,
        }
    }
}

impl<D> StoreBufferBuilder<D> {
    /// Sets where closed windows are persisted
    pub fn data_store<S: DataStore>(self, store: S) -> StoreBufferBuilder<S> {
        StoreBufferBuilder {
            store,
            granularity: self.granularity,
            time_source: self.time_source,
        }
    }

    /// Sets the bucket width
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

    /// Sets the clock [`StoreBuffer::heartbeat`] reads
    pub fn time_source(mut self, time_source: TimeSource) -> Self {
        self.time_source = time_source;
        self
    }
}

impl<D: DataStore> StoreBufferBuilder<D> {
    /// Build the buffer
    pub fn build(self) -> StoreBuffer<D> {
        StoreBuffer {
            inner: Arc::new(Inner {
                store: self.store,
                granularity: self.granularity,
                time_source: self.time_source,
                window: Mutex::new(None),
            }),
        }
    }
}
