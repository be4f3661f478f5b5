// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! In-memory sinks that record what buffers flush into them
//!
//! This requires that the `test-util` feature be enabled.

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use coalesce_core::{Bucket, Message, Metrics};

use crate::{BufferEntry, DataStore, SinkError, Transport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`DataStore`] that appends every write to a shared `Vec`.
///
/// Clones share the same writes.
#[derive(Clone, Debug, Default)]
pub struct VecDataStore {
    writes: Arc<Mutex<Vec<BufferEntry>>>,
}

impl VecDataStore {
    /// Every write so far, in the order received
    pub fn written(&self) -> Vec<BufferEntry> {
        lock(&self.writes).clone()
    }

    /// Remove and return every write so far
    pub fn take(&self) -> Vec<BufferEntry> {
        std::mem::take(&mut *lock(&self.writes))
    }

    /// Writes received for `entity_id`
    pub fn written_for(&self, entity_id: &str) -> Vec<BufferEntry> {
        lock(&self.writes)
            .iter()
            .filter(|entry| entry.entity_id() == entity_id)
            .cloned()
            .collect()
    }

    /// Number of writes so far
    pub fn len(&self) -> usize {
        lock(&self.writes).len()
    }

    /// True if nothing was written
    pub fn is_empty(&self) -> bool {
        lock(&self.writes).is_empty()
    }
}

impl DataStore for VecDataStore {
    fn persist(
        &self,
        entity_id: &str,
        bucket: Bucket,
        metrics: &Metrics,
    ) -> Result<(), SinkError> {
        lock(&self.writes).push(BufferEntry::new(entity_id, bucket, metrics.clone()));
        Ok(())
    }
}

/// A [`DataStore`] that rejects writes for some entities and records the rest.
#[derive(Clone, Debug, Default)]
pub struct FailingDataStore {
    failing: Arc<HashSet<String>>,
    rejected: Arc<AtomicUsize>,
    accepted: VecDataStore,
}

impl FailingDataStore {
    /// Fail every write for the given entities
    pub fn for_entities<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: Arc::new(entities.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Writes that were accepted
    pub fn written(&self) -> Vec<BufferEntry> {
        self.accepted.written()
    }

    /// How many writes were rejected
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }
}

impl DataStore for FailingDataStore {
    fn persist(
        &self,
        entity_id: &str,
        bucket: Bucket,
        metrics: &Metrics,
    ) -> Result<(), SinkError> {
        if self.failing.contains(entity_id) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(SinkError::message(format!(
                "store unavailable for {entity_id}"
            )));
        }
        self.accepted.persist(entity_id, bucket, metrics)
    }
}

/// A [`Transport`] that records every payload it is sent.
///
/// Clones share the same payloads.
#[derive(Clone, Debug, Default)]
pub struct VecTransport {
    payloads: Arc<Mutex<Vec<String>>>,
    rejecting: Arc<HashSet<String>>,
}

impl VecTransport {
    /// A transport that fails sends of messages for the given entities
    pub fn rejecting<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rejecting: Arc::new(entities.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Every accepted payload, in the order received
    pub fn payloads(&self) -> Vec<String> {
        lock(&self.payloads).clone()
    }

    /// Every accepted payload decoded as a JSON [`Message`]
    ///
    /// # Panics
    /// If a payload is not a JSON message
    #[track_caller]
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.payloads)
            .iter()
            .map(|payload| serde_json::from_str(payload).expect("payload is not a JSON message"))
            .collect()
    }

    /// Number of accepted payloads
    pub fn len(&self) -> usize {
        lock(&self.payloads).len()
    }

    /// True if nothing was accepted
    pub fn is_empty(&self) -> bool {
        lock(&self.payloads).is_empty()
    }
}

impl Transport for VecTransport {
    fn send(&self, payload: &str) -> Result<(), SinkError> {
        if !self.rejecting.is_empty()
            && let Ok(message) = serde_json::from_str::<Message>(payload)
            && self.rejecting.contains(&message.entity_id)
        {
            return Err(SinkError::message("transport rejected the message"));
        }
        lock(&self.payloads).push(payload.to_owned());
        Ok(())
    }
}
