// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use coalesce_core::{Bucket, Metrics};

use crate::SinkError;

/// The persistent store behind a [`StoreBuffer`](crate::StoreBuffer).
///
/// The store is the system of record. It may be called repeatedly for the same entity and
/// bucket (late data is written through without being merged), so implementations should
/// merge rather than overwrite.
pub trait DataStore: Send + Sync {
    /// Persist the merged metrics of one entity for the bucket starting at `bucket`
    fn persist(
        &self,
        entity_id: &str,
        bucket: Bucket,
        metrics: &Metrics,
    ) -> Result<(), SinkError>;
}

impl<T: DataStore + ?Sized> DataStore for Arc<T> {
    fn persist(
        &self,
        entity_id: &str,
        bucket: Bucket,
        metrics: &Metrics,
    ) -> Result<(), SinkError> {
        (**self).persist(entity_id, bucket, metrics)
    }
}

impl<T: DataStore + ?Sized> DataStore for Box<T> {
    fn persist(
        &self,
        entity_id: &str,
        bucket: Bucket,
        metrics: &Metrics,
    ) -> Result<(), SinkError> {
        (**self).persist(entity_id, bucket, metrics)
    }
}

/// The message transport behind a [`FlushBuffer`](crate::FlushBuffer).
///
/// Receives one already encoded payload per flushed entry.
pub trait Transport: Send + Sync {
    /// Send one payload
    fn send(&self, payload: &str) -> Result<(), SinkError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, payload: &str) -> Result<(), SinkError> {
        (**self).send(payload)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, payload: &str) -> Result<(), SinkError> {
        (**self).send(payload)
    }
}
