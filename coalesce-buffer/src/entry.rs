// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use coalesce_core::{Bucket, Message, Metrics};

/// The merged, not yet flushed metrics of one entity for one bucket.
///
/// Entries only exist inside a buffer and in the hand-off to a sink: flushing moves them out.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferEntry {
    entity_id: String,
    bucket: Bucket,
    data: Metrics,
}

impl BufferEntry {
    /// Create an entry
    pub fn new(entity_id: impl Into<String>, bucket: Bucket, data: Metrics) -> Self {
        Self {
            entity_id: entity_id.into(),
            bucket,
            data,
        }
    }

    /// Entity the metrics belong to
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Bucket the metrics were merged in
    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    /// Merged metrics
    pub fn data(&self) -> &Metrics {
        &self.data
    }

    /// Split into `(entity_id, bucket, data)`
    pub fn into_parts(self) -> (String, Bucket, Metrics) {
        (self.entity_id, self.bucket, self.data)
    }

    /// The transport payload for this entry, stamped with the bucket start
    pub fn into_message(self) -> Message {
        Message::new(self.entity_id, self.bucket.start_millis(), self.data)
    }
}
