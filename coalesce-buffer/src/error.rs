// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A store or transport rejected a write.
#[derive(Debug)]
pub struct SinkError {
    inner: BoxError,
}

impl SinkError {
    /// Wrap the error returned by the underlying client
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self { inner: err.into() }
    }

    /// A sink error with only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(message.into())
    }

    /// The wrapped error
    pub fn into_inner(self) -> BoxError {
        self.inner
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink write failed: {}", self.inner)
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

/// Errors returned to the caller of a buffer write.
///
/// Only invalid input and the synchronous write of late data surface here. Failures while
/// flushing a window are logged, since the producers whose data is in the window have already
/// returned.
#[derive(Debug)]
#[non_exhaustive]
pub enum BufferError {
    /// The entity id was empty
    MissingEntityId,
    /// The timestamp was zero or negative
    InvalidTimestamp(i64),
    /// Late data could not be written through to the sink
    Sink(SinkError),
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEntityId => f.write_str("entity id must not be empty"),
            Self::InvalidTimestamp(ts) => write!(f, "timestamp must be positive, got {ts}"),
            Self::Sink(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for BufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sink(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SinkError> for BufferError {
    fn from(value: SinkError) -> Self {
        Self::Sink(value)
    }
}

// rejected before any shared state is touched
pub(crate) fn validate(entity_id: &str, timestamp: i64) -> Result<(), BufferError> {
    if entity_id.is_empty() {
        return Err(BufferError::MissingEntityId);
    }
    if timestamp <= 0 {
        return Err(BufferError::InvalidTimestamp(timestamp));
    }
    Ok(())
}
