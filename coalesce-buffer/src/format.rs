// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use coalesce_core::Message;

/// A flushed entry could not be turned into a payload.
#[derive(Debug)]
pub struct EncodeError {
    inner: Box<dyn std::error::Error + Send + Sync>,
}

impl EncodeError {
    /// Wrap an encoder-specific error
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self { inner: err.into() }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "couldn't encode message: {}", self.inner)
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl From<serde_json::Error> for EncodeError {
    fn from(value: serde_json::Error) -> Self {
        Self::new(value)
    }
}

/// Turns a flushed [`Message`] into the text handed to a [`Transport`](crate::Transport).
pub trait Format: Send + Sync {
    /// Encode a single message
    fn encode(&self, message: &Message) -> Result<String, EncodeError>;
}

impl<T: Format + ?Sized> Format for Box<T> {
    fn encode(&self, message: &Message) -> Result<String, EncodeError> {
        (**self).encode(message)
    }
}

/// Encodes messages as a single line of JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonFormat;

impl Format for JsonFormat {
    fn encode(&self, message: &Message) -> Result<String, EncodeError> {
        Ok(serde_json::to_string(message)?)
    }
}
