// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod entry;
mod error;
mod format;
pub(crate) mod rate_limit;
mod sink;

pub mod flush;
pub mod store;
pub mod task;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use entry::BufferEntry;
pub use error::{BufferError, SinkError};
pub use flush::{FlushBuffer, FlushBufferBuilder, FlushStats};
pub use format::{EncodeError, Format, JsonFormat};
pub use sink::{DataStore, Transport};
pub use store::{StoreBuffer, StoreBufferBuilder};
pub use task::{PeriodicFlush, Tick};
