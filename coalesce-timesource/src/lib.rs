// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::{
    fmt::Debug,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Module containing fake time sources for testing
///
/// To enable this module, you must enable the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
pub mod fakes;

/// Trait for providing custom time sources
///
/// Buffers only ever ask for wall-clock time, since buckets are derived from
/// epoch timestamps. Implementors can be used to simulate time passing in tests.
pub trait Time: Send + Sync + Debug {
    /// Get the current system time
    fn now(&self) -> SystemTime;
}

/// Tokio-specific time source implementations
///
/// This module provides integration with tokio's time utilities, including
/// support for tokio's time pause/advance functionality for testing.
///
/// This requires that the `tokio` feature be enabled.
#[cfg(feature = "tokio")]
pub mod tokio {
    use std::time::SystemTime;

    use tokio::time::Instant as TokioInstant;

    use crate::{Time, TimeSource};

    impl TimeSource {
        /// Create a new TimeSource that follows tokio's clock, starting at `starting_timestamp`.
        ///
        /// When the tokio clock is paused, advancing it also advances this time source, which
        /// lets a periodic heartbeat and the buckets it compares against move in lockstep.
        ///
        /// ```
        /// # #[tokio::main(flavor = "current_thread")]
        /// # async fn main() {
        /// use std::time::{Duration, UNIX_EPOCH};
        /// use coalesce_timesource::TimeSource;
        ///
        /// tokio::time::pause();
        /// let ts = TimeSource::tokio(UNIX_EPOCH + Duration::from_millis(1_000));
        /// assert_eq!(ts.now_millis(), 1_000);
        ///
        /// tokio::time::advance(Duration::from_secs(5)).await;
        /// assert_eq!(ts.now_millis(), 6_000);
        /// # }
        /// ```
        pub fn tokio(starting_timestamp: SystemTime) -> Self {
            TimeSource::custom(TokioTime::initialize_at(starting_timestamp))
        }
    }

    /// A time source implementation that uses tokio's time utilities
    ///
    /// This requires that the `tokio` feature be enabled.
    #[derive(Copy, Clone, Debug)]
    pub struct TokioTime {
        start_time: TokioInstant,
        start_system_time: SystemTime,
    }

    impl TokioTime {
        /// Initialize a new TokioTime with the current system time
        pub fn initialize() -> Self {
            Self::initialize_at(SystemTime::now())
        }

        /// Initialize a new TokioTime that reports `initial_time` right now
        pub fn initialize_at(initial_time: SystemTime) -> Self {
            Self {
                start_time: TokioInstant::now(),
                start_system_time: initial_time,
            }
        }
    }

    impl Time for TokioTime {
        fn now(&self) -> SystemTime {
            self.start_system_time + self.start_time.elapsed()
        }
    }

}

/// Where a buffer reads "now" from.
///
/// `TimeSource` is cheap to clone; custom sources are shared behind an [`Arc`].
#[derive(Clone, Default)]
pub enum TimeSource {
    /// Use the system time
    #[default]
    System,
    /// Use a custom time source
    Custom(Arc<dyn Time + Send + Sync>),
}

impl Debug for TimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "TimeSource::System"),
            Self::Custom(_) => write!(f, "TimeSource::Custom(...)"),
        }
    }
}

impl TimeSource {
    /// Get the current [`SystemTime`] from this time source
    pub fn system_time(&self) -> SystemTime {
        match self {
            Self::System => SystemTime::now(),
            Self::Custom(ts) => ts.now(),
        }
    }

    /// Milliseconds since the unix epoch, negative for times before it.
    ///
    /// Saturates at the bounds of `i64`.
    ///
    /// ```
    /// use coalesce_timesource::{TimeSource, fakes::StaticTimeSource};
    /// use std::time::{Duration, UNIX_EPOCH};
    ///
    /// let ts = TimeSource::custom(StaticTimeSource::at_time(UNIX_EPOCH + Duration::from_millis(42)));
    /// assert_eq!(ts.now_millis(), 42);
    /// ```
    pub fn now_millis(&self) -> i64 {
        to_epoch_millis(self.system_time())
    }

    /// Create a new TimeSource with a custom time implementation
    pub fn custom(custom: impl Time + 'static) -> TimeSource {
        Self::Custom(Arc::new(custom))
    }
}

/// Converts a [`SystemTime`] into signed milliseconds since the unix epoch.
pub fn to_epoch_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis())
            .map(|millis| -millis)
            .unwrap_or(i64::MIN),
    }
}

/// Converts signed milliseconds since the unix epoch into a [`SystemTime`].
pub fn from_epoch_millis(millis: i64) -> SystemTime {
    let magnitude = Duration::from_millis(millis.unsigned_abs());
    if millis >= 0 {
        UNIX_EPOCH + magnitude
    } else {
        UNIX_EPOCH - magnitude
    }
}
