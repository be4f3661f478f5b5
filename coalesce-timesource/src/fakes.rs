// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use crate::{Time, from_epoch_millis};

/// Simple static timesource that will always return the same time
#[derive(Debug)]
pub struct StaticTimeSource {
    now: SystemTime,
}

impl StaticTimeSource {
    /// Create a new StaticTimeSource that always returns the given time
    ///
    /// ```
    /// use coalesce_timesource::{TimeSource, fakes::StaticTimeSource};
    /// use std::time::UNIX_EPOCH;
    ///
    /// let ts = TimeSource::custom(StaticTimeSource::at_time(UNIX_EPOCH));
    /// assert_eq!(ts.system_time(), UNIX_EPOCH);
    /// ```
    pub fn at_time(time: impl Into<SystemTime>) -> Self {
        Self { now: time.into() }
    }

    /// Create a new StaticTimeSource fixed at `millis` since the unix epoch
    pub fn at_millis(millis: i64) -> Self {
        Self::at_time(from_epoch_millis(millis))
    }
}

impl Time for StaticTimeSource {
    fn now(&self) -> SystemTime {
        self.now
    }
}

/// Timesource that is loaded with one time, but can be cloned and moved via a shared handle.
///
/// This is the usual way to drive a buffer's heartbeat in tests: keep one clone, hand the
/// other to the buffer, and move time forward between calls.
#[derive(Debug, Clone)]
pub struct ManuallyAdvancedTimeSource(Arc<Mutex<StaticTimeSource>>);

impl ManuallyAdvancedTimeSource {
    /// Create a new ManuallyAdvancedTimeSource that is started with the given time.
    pub fn at_time(time: impl Into<SystemTime>) -> Self {
        Self(Arc::new(Mutex::new(StaticTimeSource::at_time(time))))
    }

    /// Create a new ManuallyAdvancedTimeSource started at `millis` since the unix epoch.
    pub fn at_millis(millis: i64) -> Self {
        Self::at_time(from_epoch_millis(millis))
    }

    /// Replace the loaded time.
    ///
    /// ```
    /// use coalesce_timesource::{TimeSource, fakes::ManuallyAdvancedTimeSource};
    ///
    /// let clock = ManuallyAdvancedTimeSource::at_millis(1_000);
    /// let ts = TimeSource::custom(clock.clone());
    /// clock.set_millis(5_000);
    /// assert_eq!(ts.now_millis(), 5_000);
    /// ```
    pub fn update_time(&self, time: impl Into<SystemTime>) {
        self.lock().now = time.into();
    }

    /// Replace the loaded time with `millis` since the unix epoch.
    pub fn set_millis(&self, millis: i64) {
        self.update_time(from_epoch_millis(millis));
    }

    /// Move the loaded time forward by `elapsed`.
    pub fn advance(&self, elapsed: Duration) {
        self.lock().now += elapsed;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StaticTimeSource> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Time for ManuallyAdvancedTimeSource {
    fn now(&self) -> SystemTime {
        self.lock().now
    }
}
