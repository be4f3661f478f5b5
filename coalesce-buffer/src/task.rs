// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Background task that flushes a buffer on an interval

use std::{fmt, pin::pin, time::Duration};

use futures::future::{Either, select};
use tokio::task;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::Instrument;

/// Work a [`PeriodicFlush`] runs on a blocking thread.
pub trait Tick: Send + Sync {
    /// Runs once per interval
    fn tick(&self);

    /// Runs exactly once when the task is shut down
    fn shut_down(&self);
}

/// A handle to a periodic flush task.
///
/// Every `interval` the task calls [`Tick::tick`] on its target. Once [`PeriodicFlush::shutdown`]
/// is called it calls [`Tick::shut_down`] one last time and exits, so nothing buffered is lost
/// when the process stops.
///
/// Dropping the handle does not stop the task. This may be freely cloned.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use std::time::Duration;
/// use coalesce_buffer::{FlushBuffer, PeriodicFlush, test_util::VecTransport};
/// use coalesce_core::{Metric, Metrics};
///
/// let transport = VecTransport::default();
/// let buffer = FlushBuffer::new(transport.clone());
/// let flusher = PeriodicFlush::spawn("ingest", buffer.clone(), Duration::from_secs(60));
///
/// buffer.add("one", 1_000, Metrics::new().with("hits", Metric::aggregate(1))).unwrap();
/// flusher.shutdown().await;
/// assert_eq!(transport.len(), 1);
/// # }
/// ```
#[derive(Clone)]
pub struct PeriodicFlush {
    name: String,
    tasks: TaskTracker,
    cancellation_token: CancellationToken,
}

impl fmt::Debug for PeriodicFlush {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicFlush")
            .field("name", &self.name)
            .field("cancelled", &self.cancellation_token.is_cancelled())
            .finish()
    }
}

impl PeriodicFlush {
    /// Spawn a task on the current tokio runtime that ticks `target` every `interval`.
    ///
    /// `name` labels the task's tracing span.
    ///
    /// # Panics
    /// If `interval` is zero, or if called outside a tokio runtime.
    #[track_caller]
    pub fn spawn<T>(name: impl Into<String>, target: T, interval: Duration) -> Self
    where
        T: Tick + Clone + 'static,
    {
        assert!(
            interval > Duration::ZERO,
            "flush interval must not be zero"
        );
        let name = name.into();
        let tasks = TaskTracker::new();
        let cancellation_token = CancellationToken::new();

        let token = cancellation_token.clone();
        let span = tracing::info_span!("periodic_flush", buffer = %name);
        tasks.spawn(
            async move {
                let next_tick = || tokio::time::sleep(interval);
                let shutdown_initiated = || token.cancelled();
                while let Either::Left(_ticked) =
                    select(pin!(next_tick()), pin!(shutdown_initiated())).await
                {
                    tracing::trace!("flushing buffer");
                    let target = target.clone();
                    if let Err(err) = task::spawn_blocking(move || target.tick()).await {
                        tracing::error!(?err, "a panic occurred while flushing");
                    }
                }
                tracing::debug!("shutting down, flushing one last time");
                if let Err(err) = task::spawn_blocking(move || target.shut_down()).await {
                    tracing::error!(?err, "a panic occurred during the final flush");
                } else {
                    tracing::debug!("final flush complete");
                }
            }
            .instrument(span),
        );
        tasks.close();

        Self {
            name,
            tasks,
            cancellation_token,
        }
    }

    /// Stop ticking, run the final flush and wait for it to complete.
    pub async fn shutdown(&self) {
        self.cancellation_token.cancel();
        self.tasks.wait().await
    }

    /// True once [`PeriodicFlush::shutdown`] has been requested
    pub fn is_shut_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
