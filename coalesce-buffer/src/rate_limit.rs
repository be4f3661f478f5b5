// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::{
        OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

fn process_uptime() -> Duration {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

/// Returns true if the caller owning `next_allowed` may act now, and pushes the next allowed
/// time out by `interval` when it does. At most one racing caller wins.
pub(crate) fn try_acquire(next_allowed: &AtomicU64, interval: Duration) -> bool {
    let now = process_uptime().as_millis();
    let now = u64::try_from(now).unwrap_or(u64::MAX);
    let next = next_allowed.load(Ordering::Relaxed);
    if now < next {
        return false;
    }
    let interval = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
    next_allowed
        .compare_exchange(
            next,
            now.saturating_add(interval),
            Ordering::Relaxed,
            Ordering::Relaxed,
        )
        .is_ok()
}

/// `rate_limited!(interval, expr)` evaluates `expr` at most once per `interval` for each call
/// site, across all threads.
///
/// Flushes run in the background, often on a timer, so a sink that is down would otherwise log
/// the same failure for every entity on every tick.
macro_rules! rate_limited {
    ($interval:expr, $call:expr) => {{
        static NEXT_ALLOWED: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        if $crate::rate_limit::try_acquire(&NEXT_ALLOWED, $interval) {
            $call;
        }
    }};
}
pub(crate) use rate_limited;

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        sync::atomic::{AtomicU64, Ordering},
        time::Duration,
    };

    use assert2::check;

    use super::try_acquire;

    #[test]
    fn first_call_always_runs() {
        let hits = Cell::new(0u32);
        let log = || rate_limited!(Duration::MAX, hits.set(hits.get() + 1));
        log();
        check!(hits.get() == 1);
        for _ in 0..500 {
            log();
        }
        check!(hits.get() == 1);
    }

    #[test]
    fn zero_interval_never_limits() {
        let next = AtomicU64::new(0);
        check!(try_acquire(&next, Duration::ZERO));
        check!(try_acquire(&next, Duration::ZERO));
    }

    #[test]
    fn blocked_until_interval_elapses() {
        let next = AtomicU64::new(0);
        check!(try_acquire(&next, Duration::from_secs(3600)));
        check!(next.load(Ordering::Relaxed) >= 3_600_000);
        check!(!try_acquire(&next, Duration::from_secs(3600)));
    }
}
