//! Flooring timestamps onto fixed-width windows

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Start of a fixed-width time window, in milliseconds since the unix epoch.
///
/// Buckets from the same [`Granularity`] order the same way their windows do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bucket(i64);

impl Bucket {
    /// The bucket starting at `millis`. No alignment is checked.
    pub const fn from_start_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Window start in epoch milliseconds
    pub const fn start_millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Width of a bucket in milliseconds. Always strictly positive.
///
/// ```
/// use coalesce_core::Granularity;
///
/// let g = Granularity::from_millis(1_000).unwrap();
/// assert_eq!(g.bucket(2_500).start_millis(), 2_000);
/// assert_eq!(g.bucket(-1).start_millis(), -1_000);
/// assert!(Granularity::from_millis(0).is_none());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Granularity(i64);

impl Granularity {
    /// Two minutes
    pub const DEFAULT: Granularity = Granularity(120_000);

    /// Returns `None` unless `millis` is positive
    pub const fn from_millis(millis: i64) -> Option<Self> {
        if millis > 0 { Some(Self(millis)) } else { None }
    }

    /// Returns `None` for a zero duration or one that does not fit in `i64` milliseconds
    pub fn from_duration(duration: Duration) -> Option<Self> {
        i64::try_from(duration.as_millis())
            .ok()
            .and_then(Self::from_millis)
    }

    /// Width in milliseconds
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Width as a [`Duration`]
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0.unsigned_abs())
    }

    /// The bucket containing `timestamp` (epoch milliseconds)
    pub const fn bucket(self, timestamp: i64) -> Bucket {
        Bucket(timestamp - timestamp.rem_euclid(self.0))
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert2::check;
    use rstest::rstest;

    use super::{Bucket, Granularity};

    #[rstest]
    #[case(0, 0)]
    #[case(1, 0)]
    #[case(999, 0)]
    #[case(1_000, 1_000)]
    #[case(123_456, 123_000)]
    #[case(-1, -1_000)]
    fn floors_to_granularity(#[case] timestamp: i64, #[case] start: i64) {
        let g = Granularity::from_millis(1_000).unwrap();
        check!(g.bucket(timestamp) == Bucket::from_start_millis(start));
    }

    #[test]
    fn rejects_non_positive_widths() {
        check!(Granularity::from_millis(0).is_none());
        check!(Granularity::from_millis(-5).is_none());
        check!(Granularity::from_duration(Duration::ZERO).is_none());
        check!(Granularity::from_duration(Duration::from_secs(2)) == Granularity::from_millis(2_000));
    }

    #[test]
    fn default_is_two_minutes() {
        check!(Granularity::default().as_duration() == Duration::from_secs(120));
    }

    #[test]
    fn buckets_order_by_window() {
        let g = Granularity::DEFAULT;
        check!(g.bucket(10) < g.bucket(120_000));
        check!(g.bucket(120_000) == g.bucket(239_999));
    }
}
