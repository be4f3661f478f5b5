//! Strategies for combining numbers
//!
//! A [`Combinator`] folds an incoming value into an optional running value. The same strategies
//! back metric merges (see [`crate::metric::Metric::merge`]) and the re-aggregation of stored
//! summaries over larger windows ([`summarize`], [`merge_result_maps`]).
//!
//! Callers are generic over the strategy, so swapping [`Sum`] for [`Max`] does not touch them:
//!
//! ```
//! use coalesce_core::combine::{Combinator, Max, Sum};
//! use coalesce_core::Number;
//!
//! fn fold<C: Combinator>(values: &[i64]) -> Option<Number> {
//!     values
//!         .iter()
//!         .fold(None, |acc, v| Some(C::combine(acc, Number::from(*v))))
//! }
//!
//! assert_eq!(fold::<Sum>(&[1, 2, 3]), Some(Number::from(6)));
//! assert_eq!(fold::<Max>(&[1, 5, 3]), Some(Number::from(5)));
//! ```

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::number::Number;
use crate::summary::{Summary, SummaryError};

/// Re-aggregated values keyed by metric name
pub type Summarized = HashMap<String, Number>;

/// Defines how an incoming value is folded into an existing one.
pub trait Combinator {
    /// Combine `incoming` into `existing`. `existing` is `None` for the first value seen.
    fn combine(existing: Option<Number>, incoming: Number) -> Number;
}

/// Sums values when combining
///
/// Use for counts, totals, bytes transferred, or anything else that accumulates.
pub struct Sum;

impl Combinator for Sum {
    fn combine(existing: Option<Number>, incoming: Number) -> Number {
        match existing {
            Some(existing) => existing + incoming,
            None => incoming,
        }
    }
}

/// Keeps the largest value seen
pub struct Max;

impl Combinator for Max {
    fn combine(existing: Option<Number>, incoming: Number) -> Number {
        match existing {
            Some(existing) if existing >= incoming => existing,
            _ => incoming,
        }
    }
}

/// Keeps the smallest value seen
pub struct Min;

impl Combinator for Min {
    fn combine(existing: Option<Number>, incoming: Number) -> Number {
        match existing {
            Some(existing) if existing <= incoming => existing,
            _ => incoming,
        }
    }
}

/// Preserves the most recently combined value
pub struct KeepLast;

impl Combinator for KeepLast {
    fn combine(_existing: Option<Number>, incoming: Number) -> Number {
        incoming
    }
}

/// Combine every value of every summary into one map, using the strategy `C`.
///
/// Summaries store pre-serialized scalars; a value that does not parse as a number fails the
/// whole call with [`SummaryError::InvalidValue`].
pub fn summarize<C: Combinator>(
    summaries: impl IntoIterator<Item = Summary>,
) -> Result<Summarized, SummaryError> {
    summarize_matching::<C>(summaries, |_| true)
}

/// [`summarize`] with the [`Sum`] strategy
pub fn summarize_sum(
    summaries: impl IntoIterator<Item = Summary>,
) -> Result<Summarized, SummaryError> {
    summarize::<Sum>(summaries)
}

pub(crate) fn summarize_matching<C: Combinator>(
    summaries: impl IntoIterator<Item = Summary>,
    mut include: impl FnMut(&str) -> bool,
) -> Result<Summarized, SummaryError> {
    let mut results = Summarized::new();
    let mut count = 0usize;

    for summary in summaries {
        count += 1;
        for (key, raw) in summary.values() {
            if !include(key.as_str()) {
                continue;
            }
            let value = raw
                .parse::<Number>()
                .map_err(|_| SummaryError::InvalidValue {
                    key: key.clone(),
                    value: raw.clone(),
                })?;
            fold_into::<C>(&mut results, key.clone(), value);
        }
    }

    tracing::debug!(count, "combined summaries");
    Ok(results)
}

/// Merge `second` into `first` and return `first`.
///
/// Keys present in only one map are kept as they are, keys present in both are combined with
/// `C` (the value from `first` is the existing one).
pub fn merge_result_maps<C: Combinator>(mut first: Summarized, second: Summarized) -> Summarized {
    for (key, value) in second {
        fold_into::<C>(&mut first, key, value);
    }
    first
}

fn fold_into<C: Combinator>(results: &mut Summarized, key: String, value: Number) {
    match results.entry(key) {
        Entry::Occupied(mut occupied) => {
            let existing = *occupied.get();
            *occupied.get_mut() = C::combine(Some(existing), value);
        }
        Entry::Vacant(vacant) => {
            vacant.insert(C::combine(None, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, 4, 4)]
    #[case(Some(3), 4, 7)]
    fn sum_combines(#[case] existing: Option<i64>, #[case] incoming: i64, #[case] expected: i64) {
        check!(Sum::combine(existing.map(Number::from), incoming.into()) == expected.into());
    }

    #[test]
    fn max_min_and_last() {
        check!(Max::combine(Some(3.into()), 2.into()) == Number::from(3));
        check!(Max::combine(Some(3.into()), 9.into()) == Number::from(9));
        check!(Min::combine(Some(3.into()), 2.into()) == Number::from(2));
        check!(Min::combine(None, 8.into()) == Number::from(8));
        check!(KeepLast::combine(Some(3.into()), 1.into()) == Number::from(1));
    }

    #[test]
    fn merge_result_maps_unions_keys() {
        let first = Summarized::from([("a".to_string(), 1.into()), ("b".to_string(), 2.into())]);
        let second = Summarized::from([("b".to_string(), 5.into()), ("c".to_string(), 7.into())]);

        let merged = merge_result_maps::<Sum>(first, second);
        check!(merged.len() == 3);
        check!(merged["a"] == Number::from(1));
        check!(merged["b"] == Number::from(7));
        check!(merged["c"] == Number::from(7));
    }

    #[test]
    fn merge_result_maps_respects_strategy() {
        let first = Summarized::from([("b".to_string(), 2.into())]);
        let second = Summarized::from([("b".to_string(), 5.into())]);
        check!(merge_result_maps::<Min>(first, second)["b"] == Number::from(2));
    }
}
