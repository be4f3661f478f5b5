//! Numeric scalar carried by every metric

use std::{
    cmp::Ordering,
    fmt,
    ops::{Add, AddAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// A metric value.
///
/// Integers stay integral when added together (saturating at the `i64` bounds). As soon as a
/// float is involved the result is a float. Serializes as a bare number.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    /// A whole number
    Integer(i64),
    /// A floating point number
    Float(f64),
}

impl Number {
    /// Returns this value as an `f64`, which may lose precision for large integers
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Returns the integer value, if this is an integer
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::Integer(i) => Some(i),
            Number::Float(_) => None,
        }
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::Integer(0)
    }
}

impl Add for Number {
    type Output = Number;

    fn add(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Integer(a), Number::Integer(b)) => Number::Integer(a.saturating_add(b)),
            (a, b) => Number::Float(a.as_f64() + b.as_f64()),
        }
    }
}

impl AddAssign for Number {
    fn add_assign(&mut self, rhs: Number) {
        *self = *self + rhs;
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Integer(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::Integer(value.into())
    }
}

impl From<u32> for Number {
    fn from(value: u32) -> Self {
        Number::Integer(value.into())
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => fmt::Display::fmt(i, f),
            Number::Float(v) => fmt::Display::fmt(v, f),
        }
    }
}

/// Returned when a serialized scalar is not a finite number
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseNumberError(String);

impl fmt::Display for ParseNumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not a finite number", self.0)
    }
}

impl std::error::Error for ParseNumberError {}

impl FromStr for Number {
    type Err = ParseNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Ok(Number::Integer(i));
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Number::Float(f)),
            _ => Err(ParseNumberError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use rstest::rstest;

    use super::Number;

    #[test]
    fn integers_stay_integral() {
        check!(Number::from(2) + Number::from(3) == Number::Integer(5));
        check!((Number::from(2) + Number::from(3)).as_i64() == Some(5));
        check!(Number::Integer(i64::MAX) + Number::from(1) == Number::Integer(i64::MAX));
    }

    #[test]
    fn mixing_promotes_to_float() {
        let sum = Number::from(2) + Number::from(0.5);
        check!(sum.as_i64() == None);
        check!(sum.as_f64() == 2.5);
    }

    #[test]
    fn compares_across_representations() {
        check!(Number::from(2) == Number::from(2.0));
        check!(Number::from(3) > Number::from(2.5));
    }

    #[rstest]
    #[case("3", Number::Integer(3))]
    #[case(" -12 ", Number::Integer(-12))]
    #[case("2.5", Number::Float(2.5))]
    #[case("1e3", Number::Float(1000.0))]
    fn parses_serialized_scalars(#[case] input: &str, #[case] expected: Number) {
        check!(input.parse::<Number>() == Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("NaN")]
    #[case("inf")]
    fn rejects_non_numbers(#[case] input: &str) {
        check!(input.parse::<Number>().is_err());
    }
}
