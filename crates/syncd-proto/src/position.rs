//! Per-category stream positions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// How far a single category has been durably advanced.
///
/// Positions strictly increase within one category and are never reused.
/// Comparing positions of two different categories is meaningless.
/// [`StreamPosition::ZERO`] means "no data yet".
///
/// # Example
///
/// ```rust
/// use syncd_proto::StreamPosition;
///
/// let a = StreamPosition::new(5);
/// let b = StreamPosition::new(9);
/// assert!(b > a);
/// assert_eq!(a.max(b), b);
/// assert!(StreamPosition::ZERO.is_zero());
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StreamPosition(u64);

impl StreamPosition {
    /// The beginning of every stream.
    pub const ZERO: StreamPosition = StreamPosition(0);

    /// Wraps a raw counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns `true` if nothing has been written to the stream yet.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for StreamPosition {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<StreamPosition> for u64 {
    fn from(pos: StreamPosition) -> Self {
        pos.0
    }
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StreamPosition {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zero() {
        assert_eq!(StreamPosition::default(), StreamPosition::ZERO);
        assert!(StreamPosition::default().is_zero());
    }

    #[test]
    fn ordering_follows_value() {
        assert!(StreamPosition::new(2) > StreamPosition::new(1));
        assert_eq!(StreamPosition::new(7), StreamPosition::from(7));
    }

    #[test]
    fn parses_and_displays() {
        let pos: StreamPosition = "42".parse().unwrap();
        assert_eq!(pos.value(), 42);
        assert_eq!(pos.to_string(), "42");
        assert!("-1".parse::<StreamPosition>().is_err());
    }

    #[test]
    fn serializes_as_plain_number() {
        let json = serde_json::to_string(&StreamPosition::new(9)).unwrap();
        assert_eq!(json, "9");
    }
}
