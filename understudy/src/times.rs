use std::{fmt, hash};

use crate::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
enum Kind {
    AtLeast,
    AtLeastOnce,
    AtMost,
    AtMostOnce,
    BetweenExclusive,
    BetweenInclusive,
    Exactly,
    Once,
    Never,
}

/// How many times a call is expected to have happened.
///
/// Two `Times` are equal when they accept the same counts, so
/// `Times::exactly(0) == Times::never()`.
///
/// # Example
///
/// ```rust
/// use understudy::{Range, Times};
///
/// assert!(Times::at_least(2).validate(3));
/// assert!(!Times::between(1, 3, Range::Exclusive).validate(3));
/// assert_eq!(Times::exactly(0), Times::never());
/// ```
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Times {
    kind: Kind,
    from: usize,
    to: usize,
}

impl Times {
    pub fn at_least(n: usize) -> Self {
        Self {
            kind: Kind::AtLeast,
            from: n,
            to: usize::MAX,
        }
    }

    pub fn at_least_once() -> Self {
        Self {
            kind: Kind::AtLeastOnce,
            from: 1,
            to: usize::MAX,
        }
    }

    pub fn at_most(n: usize) -> Self {
        Self {
            kind: Kind::AtMost,
            from: 0,
            to: n,
        }
    }

    pub fn at_most_once() -> Self {
        Self {
            kind: Kind::AtMostOnce,
            from: 0,
            to: 1,
        }
    }

    /// Counts between `from` and `to`. Exclusive bounds are stored as
    /// `from + 1` and `to - 1`.
    pub fn between(from: usize, to: usize, range: Range) -> Self {
        match range {
            Range::Inclusive => Self {
                kind: Kind::BetweenInclusive,
                from,
                to,
            },
            Range::Exclusive => Self {
                kind: Kind::BetweenExclusive,
                from: from.saturating_add(1),
                to: to.saturating_sub(1),
            },
        }
    }

    pub fn exactly(n: usize) -> Self {
        Self {
            kind: Kind::Exactly,
            from: n,
            to: n,
        }
    }

    pub fn once() -> Self {
        Self {
            kind: Kind::Once,
            from: 1,
            to: 1,
        }
    }

    pub fn never() -> Self {
        Self {
            kind: Kind::Never,
            from: 0,
            to: 0,
        }
    }

    /// Lowest accepted count.
    pub fn lower_bound(&self) -> usize {
        self.from
    }

    /// Highest accepted count, `usize::MAX` when unbounded.
    pub fn upper_bound(&self) -> usize {
        self.to
    }

    /// Returns true if `count` satisfies this expectation.
    pub fn validate(&self, count: usize) -> bool {
        self.from <= count && count <= self.to
    }

    /// Failure text for an observed `count`, e.g.
    /// `"Expected invocation on the mock once, but was 0 times: "`.
    pub fn message(&self, count: usize) -> String {
        let expected = match self.kind {
            Kind::AtLeast => format!("at least {} times", self.from),
            Kind::AtLeastOnce => {
                return "Expected invocation on the mock at least once, but was never performed: "
                    .to_string();
            }
            Kind::AtMost => format!("at most {} times", self.to),
            Kind::AtMostOnce => "at most once".to_string(),
            Kind::BetweenExclusive => format!(
                "between {} and {} times (Exclusive)",
                self.from.saturating_sub(1),
                self.to.saturating_add(1)
            ),
            Kind::BetweenInclusive => {
                format!("between {} and {} times (Inclusive)", self.from, self.to)
            }
            Kind::Exactly => format!("exactly {} times", self.from),
            Kind::Once => "once".to_string(),
            Kind::Never => {
                return format!(
                    "Expected invocation on the mock should never have been performed, but was {count} times: "
                );
            }
        };
        format!("Expected invocation on the mock {expected}, but was {count} times: ")
    }
}

impl Default for Times {
    fn default() -> Self {
        Times::at_least_once()
    }
}

impl PartialEq for Times {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from && self.to == other.to
    }
}

impl Eq for Times {}

impl hash::Hash for Times {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.from.hash(state);
        self.to.hash(state);
    }
}

impl fmt::Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.from, self.to) {
            (from, usize::MAX) => write!(f, "{from}.."),
            (from, to) if from == to => write!(f, "{from}"),
            (from, to) => write!(f, "{from}..={to}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_zero_and_never_are_interchangeable() {
        let zero = Times::exactly(0);
        let never = Times::never();
        assert_eq!(zero, never);
        for count in 0..5 {
            assert_eq!(zero.validate(count), never.validate(count));
        }
        assert!(never.validate(0));
        assert!(!never.validate(1));
    }

    #[test]
    fn between_exclusive_shrinks_bounds() {
        let t = Times::between(1, 4, Range::Exclusive);
        assert_eq!((t.lower_bound(), t.upper_bound()), (2, 3));
        assert!(!t.validate(1));
        assert!(t.validate(2));
        assert!(t.validate(3));
        assert!(!t.validate(4));
        assert_eq!(t, Times::between(2, 3, Range::Inclusive));
    }

    #[test]
    fn open_ended_bounds() {
        assert!(Times::at_least(2).validate(usize::MAX));
        assert!(!Times::at_least(2).validate(1));
        assert!(Times::at_most(2).validate(0));
        assert!(!Times::at_most_once().validate(2));
        assert_eq!(Times::at_least_once(), Times::at_least(1));
        assert_eq!(Times::once(), Times::exactly(1));
    }

    #[test]
    fn messages_follow_the_kind() {
        assert_eq!(
            Times::once().message(0),
            "Expected invocation on the mock once, but was 0 times: "
        );
        assert_eq!(
            Times::at_least_once().message(0),
            "Expected invocation on the mock at least once, but was never performed: "
        );
        assert_eq!(
            Times::never().message(2),
            "Expected invocation on the mock should never have been performed, but was 2 times: "
        );
        assert_eq!(
            Times::between(1, 4, Range::Exclusive).message(7),
            "Expected invocation on the mock between 1 and 4 times (Exclusive), but was 7 times: "
        );
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(Times::at_least(2).to_string(), "2..");
        assert_eq!(Times::exactly(3).to_string(), "3");
        assert_eq!(Times::at_most(3).to_string(), "0..=3");
    }
}
