use std::fmt;

use uuid::Uuid;

/// Identity of a [`Mock`](crate::Mock), stable across clones of the handle.
///
/// Displayed in UUID form so log lines from different runs stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MockId(u128);

impl MockId {
    pub(crate) fn random() -> Self {
        Self(Uuid::new_v4().as_u128())
    }
}

impl fmt::Display for MockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_u128(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_and_print_as_uuids() {
        let a = MockId::random();
        let b = MockId::random();
        assert_ne!(a, b);
        let text = a.to_string();
        assert_eq!(text.len(), 36);
        assert!(Uuid::parse_str(&text).is_ok());
    }
}
