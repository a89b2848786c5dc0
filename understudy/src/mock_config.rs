/// How a substitute answers calls no setup claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MockBehavior {
    /// Unclaimed calls return a default value.
    #[default]
    Loose,
    /// Unclaimed calls fail with [`Error::NoSetup`](crate::Error::NoSetup),
    /// and value setups without a configured result fail with
    /// [`Error::ReturnValueRequired`](crate::Error::ReturnValueRequired).
    Strict,
}

/// Which default values a loose substitute hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DefaultValue {
    /// Zero, false, empty list or null.
    #[default]
    Empty,
    /// Like `Empty`, but mockable contract types get a fresh inner substitute.
    Mock,
}

/// Per-substitute configuration.
///
/// Inner substitutes created for fluent setups and default values inherit
/// the configuration of their parent.
///
/// # Examples
///
/// ```rust
/// use understudy::{DefaultValue, MockBehavior, MockConfig};
///
/// let config = MockConfig::default()
///     .with_behavior(MockBehavior::Strict)
///     .with_default_value(DefaultValue::Mock);
///
/// assert!(config.is_strict());
/// assert!(!config.call_base());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MockConfig {
    behavior: MockBehavior,
    call_base: bool,
    default_value: DefaultValue,
}

impl MockConfig {
    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn behavior(&self) -> MockBehavior {
        self.behavior
    }

    pub fn is_strict(&self) -> bool {
        self.behavior == MockBehavior::Strict
    }

    /// Let unclaimed calls on members with a base implementation run that
    /// implementation instead of returning a default.
    pub fn with_call_base(mut self, call_base: bool) -> Self {
        self.call_base = call_base;
        self
    }

    pub fn call_base(&self) -> bool {
        self.call_base
    }

    pub fn with_default_value(mut self, default_value: DefaultValue) -> Self {
        self.default_value = default_value;
        self
    }

    pub fn default_value(&self) -> DefaultValue {
        self.default_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_loose_and_empty() {
        let config = MockConfig::default();
        assert_eq!(config.behavior(), MockBehavior::Loose);
        assert_eq!(config.default_value(), DefaultValue::Empty);
        assert!(!config.call_base());
    }

    #[test]
    fn builders_set_each_field() {
        let config = MockConfig::default()
            .with_behavior(MockBehavior::Strict)
            .with_call_base(true)
            .with_default_value(DefaultValue::Mock);
        assert!(config.is_strict());
        assert!(config.call_base());
        assert_eq!(config.default_value(), DefaultValue::Mock);
    }
}
