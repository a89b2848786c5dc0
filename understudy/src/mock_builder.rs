use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    Contract, DefaultValue, DefaultValueProvider, EmptyDefaults, Error, Mock, MockBehavior,
    MockConfig, MockDefaults, Result,
};

static NEXT_MOCK: AtomicU64 = AtomicU64::new(1);

/// Builder for substitutes with custom options.
///
/// Returned by [`Mock::builder`]. Without further options it produces the
/// same substitute as [`Mock::new`].
///
/// # Examples
///
/// ```rust,ignore
/// let repo = Mock::builder(&contract)
///     .name("repo")
///     .behavior(MockBehavior::Strict)
///     .build()?;
///
/// // Custom defaults for unconfigured results
/// let repo = Mock::builder(&contract)
///     .default_value_provider(MyDefaults)
///     .build()?;
/// ```
pub struct MockBuilder {
    contract: Arc<Contract>,
    name: Option<String>,
    config: MockConfig,
    provider: Option<Arc<dyn DefaultValueProvider>>,
}

impl MockBuilder {
    pub(crate) fn new(contract: &Arc<Contract>) -> Self {
        Self {
            contract: contract.clone(),
            name: None,
            config: MockConfig::default(),
            provider: None,
        }
    }

    /// Name shown in diagnostics. Defaults to the contract name with a
    /// process-wide counter, e.g. `IRepository:3`.
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Replace the entire [`MockConfig`].
    pub fn config(mut self, config: MockConfig) -> Self {
        self.config = config;
        self
    }

    /// Transform the current [`MockConfig`] with a closure.
    pub fn with_config<F>(mut self, f: F) -> Self
    where
        F: FnOnce(MockConfig) -> MockConfig,
    {
        self.config = f(self.config);
        self
    }

    /// Shorthand for [`MockConfig::with_behavior`].
    pub fn behavior(mut self, behavior: MockBehavior) -> Self {
        self.config = self.config.with_behavior(behavior);
        self
    }

    /// Use `provider` for results no setup configures, instead of the one
    /// selected by [`MockConfig::default_value`].
    pub fn default_value_provider(mut self, provider: impl DefaultValueProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    pub(crate) fn shared_provider(mut self, provider: Arc<dyn DefaultValueProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Create the substitute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotMockable`] for sealed classes.
    pub fn build(self) -> Result<Mock> {
        if !self.contract.is_mockable() {
            return Err(Error::TypeNotMockable(self.contract.name().to_string()));
        }
        let name = self.name.unwrap_or_else(|| {
            format!(
                "{}:{}",
                self.contract.name(),
                NEXT_MOCK.fetch_add(1, Ordering::Relaxed)
            )
        });
        let provider = self
            .provider
            .unwrap_or_else(|| match self.config.default_value() {
                DefaultValue::Empty => Arc::new(EmptyDefaults),
                DefaultValue::Mock => Arc::new(MockDefaults),
            });
        Ok(Mock::from_parts(name, self.contract, self.config, provider))
    }
}
