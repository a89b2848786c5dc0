use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    CallChain, CallShape, Contract, DefaultValueProvider, Delegate, Error, Invocation, Matcher,
    Method, MethodKind, MockBuilder, MockConfig, MockId, Outcome, Property, Result, Setup,
    TypeRef, Value, VerificationState,
    invocation::InvocationLog,
    setup::{
        CallResponse, Condition, FluentSetup, Pattern, Resolution, Response, ResponseQueue,
        SetupHandle, SetupRegistry, resolve_chain,
    },
};

/// How the proxy layer should complete an intercepted call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(Value),
    /// Complete without a result.
    Void,
    /// Run the method's base implementation.
    Base,
}

/// Result of [`Mock::dispatch`]: the reply plus the argument slots, which
/// may carry values written back to output parameters.
#[derive(Debug, Clone)]
pub struct Dispatch {
    reply: Reply,
    arguments: Vec<Value>,
}

impl Dispatch {
    pub fn reply(&self) -> &Reply {
        &self.reply
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn into_reply(self) -> Reply {
        self.reply
    }
}

struct MockInner {
    id: MockId,
    name: Arc<str>,
    contract: Arc<Contract>,
    config: MockConfig,
    defaults: Arc<dyn DefaultValueProvider>,
    registry: SetupRegistry,
    log: InvocationLog,
    handlers: Mutex<HashMap<Arc<str>, Vec<Delegate>>>,
}

/// A substitute for a [`Contract`].
///
/// `Mock` is a cheap handle; clones share setups and call history. The proxy
/// layer forwards intercepted calls to [`dispatch`](Mock::dispatch) or
/// [`call`](Mock::call); tests register setups and verify calls.
///
/// # Example
///
/// ```rust
/// use understudy::{Arg, Call, Contract, Mock, Param, Times, TypeRef, Value};
///
/// let contract = Contract::interface("IRepository")
///     .method("get", [Param::new("key", TypeRef::Str)], TypeRef::Int)
///     .build();
/// let get = contract.method("get").unwrap().clone();
///
/// let repo = Mock::new(&contract)?;
/// repo.setup(Call::new(&get, [Arg::from("a")]))?.returns(1)?;
///
/// assert_eq!(repo.call(&get, vec![Value::from("a")])?, Value::Int(1));
/// repo.verify_call(Call::new(&get, [Arg::from("a")]), Times::once())?;
/// # Ok::<(), understudy::Error>(())
/// ```
#[derive(Clone)]
pub struct Mock(Arc<MockInner>);

impl Mock {
    /// Create a loose substitute with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotMockable`] for sealed classes.
    pub fn new(contract: &Arc<Contract>) -> Result<Self> {
        Self::builder(contract).build()
    }

    pub fn with_config(contract: &Arc<Contract>, config: MockConfig) -> Result<Self> {
        Self::builder(contract).config(config).build()
    }

    pub fn builder(contract: &Arc<Contract>) -> MockBuilder {
        MockBuilder::new(contract)
    }

    pub(crate) fn from_parts(
        name: String,
        contract: Arc<Contract>,
        config: MockConfig,
        defaults: Arc<dyn DefaultValueProvider>,
    ) -> Self {
        Self(Arc::new(MockInner {
            id: MockId::random(),
            name: Arc::from(name),
            contract,
            config,
            defaults,
            registry: SetupRegistry::default(),
            log: InvocationLog::default(),
            handlers: Mutex::new(HashMap::new()),
        }))
    }

    pub fn id(&self) -> MockId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn contract(&self) -> &Arc<Contract> {
        &self.0.contract
    }

    pub fn config(&self) -> &MockConfig {
        &self.0.config
    }

    pub fn is_strict(&self) -> bool {
        self.0.config.is_strict()
    }

    pub(crate) fn default_value(&self, ty: &TypeRef) -> Value {
        self.0.defaults.default_value(ty, self)
    }

    pub(crate) fn registry(&self) -> &SetupRegistry {
        &self.0.registry
    }

    pub(crate) fn log(&self) -> &InvocationLog {
        &self.0.log
    }

    /// Builder for an inner substitute sharing this one's configuration and
    /// default value provider.
    pub(crate) fn inner_builder(&self, contract: &Arc<Contract>) -> MockBuilder {
        MockBuilder::new(contract)
            .config(self.0.config)
            .shared_provider(self.0.defaults.clone())
    }

    /// Number of logged calls answered by `setup`.
    pub(crate) fn matched_count(&self, setup: &Setup) -> usize {
        self.0
            .log
            .snapshot()
            .iter()
            .filter(|i| i.matched_setup() == Some(setup.id()))
            .count()
    }

    /// Calls received so far, in arrival order.
    pub fn invocations(&self) -> Vec<Arc<Invocation>> {
        self.0.log.snapshot()
    }

    /// Registered setups, oldest first.
    pub fn setups(&self) -> Vec<Arc<Setup>> {
        self.0.registry.snapshot()
    }

    /// Forget every recorded call. Setups are kept.
    pub fn clear_invocations(&self) {
        self.0.log.clear();
    }

    /// Register a setup for `chain`.
    ///
    /// Multi-hop chains create (or reuse) inner substitutes for every hop
    /// but the last; the returned handle configures the last hop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedExpression`] if the chain cannot be
    /// compiled and [`Error::TypeNotMockable`] if an intermediate hop does
    /// not return a mockable contract.
    pub fn setup(&self, chain: impl Into<CallChain>) -> Result<SetupHandle> {
        self.register(chain.into(), None)
    }

    /// Register a queue of answers for `chain`, consumed one per call.
    pub fn setup_sequence(&self, chain: impl Into<CallChain>) -> Result<ResponseQueue> {
        self.register_queue(chain.into(), None)
    }

    /// Store values set through `property` and return them from its getter.
    pub fn setup_property(&self, property: &Property) -> Result<Arc<Setup>> {
        self.stub_property(property, None)
    }

    /// Like [`setup_property`](Mock::setup_property), starting from `initial`.
    pub fn setup_property_with(
        &self,
        property: &Property,
        initial: impl Into<Value>,
    ) -> Result<Arc<Setup>> {
        self.stub_property(property, Some(initial.into()))
    }

    /// Store values for every property of the contract. Replaces earlier
    /// property stubs.
    pub fn setup_all_properties(&self) -> Result<Arc<Setup>> {
        let removed = self.0.registry.clear_where(|s| s.pattern().is_property());
        let setup = Arc::new(Setup::new(
            Pattern::AllProperties(self.0.contract.clone()),
            Response::AllProperties(Arc::new(Mutex::new(HashMap::new()))),
            None,
        ));
        self.0.registry.add(setup.clone());
        debug!(mock = %self.name(), replaced = removed, "stubbed all properties");
        Ok(setup)
    }

    /// Register setups that only apply while `condition` returns true.
    ///
    /// ```rust,ignore
    /// let online = Arc::new(AtomicBool::new(true));
    /// let flag = online.clone();
    /// mock.when(move || flag.load(Ordering::Relaxed))
    ///     .setup(Call::new(&fetch, [Arg::any(TypeRef::Str)]))?
    ///     .returns("remote")?;
    /// ```
    pub fn when<F>(&self, condition: F) -> ConditionalSetup<'_>
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        ConditionalSetup {
            mock: self,
            condition: Condition::When(Arc::new(condition)),
        }
    }

    fn register(&self, chain: CallChain, condition: Option<Condition>) -> Result<SetupHandle> {
        let (target, shape, mut parts) = resolve_chain(self, &chain)?;
        let response = if shape.method().is_void() {
            Response::Void(CallResponse::default())
        } else {
            Response::Value(CallResponse::default())
        };
        let setup = Arc::new(Setup::new(Pattern::Call(shape), response, condition));
        target.registry().add(setup.clone());
        debug!(mock = %target.name(), id = %setup.id(), setup = %setup, "setup registered");
        parts.push((target.clone(), setup.clone()));
        Ok(SetupHandle::new(target, setup, FluentSetup::new(parts)))
    }

    fn register_queue(
        &self,
        chain: CallChain,
        condition: Option<Condition>,
    ) -> Result<ResponseQueue> {
        let (target, shape, _) = resolve_chain(self, &chain)?;
        let method = shape.method().clone();
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let setup = Arc::new(Setup::new(
            Pattern::Call(shape),
            Response::Queue(queue.clone()),
            condition,
        ));
        target.registry().add(setup.clone());
        debug!(mock = %target.name(), id = %setup.id(), setup = %setup, "response queue registered");
        Ok(ResponseQueue::new(method, queue))
    }

    fn stub_property(&self, property: &Property, initial: Option<Value>) -> Result<Arc<Setup>> {
        let accessors: Vec<&Method> = property.getter().into_iter().chain(property.setter()).collect();
        let Some(first) = accessors.first() else {
            return Err(Error::invalid_setup(property.name(), "property has no accessors"));
        };
        if !self.0.contract.declares(first) {
            return Err(Error::invalid_setup(
                property.name(),
                format!("not a property of {}", self.0.contract.name()),
            ));
        }
        if let Some(m) = accessors.iter().find(|m| !m.is_overridable()) {
            return Err(Error::unsupported(format!(
                "non-overridable member {m} cannot be set up"
            )));
        }
        if let Some(value) = &initial {
            if !property.ty().accepts(value) {
                return Err(Error::invalid_setup(
                    property.name(),
                    format!("{value} is not a valid {}", property.ty()),
                ));
            }
        }

        let setup = Arc::new(Setup::new(
            Pattern::Property {
                name: Arc::from(property.name()),
                getter: property
                    .getter()
                    .map(|g| CallShape::new(g.clone(), Vec::new())),
                setter: property
                    .setter()
                    .map(|s| CallShape::new(s.clone(), vec![Matcher::any(property.ty().clone())])),
            },
            Response::Property(Arc::new(Mutex::new(initial))),
            None,
        ));
        self.0.registry.add(setup.clone());
        debug!(mock = %self.name(), setup = %setup, "property stubbed");
        Ok(setup)
    }

    /// Invoke the current handlers of `event` with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedExpression`] if the contract declares no
    /// such event.
    pub fn raise(&self, event: &str, args: &[Value]) -> Result {
        if self.0.contract.event(event).is_none() {
            return Err(Error::unsupported(format!(
                "{} has no event '{event}'",
                self.0.contract.name()
            )));
        }
        let handlers = self.0.handlers.lock().get(event).cloned().unwrap_or_default();
        trace!(mock = %self.name(), event, handlers = handlers.len(), "raise");
        for handler in handlers {
            handler.invoke(args);
        }
        Ok(())
    }

    /// Handle a call intercepted by the proxy layer.
    ///
    /// Records the call, selects the setup that answers it and runs that
    /// setup's response. Calls no setup claims are answered according to
    /// the substitute's [`MockConfig`].
    ///
    /// # Errors
    ///
    /// Errors configured with `throws`, [`Error::NoSetup`] and
    /// [`Error::ReturnValueRequired`] on strict substitutes, call-cap and
    /// sequence violations.
    pub fn dispatch(&self, method: &Method, arguments: Vec<Value>) -> Result<Dispatch> {
        let (invocation, reply) = self.intercept(method, arguments)?;
        Ok(Dispatch {
            reply: reply?,
            arguments: invocation.arguments(),
        })
    }

    /// Like [`dispatch`](Mock::dispatch), resolving [`Reply::Base`] by running
    /// the method's base implementation and [`Reply::Void`] as `Value::Unit`.
    pub fn call(&self, method: &Method, arguments: Vec<Value>) -> Result<Value> {
        let (invocation, reply) = self.intercept(method, arguments)?;
        match reply? {
            Reply::Value(v) => Ok(v),
            Reply::Void => Ok(Value::Unit),
            Reply::Base => {
                let Some(body) = invocation.method().body() else {
                    return Err(Error::unsupported(format!(
                        "{method} has no base implementation"
                    )));
                };
                let result = body(self, &invocation.arguments());
                invocation.complete(match &result {
                    Ok(v) => Outcome::Returned(v.clone()),
                    Err(e) => Outcome::Threw(e.clone()),
                });
                result
            }
        }
    }

    fn intercept(
        &self,
        method: &Method,
        arguments: Vec<Value>,
    ) -> Result<(Arc<Invocation>, Result<Reply>)> {
        if !self.0.contract.declares(method) {
            return Err(Error::unsupported(format!(
                "{method} is not a member of {}",
                self.0.contract.name()
            )));
        }
        let invocation = Arc::new(Invocation::new(method.clone(), arguments));
        trace!(mock = %self.name(), call = %invocation, "dispatch");
        self.0.log.append(invocation.clone());

        let reply = self.answer(&invocation);
        invocation.complete(match &reply {
            Ok(Reply::Value(v)) => Outcome::Returned(v.clone()),
            Ok(Reply::Void) => Outcome::Returned(Value::Unit),
            Ok(Reply::Base) => Outcome::ReturnedBase,
            Err(e) => Outcome::Threw(e.clone()),
        });
        Ok((invocation, reply))
    }

    fn answer(&self, invocation: &Arc<Invocation>) -> Result<Reply> {
        let Resolution {
            setup,
            out_of_order,
        } = self.0.registry.find_match(invocation);

        if let Some(step) = out_of_order {
            let message = step.record_violation(invocation);
            return Err(if self.is_strict() {
                Error::NoSetup {
                    call: invocation.to_string(),
                }
            } else {
                Error::Sequence(message)
            });
        }

        if let Some(setup) = setup {
            invocation.set_matched_setup(setup.id());
            invocation.advance(if setup.is_verifiable() {
                VerificationState::MatchedByVerifiableSetup
            } else {
                VerificationState::MatchedBySetup
            });
            if let Some(condition) = setup.condition() {
                condition.on_selected();
            }
            if let Some(shape) = setup.shape() {
                shape.confirm(invocation);
            }
            return setup.execute(self, invocation);
        }

        self.fallback(invocation)
    }

    /// Answer a call no setup claims.
    fn fallback(&self, invocation: &Invocation) -> Result<Reply> {
        let method = invocation.method();
        match method.kind() {
            MethodKind::EventAdd(event) => {
                if let Some(Value::Delegate(handler)) = invocation.arguments().into_iter().next() {
                    self.0
                        .handlers
                        .lock()
                        .entry(event.clone())
                        .or_default()
                        .push(handler);
                }
                return Ok(Reply::Void);
            }
            MethodKind::EventRemove(event) => {
                if let Some(Value::Delegate(handler)) = invocation.arguments().into_iter().next() {
                    if let Some(handlers) = self.0.handlers.lock().get_mut(event) {
                        if let Some(pos) = handlers.iter().position(|h| *h == handler) {
                            handlers.remove(pos);
                        }
                    }
                }
                return Ok(Reply::Void);
            }
            _ => {}
        }

        if self.0.config.call_base() && method.has_body() {
            return Ok(Reply::Base);
        }
        if self.is_strict() {
            return Err(Error::NoSetup {
                call: invocation.to_string(),
            });
        }
        if method.is_void() {
            return Ok(Reply::Void);
        }

        let value = self.default_value(method.returns());
        if let Value::Mock(inner) = &value {
            if method.returns().contract().is_some() {
                self.cache_default_mock(invocation, inner);
            }
        }
        Ok(Reply::Value(value))
    }

    /// Keep a default inner substitute reachable through an inner-mock setup,
    /// so repeated calls return it and fluent setups can reuse it.
    fn cache_default_mock(&self, invocation: &Invocation, inner: &Mock) {
        let matchers = invocation
            .arguments()
            .into_iter()
            .map(Matcher::eq)
            .collect();
        let setup = Arc::new(Setup::new(
            Pattern::Call(CallShape::new(invocation.method().clone(), matchers)),
            Response::InnerMock(inner.clone()),
            None,
        ));
        invocation.set_matched_setup(setup.id());
        self.0.registry.add(setup);
        debug!(mock = %self.name(), inner = %inner.name(), "cached default inner mock");
    }
}

impl PartialEq for Mock {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Mock {}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mock")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("contract", &self.0.contract.name())
            .field("setups", &self.0.registry.len())
            .field("invocations", &self.0.log.len())
            .finish()
    }
}

/// Registers setups guarded by a condition. Returned by [`Mock::when`].
pub struct ConditionalSetup<'a> {
    mock: &'a Mock,
    condition: Condition,
}

impl ConditionalSetup<'_> {
    pub fn setup(&self, chain: impl Into<CallChain>) -> Result<SetupHandle> {
        self.mock.register(chain.into(), Some(self.condition.clone()))
    }

    pub fn setup_sequence(&self, chain: impl Into<CallChain>) -> Result<ResponseQueue> {
        self.mock
            .register_queue(chain.into(), Some(self.condition.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::{Arg, Call, DefaultValue, MockBehavior, Param, Times};

    fn repo() -> Arc<Contract> {
        Contract::interface("IRepository")
            .method("get", [Param::new("key", TypeRef::Str)], TypeRef::Int)
            .method("put", [Param::new("key", TypeRef::Str)], TypeRef::Unit)
            .property("Name", TypeRef::Str)
            .event("Changed")
            .build()
    }

    fn get(c: &Contract) -> Method {
        c.method("get").unwrap().clone()
    }

    #[test]
    fn last_setup_wins() {
        let c = repo();
        let mock = Mock::new(&c).unwrap();
        mock.setup(Call::new(&get(&c), [Arg::from("a")]))
            .unwrap()
            .returns(1)
            .unwrap();
        mock.setup(Call::new(&get(&c), [Arg::from("a")]))
            .unwrap()
            .returns(2)
            .unwrap();
        assert_eq!(mock.call(&get(&c), vec![Value::from("a")]).unwrap(), Value::Int(2));
    }

    #[test]
    fn loose_mocks_answer_with_defaults() {
        let c = repo();
        let mock = Mock::new(&c).unwrap();
        assert_eq!(mock.call(&get(&c), vec![Value::from("x")]).unwrap(), Value::Int(0));
        let put = c.method("put").unwrap();
        let dispatch = mock.dispatch(put, vec![Value::from("x")]).unwrap();
        assert_eq!(dispatch.reply(), &Reply::Void);
        assert_eq!(mock.invocations().len(), 2);
    }

    #[test]
    fn strict_mocks_reject_unconfigured_calls() {
        let c = repo();
        let mock = Mock::with_config(&c, MockConfig::default().with_behavior(MockBehavior::Strict))
            .unwrap();
        let err = mock.call(&get(&c), vec![Value::from("x")]).unwrap_err();
        assert!(matches!(err, Error::NoSetup { .. }));

        mock.setup(Call::new(&get(&c), [Arg::any(TypeRef::Str)])).unwrap();
        let err = mock.call(&get(&c), vec![Value::from("x")]).unwrap_err();
        assert!(matches!(err, Error::ReturnValueRequired { .. }));
    }

    #[test]
    fn outcome_is_recorded() {
        let c = repo();
        let mock = Mock::new(&c).unwrap();
        mock.setup(Call::new(&get(&c), [Arg::from("a")]))
            .unwrap()
            .returns(7)
            .unwrap();
        mock.call(&get(&c), vec![Value::from("a")]).unwrap();
        let invocation = &mock.invocations()[0];
        assert_eq!(invocation.outcome(), Outcome::Returned(Value::Int(7)));
        assert_eq!(invocation.state(), VerificationState::MatchedBySetup);
        assert_eq!(invocation.matched_setup(), Some(mock.setups()[0].id()));
    }

    #[test]
    fn conditional_setups_follow_their_condition() {
        let c = repo();
        let mock = Mock::new(&c).unwrap();
        let online = Arc::new(AtomicBool::new(true));
        let flag = online.clone();
        mock.setup(Call::new(&get(&c), [Arg::any(TypeRef::Str)]))
            .unwrap()
            .returns(1)
            .unwrap();
        mock.when(move || flag.load(Ordering::Relaxed))
            .setup(Call::new(&get(&c), [Arg::from("a")]))
            .unwrap()
            .returns(2)
            .unwrap();

        assert_eq!(mock.call(&get(&c), vec![Value::from("a")]).unwrap(), Value::Int(2));
        online.store(false, Ordering::Relaxed);
        assert_eq!(mock.call(&get(&c), vec![Value::from("a")]).unwrap(), Value::Int(1));
    }

    #[test]
    fn property_stubs_store_values() {
        let c = repo();
        let mock = Mock::new(&c).unwrap();
        let name = c.property("Name").unwrap();
        mock.setup_property_with(name, "initial").unwrap();
        let getter = name.getter().unwrap();
        let setter = name.setter().unwrap();

        assert_eq!(mock.call(getter, vec![]).unwrap(), Value::from("initial"));
        mock.call(setter, vec![Value::from("changed")]).unwrap();
        assert_eq!(mock.call(getter, vec![]).unwrap(), Value::from("changed"));

        mock.setup_all_properties().unwrap();
        assert_eq!(mock.setups().len(), 1);
        assert!(mock.call(getter, vec![]).unwrap().is_null());
    }

    #[test]
    fn event_handlers_are_tracked() {
        let c = repo();
        let mock = Mock::new(&c).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let handler = Delegate::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            Value::Unit
        });
        let changed = c.event("Changed").unwrap();

        mock.call(changed.add(), vec![Value::Delegate(handler.clone())])
            .unwrap();
        mock.raise("Changed", &[]).unwrap();
        mock.call(changed.remove(), vec![Value::Delegate(handler)])
            .unwrap();
        mock.raise("Changed", &[]).unwrap();

        assert_eq!(fired.load(Ordering::Relaxed), 1);
        assert!(mock.raise("Missing", &[]).is_err());
    }

    #[test]
    fn recursive_defaults_are_cached() {
        let child = Contract::interface("IChild")
            .method("value", [], TypeRef::Int)
            .build();
        let root = Contract::interface("IRoot")
            .method("child", [], TypeRef::Contract(child.clone()))
            .build();
        let mock = Mock::with_config(
            &root,
            MockConfig::default().with_default_value(DefaultValue::Mock),
        )
        .unwrap();
        let child_method = root.method("child").unwrap();

        let first = mock.call(child_method, vec![]).unwrap();
        let second = mock.call(child_method, vec![]).unwrap();
        assert!(first.as_mock().is_some());
        assert_eq!(first, second);
        mock.verify_call(Call::new(child_method, []), Times::exactly(2))
            .unwrap();
    }

    #[test]
    fn base_implementations_run_through_call() {
        let body: crate::Body = Arc::new(|_: &Mock, args: &[Value]| {
            Ok(Value::Int(args[0].as_int().unwrap_or_default() * 2))
        });
        let c = Contract::class("Doubler")
            .method_with_body("double", [Param::new("n", TypeRef::Int)], TypeRef::Int, body)
            .build();
        let double = c.method("double").unwrap();

        let mock = Mock::with_config(&c, MockConfig::default().with_call_base(true)).unwrap();
        assert_eq!(mock.call(double, vec![Value::Int(4)]).unwrap(), Value::Int(8));
        assert_eq!(
            mock.invocations()[0].outcome(),
            Outcome::Returned(Value::Int(8))
        );

        let plain = Mock::new(&c).unwrap();
        assert_eq!(plain.call(double, vec![Value::Int(4)]).unwrap(), Value::Int(0));
        plain
            .setup(Call::new(double, [Arg::any(TypeRef::Int)]))
            .unwrap()
            .call_base()
            .unwrap();
        assert_eq!(
            plain.dispatch(double, vec![Value::Int(4)]).unwrap().into_reply(),
            Reply::Base
        );
    }

    #[test]
    fn conditions_and_matchers_may_call_the_same_mock() {
        let c = repo();
        let mock = Mock::new(&c).unwrap();
        let put = c.method("put").unwrap().clone();

        let (inner, inner_put) = (mock.clone(), put.clone());
        let seen = Matcher::is_value(move |v| {
            inner.call(&inner_put, vec![v.clone()]).is_ok()
        });
        mock.setup(Call::new(&get(&c), [Arg::from(seen)]))
            .unwrap()
            .returns(2)
            .unwrap();
        let (inner, inner_put) = (mock.clone(), put.clone());
        mock.when(move || inner.call(&inner_put, vec![Value::from("when")]).is_ok())
            .setup(Call::new(&get(&c), [Arg::from("a")]))
            .unwrap()
            .returns(1)
            .unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let (caller, method) = (mock.clone(), get(&c));
        std::thread::spawn(move || {
            let _ = tx.send(caller.call(&method, vec![Value::from("a")]));
        });
        let result = rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("call did not finish");
        assert_eq!(result.unwrap(), Value::Int(1));
        let nested = mock
            .invocations()
            .iter()
            .filter(|i| i.method().is_same(&put))
            .count();
        assert_eq!(nested, 2);
    }

    #[test]
    fn foreign_methods_are_rejected() {
        let c = repo();
        let other = Contract::interface("IOther")
            .method("get", [Param::new("key", TypeRef::Str)], TypeRef::Int)
            .build();
        let mock = Mock::new(&c).unwrap();
        assert!(mock.call(&get(&other), vec![Value::from("a")]).is_err());
        assert!(mock.invocations().is_empty());
    }
}
