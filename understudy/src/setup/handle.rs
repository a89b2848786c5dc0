use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use super::{CallResponse, FluentSetup, QueueStep, Response, Returns, Setup};
use crate::{
    Error, Method, Mock, Result, Times, Value, ValueFn, ValueFunction,
    handler::{adapt, check_return_type, check_return_value},
};

/// Configures the response of a freshly registered setup.
///
/// Returned by [`Mock::setup`]. Each configuring call validates its input
/// against the target method and fails with [`Error::InvalidSetup`] right
/// away.
///
/// # Example
///
/// ```rust,ignore
/// mock.setup(Call::new(get, [Arg::from("a")]))?
///     .callback(|key: String| println!("get({key})"))?
///     .returns(1)?
///     .verifiable();
/// ```
#[derive(Clone)]
pub struct SetupHandle {
    mock: Mock,
    setup: Arc<Setup>,
    fluent: FluentSetup,
}

impl SetupHandle {
    pub(crate) fn new(mock: Mock, setup: Arc<Setup>, fluent: FluentSetup) -> Self {
        Self {
            mock,
            setup,
            fluent,
        }
    }

    /// The substitute the terminal setup was registered on.
    pub fn mock(&self) -> &Mock {
        &self.mock
    }

    pub fn setup(&self) -> &Arc<Setup> {
        &self.setup
    }

    /// All hops of the registration, root first.
    pub fn fluent(&self) -> &FluentSetup {
        &self.fluent
    }

    fn method(&self) -> Result<&Method> {
        self.setup
            .shape()
            .map(|s| s.method())
            .ok_or_else(|| Error::invalid_setup(&*self.setup, "setup has no call shape"))
    }

    fn update(self, f: impl FnOnce(&mut CallResponse)) -> Result<Self> {
        let applied = self.setup.configure(|response| match response {
            Response::Void(r) | Response::Value(r) => {
                f(r);
                true
            }
            _ => false,
        });
        if applied {
            Ok(self)
        } else {
            Err(Error::invalid_setup(
                &*self.setup,
                "response cannot be configured on this setup",
            ))
        }
    }

    /// Return a fixed value.
    pub fn returns(self, value: impl Into<Value>) -> Result<Self> {
        let value = value.into();
        check_return_value(self.method()?, &value)?;
        self.update(|r| r.returns = Some(Returns::Value(value)))
    }

    /// Return the result of a typed closure over the call's arguments.
    pub fn returns_with<Args, F: ValueFunction<Args>>(self, f: F) -> Result<Self> {
        let method = self.method()?;
        check_return_type(method, &F::return_type())?;
        let f = adapt(method, f)?;
        self.update(|r| r.returns = Some(Returns::Func(f)))
    }

    /// Return the result of a closure over the raw argument list.
    pub fn returns_dynamic<F>(self, f: F) -> Result<Self>
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let method = self.method()?;
        if method.is_void() {
            return Err(Error::invalid_setup(method, "a void method cannot return a value"));
        }
        let f: ValueFn = Arc::new(f);
        self.update(|r| r.returns = Some(Returns::Func(f)))
    }

    /// Fail matching calls with `error`.
    pub fn throws(self, error: impl std::error::Error + Send + Sync + 'static) -> Result<Self> {
        self.throws_error(Error::external(error))
    }

    /// Fail matching calls with an already wrapped error.
    pub fn throws_error(self, error: Error) -> Result<Self> {
        self.update(|r| r.throws = Some(error))
    }

    /// Run a typed closure before answering.
    pub fn callback<Args, F: ValueFunction<Args>>(self, f: F) -> Result<Self> {
        let f = adapt(self.method()?, f)?;
        self.update(|r| r.callback = Some(f))
    }

    /// Run a closure over the raw argument list before answering.
    pub fn callback_dynamic<F>(self, f: F) -> Result<Self>
    where
        F: Fn(&[Value]) -> Result + Send + Sync + 'static,
    {
        let f: ValueFn = Arc::new(move |args: &[Value]| f(args).map(|_| Value::Unit));
        self.update(|r| r.callback = Some(f))
    }

    /// Delegate matching calls to the method's base implementation.
    pub fn call_base(self) -> Result<Self> {
        let method = self.method()?;
        if !method.has_body() {
            return Err(Error::invalid_setup(method, "member has no base implementation"));
        }
        self.update(|r| r.call_base = true)
    }

    /// Raise `event` on the substitute with `args` whenever the setup runs.
    pub fn raises(self, event: &str, args: Vec<Value>) -> Result<Self> {
        if self.mock.contract().event(event).is_none() {
            return Err(Error::invalid_setup(
                &*self.setup,
                format!("{} has no event '{event}'", self.mock.contract().name()),
            ));
        }
        let event: Arc<str> = Arc::from(event);
        self.update(|r| r.raise = Some((event, args)))
    }

    /// Fail every matching call after the first `n`.
    pub fn at_most(self, n: usize) -> Result<Self> {
        self.update(|r| r.limit = Some(n))
    }

    pub fn at_most_once(self) -> Result<Self> {
        self.at_most(1)
    }

    /// Include the setup in [`Mock::verify`]; it must match at least once.
    pub fn verifiable(self) -> Self {
        self.setup.set_verifiable(Times::at_least_once());
        self
    }

    /// Include the setup in [`Mock::verify`] with an expected call count.
    pub fn verifiable_with(self, times: Times) -> Self {
        self.setup.set_verifiable(times);
        self
    }

    /// Verify every hop of this registration, see [`FluentSetup::verify`].
    pub fn verify(&self) -> Result {
        self.fluent.verify()
    }
}

/// Configures a queue of answers consumed one per matching call.
///
/// Returned by [`Mock::setup_sequence`]. Once the queue is exhausted, calls
/// complete without a result or with the default value.
#[derive(Clone)]
pub struct ResponseQueue {
    method: Method,
    queue: Arc<Mutex<VecDeque<QueueStep>>>,
}

impl ResponseQueue {
    pub(crate) fn new(method: Method, queue: Arc<Mutex<VecDeque<QueueStep>>>) -> Self {
        Self { method, queue }
    }

    fn push(self, step: QueueStep) -> Self {
        self.queue.lock().push_back(step);
        self
    }

    pub fn returns(self, value: impl Into<Value>) -> Result<Self> {
        let value = value.into();
        check_return_value(&self.method, &value)?;
        Ok(self.push(QueueStep::Value(value)))
    }

    pub fn returns_with<Args, F: ValueFunction<Args>>(self, f: F) -> Result<Self> {
        check_return_type(&self.method, &F::return_type())?;
        let f = adapt(&self.method, f)?;
        Ok(self.push(QueueStep::Func(f)))
    }

    pub fn throws(self, error: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.push(QueueStep::Throw(Error::external(error)))
    }

    pub fn throws_error(self, error: Error) -> Self {
        self.push(QueueStep::Throw(error))
    }

    /// Answer one call as if nothing had been configured.
    pub fn pass(self) -> Self {
        self.push(QueueStep::Pass)
    }

    pub fn call_base(self) -> Result<Self> {
        if !self.method.has_body() {
            return Err(Error::invalid_setup(
                &self.method,
                "member has no base implementation",
            ));
        }
        Ok(self.push(QueueStep::Base))
    }

    /// Number of answers left.
    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }
}
