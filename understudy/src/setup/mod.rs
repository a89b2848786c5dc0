//! Setups: registered (pattern, response) pairs.

mod fluent;
mod handle;
mod registry;
mod response;

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use parking_lot::{Mutex, RwLock};

use crate::{CallShape, Contract, Invocation, Method, Mock, Times, sequence::StepCondition};

pub use fluent::FluentSetup;
pub use handle::{ResponseQueue, SetupHandle};
pub(crate) use fluent::resolve_chain;
pub(crate) use registry::{Resolution, SetupRegistry};
pub(crate) use response::{CallResponse, QueueStep, Response, Returns};

static NEXT_SETUP_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a setup, unique within the process and increasing in
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetupId(u64);

impl SetupId {
    fn next() -> Self {
        Self(NEXT_SETUP_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SetupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Guard that makes a setup eligible only some of the time.
#[derive(Clone)]
pub(crate) enum Condition {
    /// User predicate registered through [`Mock::when`].
    When(Arc<dyn Fn() -> bool + Send + Sync>),
    /// Position of the setup in a [`Sequence`](crate::Sequence).
    Step(StepCondition),
}

impl Condition {
    pub(crate) fn holds(&self) -> bool {
        match self {
            Condition::When(f) => f(),
            Condition::Step(step) => step.holds(),
        }
    }

    pub(crate) fn on_selected(&self) {
        if let Condition::Step(step) = self {
            step.on_selected();
        }
    }
}

/// Which calls a setup claims.
pub(crate) enum Pattern {
    Call(CallShape),
    /// Both accessors of one property.
    Property {
        name: Arc<str>,
        getter: Option<CallShape>,
        setter: Option<CallShape>,
    },
    /// Every property accessor of the substitute's contract.
    AllProperties(Arc<Contract>),
}

impl Pattern {
    pub(crate) fn is_match(&self, invocation: &Invocation) -> bool {
        match self {
            Pattern::Call(shape) => shape.is_match(invocation),
            Pattern::Property { getter, setter, .. } => {
                getter.iter().chain(setter).any(|s| s.is_match(invocation))
            }
            Pattern::AllProperties(contract) => {
                let method = invocation.method();
                method.kind().is_property_accessor() && contract.declares(method)
            }
        }
    }

    /// Returns true if the pattern names exactly `method`.
    pub(crate) fn is_exact(&self, method: &Method) -> bool {
        match self {
            Pattern::Call(shape) => shape.is_exact(method),
            Pattern::Property { getter, setter, .. } => {
                getter.iter().chain(setter).any(|s| s.is_exact(method))
            }
            Pattern::AllProperties(_) => false,
        }
    }

    pub(crate) fn equivalent(&self, other: &Pattern) -> bool {
        match (self, other) {
            (Pattern::Call(a), Pattern::Call(b)) => a.equivalent(b),
            (Pattern::Property { getter: ag, .. }, Pattern::Property { getter: bg, .. }) => {
                match (ag, bg) {
                    (Some(a), Some(b)) => a.method().is_same(b.method()),
                    _ => false,
                }
            }
            (Pattern::AllProperties(a), Pattern::AllProperties(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn is_property(&self) -> bool {
        matches!(self, Pattern::Property { .. } | Pattern::AllProperties(_))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Call(shape) => write!(f, "{shape}"),
            Pattern::Property { name, getter, setter } => {
                let owner = getter
                    .iter()
                    .chain(setter)
                    .next()
                    .map(|s| s.method().declaring().name().to_string())
                    .unwrap_or_default();
                write!(f, "{owner}.{name} (property)")
            }
            Pattern::AllProperties(contract) => write!(f, "{}.* (all properties)", contract.name()),
        }
    }
}

/// A registered setup.
///
/// Obtained through [`Mock::setups`] for inspection; configured through the
/// [`SetupHandle`] returned at registration.
pub struct Setup {
    id: SetupId,
    pattern: Pattern,
    condition: RwLock<Option<Condition>>,
    response: Mutex<Response>,
    verifiable: Mutex<Option<Times>>,
    executions: AtomicUsize,
}

impl Setup {
    pub(crate) fn new(pattern: Pattern, response: Response, condition: Option<Condition>) -> Self {
        Self {
            id: SetupId::next(),
            pattern,
            condition: RwLock::new(condition),
            response: Mutex::new(response),
            verifiable: Mutex::new(None),
            executions: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> SetupId {
        self.id
    }

    /// The call shape, for setups registered against a single call.
    pub fn shape(&self) -> Option<&CallShape> {
        match &self.pattern {
            Pattern::Call(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.read().is_some()
    }

    pub fn is_verifiable(&self) -> bool {
        self.verifiable.lock().is_some()
    }

    /// Expected call count for verifiable setups.
    pub fn expected_times(&self) -> Option<Times> {
        *self.verifiable.lock()
    }

    /// How many times the setup's response ran.
    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::Acquire)
    }

    /// The substitute returned by an inner-mock setup.
    pub fn inner_mock(&self) -> Option<Mock> {
        match &*self.response.lock() {
            Response::InnerMock(m) => Some(m.clone()),
            _ => None,
        }
    }

    pub(crate) fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub(crate) fn condition(&self) -> Option<Condition> {
        self.condition.read().clone()
    }

    pub(crate) fn set_condition(&self, condition: Condition) {
        *self.condition.write() = Some(condition);
    }

    pub(crate) fn step(&self) -> Option<StepCondition> {
        match &*self.condition.read() {
            Some(Condition::Step(step)) => Some(step.clone()),
            _ => None,
        }
    }

    pub(crate) fn set_verifiable(&self, times: Times) {
        *self.verifiable.lock() = Some(times);
    }

    pub(crate) fn configure<R>(&self, f: impl FnOnce(&mut Response) -> R) -> R {
        f(&mut self.response.lock())
    }

    /// Substitute this setup hands out: the inner mock of a fluent hop or a
    /// mock configured as the constant return value.
    pub(crate) fn returned_mock(&self) -> Option<Mock> {
        match &*self.response.lock() {
            Response::InnerMock(m) => Some(m.clone()),
            Response::Value(CallResponse {
                returns: Some(Returns::Value(crate::Value::Mock(m))),
                ..
            }) => Some(m.clone()),
            _ => None,
        }
    }

    pub(crate) fn is_inner_mock(&self) -> bool {
        matches!(&*self.response.lock(), Response::InnerMock(_))
    }
}

impl fmt::Display for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

impl fmt::Debug for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setup")
            .field("id", &self.id)
            .field("pattern", &self.pattern.to_string())
            .field("conditional", &self.is_conditional())
            .field("verifiable", &self.is_verifiable())
            .finish()
    }
}
