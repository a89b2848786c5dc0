use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
};

use parking_lot::{Mutex, RwLock};

use crate::{Error, Method, Mock, SetupId, Value};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Verification progress of an [`Invocation`]. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum VerificationState {
    Invoked = 0,
    MatchedBySetup = 1,
    MatchedByVerifiableSetup = 2,
    Verified = 3,
}

impl VerificationState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => VerificationState::Invoked,
            1 => VerificationState::MatchedBySetup,
            2 => VerificationState::MatchedByVerifiableSetup,
            _ => VerificationState::Verified,
        }
    }
}

/// How an intercepted call completed.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Pending,
    Returned(Value),
    /// The call was delegated to the base implementation.
    ReturnedBase,
    Threw(Error),
}

/// Record of one call made against a substitute.
pub struct Invocation {
    seq: u64,
    method: Method,
    arguments: RwLock<Vec<Value>>,
    outcome: Mutex<Outcome>,
    state: AtomicU8,
    matched_setup: Mutex<Option<SetupId>>,
}

impl Invocation {
    pub(crate) fn new(method: Method, arguments: Vec<Value>) -> Self {
        Self {
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
            method,
            arguments: RwLock::new(arguments),
            outcome: Mutex::new(Outcome::Pending),
            state: AtomicU8::new(VerificationState::Invoked as u8),
            matched_setup: Mutex::new(None),
        }
    }

    /// Process-wide position of this call. Calls on different substitutes
    /// can be ordered by comparing it.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Argument values, including values written back to output parameters.
    pub fn arguments(&self) -> Vec<Value> {
        self.arguments.read().clone()
    }

    pub(crate) fn with_arguments<R>(&self, f: impl FnOnce(&[Value]) -> R) -> R {
        f(&self.arguments.read())
    }

    pub(crate) fn write_argument(&self, index: usize, value: Value) {
        if let Some(slot) = self.arguments.write().get_mut(index) {
            *slot = value;
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome.lock().clone()
    }

    pub(crate) fn complete(&self, outcome: Outcome) {
        *self.outcome.lock() = outcome;
    }

    /// The substitute this call returned, if it returned one.
    pub fn returned_mock(&self) -> Option<Mock> {
        match &*self.outcome.lock() {
            Outcome::Returned(Value::Mock(m)) => Some(m.clone()),
            _ => None,
        }
    }

    pub fn state(&self) -> VerificationState {
        VerificationState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_verified(&self) -> bool {
        self.state() == VerificationState::Verified
    }

    /// Move the state forward to `state`. Never moves it back.
    pub(crate) fn advance(&self, state: VerificationState) {
        self.state.fetch_max(state as u8, Ordering::AcqRel);
    }

    /// Setup that answered this call, if any.
    pub fn matched_setup(&self) -> Option<SetupId> {
        *self.matched_setup.lock()
    }

    pub(crate) fn set_matched_setup(&self, id: SetupId) {
        *self.matched_setup.lock() = Some(id);
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.method.declaring().name(), self.method.name())?;
        let generic_args = self.method.generic_args();
        if !generic_args.is_empty() {
            let args: Vec<String> = generic_args.iter().map(ToString::to_string).collect();
            write!(f, "<{}>", args.join(", "))?;
        }
        let args: Vec<String> = self.arguments.read().iter().map(ToString::to_string).collect();
        write!(f, "({})", args.join(", "))
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("seq", &self.seq)
            .field("call", &self.to_string())
            .field("state", &self.state())
            .finish()
    }
}

/// Append-only call history of one substitute.
#[derive(Default)]
pub(crate) struct InvocationLog {
    entries: Mutex<Vec<Arc<Invocation>>>,
}

impl InvocationLog {
    pub(crate) fn append(&self, invocation: Arc<Invocation>) {
        self.entries.lock().push(invocation);
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Copy of the current entries. Later appends do not affect it.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Invocation>> {
        self.entries.lock().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
