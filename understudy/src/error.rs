use std::{fmt, sync::Arc};

/// The single error type for all understudy operations.
///
/// Every fallible API returns `understudy::Result<T>` (alias for
/// `Result<T, understudy::Error>`). Configuration problems surface from the
/// registering call, dispatch failures from the intercepted call, and
/// verification failures only from the `verify*` family. Use
/// [`Error::reason`] to branch on the failure kind without matching on
/// variant payloads.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("Invalid setup on {call}: {detail}")]
    InvalidSetup { call: String, detail: String },

    #[error("Type '{0}' cannot be mocked")]
    TypeNotMockable(String),

    #[error(
        "{call} invocation failed with mock behavior Strict. All invocations on the mock must have a corresponding setup."
    )]
    NoSetup { call: String },

    #[error(
        "{call} invocation failed with mock behavior Strict. Invocation needs to return a value and therefore must have a corresponding setup that provides it."
    )]
    ReturnValueRequired { call: String },

    #[error("{call}: setup was limited to a single call but was invoked again")]
    MoreThanOneCall { call: String },

    #[error("{call}: setup was limited to {limit} calls but was invoked again")]
    MoreThanNCalls { call: String, limit: usize },

    #[error("{0}")]
    NoMatchingCalls(Box<CallMismatch>),

    #[error("Mock<{mock}>: the following setups were not matched:\n{}", bullets(.setups))]
    UnmatchedSetups { mock: String, setups: Vec<String> },

    #[error("Mock<{mock}>: the following invocations were not verified:\n{}", bullets(.invocations))]
    UnverifiedInvocations { mock: String, invocations: Vec<String> },

    #[error("Sequence violation: {0}")]
    Sequence(String),

    #[error("{0}")]
    External(#[source] Arc<dyn std::error::Error + Send + Sync>),

    #[error("{}", join_errors(.0))]
    Aggregate(Vec<Error>),
}

/// Stable failure category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum Reason {
    UnsupportedExpression,
    InvalidSetup,
    TypeNotMockable,
    NoSetup,
    ReturnValueRequired,
    MoreThanOneCall,
    MoreThanNCalls,
    NoMatchingCalls,
    UnmatchedSetups,
    UnverifiedInvocations,
    Sequence,
    External,
    Aggregate,
}

impl Error {
    /// Wrap an arbitrary error, e.g. one configured with `throws`.
    pub fn external(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::External(Arc::new(e))
    }

    pub(crate) fn unsupported(detail: impl Into<String>) -> Self {
        Error::UnsupportedExpression(detail.into())
    }

    pub(crate) fn invalid_setup(call: impl fmt::Display, detail: impl Into<String>) -> Self {
        Error::InvalidSetup {
            call: call.to_string(),
            detail: detail.into(),
        }
    }

    /// Returns the failure category.
    pub fn reason(&self) -> Reason {
        match self {
            Error::UnsupportedExpression(_) => Reason::UnsupportedExpression,
            Error::InvalidSetup { .. } => Reason::InvalidSetup,
            Error::TypeNotMockable(_) => Reason::TypeNotMockable,
            Error::NoSetup { .. } => Reason::NoSetup,
            Error::ReturnValueRequired { .. } => Reason::ReturnValueRequired,
            Error::MoreThanOneCall { .. } => Reason::MoreThanOneCall,
            Error::MoreThanNCalls { .. } => Reason::MoreThanNCalls,
            Error::NoMatchingCalls(_) => Reason::NoMatchingCalls,
            Error::UnmatchedSetups { .. } => Reason::UnmatchedSetups,
            Error::UnverifiedInvocations { .. } => Reason::UnverifiedInvocations,
            Error::Sequence(_) => Reason::Sequence,
            Error::External(_) => Reason::External,
            Error::Aggregate(_) => Reason::Aggregate,
        }
    }

    /// Every reason contained in this error, flattening aggregates.
    pub fn reasons(&self) -> Vec<Reason> {
        match self {
            Error::Aggregate(errors) => errors.iter().flat_map(Error::reasons).collect(),
            other => vec![other.reason()],
        }
    }

    /// Returns true for failures raised by the mock engine itself at dispatch
    /// or verification time, as opposed to configuration mistakes and
    /// user-supplied errors.
    pub fn is_mock_failure(&self) -> bool {
        match self {
            Error::NoSetup { .. }
            | Error::ReturnValueRequired { .. }
            | Error::MoreThanOneCall { .. }
            | Error::MoreThanNCalls { .. }
            | Error::NoMatchingCalls(_)
            | Error::UnmatchedSetups { .. }
            | Error::UnverifiedInvocations { .. }
            | Error::Sequence(_) => true,
            Error::Aggregate(errors) => errors.iter().all(Error::is_mock_failure),
            _ => false,
        }
    }

    /// Collapse simultaneously discovered failures into one error.
    ///
    /// Returns `None` for an empty list and the error itself for a single
    /// entry. Nested aggregates are flattened.
    pub(crate) fn combine(errors: Vec<Error>) -> Option<Error> {
        let mut flat = Vec::with_capacity(errors.len());
        for e in errors {
            match e {
                Error::Aggregate(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Error::Aggregate(flat)),
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::External(a), Self::External(b)) => Arc::ptr_eq(a, b),
            (Self::Aggregate(a), Self::Aggregate(b)) => a == b,
            (a, b) => a.reason() == b.reason() && a.to_string() == b.to_string(),
        }
    }
}

impl Eq for Error {}

/// Details of a failed call-count verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMismatch {
    /// Optional user-provided message passed to the verify call.
    pub message: Option<String>,
    /// The expectation text, e.g. "Expected invocation on the mock once, but was 0 times: ...".
    pub expectation: String,
    /// Number of matching calls actually observed.
    pub actual: usize,
    /// Configured setups at verification time, oldest first.
    pub setups: Vec<String>,
    /// Invocations recorded at verification time, in call order.
    pub invocations: Vec<String>,
}

impl fmt::Display for CallMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.message {
            writeln!(f, "{message}")?;
        }
        writeln!(f, "{}", self.expectation)?;
        writeln!(f)?;
        if self.setups.is_empty() {
            writeln!(f, "No setups configured.")?;
        } else {
            writeln!(f, "Configured setups:")?;
            writeln!(f, "{}", bullets(&self.setups))?;
        }
        writeln!(f)?;
        if self.invocations.is_empty() {
            write!(f, "No invocations performed.")
        } else {
            writeln!(f, "Performed invocations:")?;
            write!(f, "{}", bullets(&self.invocations))
        }
    }
}

fn bullets(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| format!("   {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}
