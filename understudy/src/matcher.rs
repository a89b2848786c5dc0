//! Argument matchers.

use std::{fmt, sync::Arc};

use parking_lot::Mutex;

use crate::{Error, ExprTree, FromValue, Result, TypeRef, Value};

type PredicateFn = dyn Fn(&Value) -> bool + Send + Sync;
type CaptureFn = dyn Fn(&Value) + Send + Sync;

/// Open extension point for matchers the built-in variants do not cover.
pub trait ArgMatcher: Send + Sync {
    fn matches(&self, value: &Value) -> bool;

    fn describe(&self) -> String {
        "<custom>".to_string()
    }
}

/// Whether range bounds are part of the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Range {
    Inclusive,
    Exclusive,
}

/// When a capture matcher hands its value to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaptureMode {
    /// After the whole setup has been selected for the call.
    #[default]
    OnMatch,
    /// As soon as this argument matches, even if another argument or a
    /// newer setup later wins instead.
    Immediate,
}

/// A named predicate over one argument.
#[derive(Clone)]
pub struct Predicate {
    name: Arc<str>,
    f: Arc<PredicateFn>,
}

/// Matcher that records the argument value it sees.
#[derive(Clone)]
pub struct Capture {
    inner: Box<Matcher>,
    sink: Arc<CaptureFn>,
    mode: CaptureMode,
}

impl Capture {
    pub fn with_mode(mut self, mode: CaptureMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Predicate over a single argument value.
///
/// Matchers are pure except for [`Matcher::Capture`], whose side effect runs
/// only once matching has been confirmed (see [`CaptureMode`]).
#[derive(Clone)]
pub enum Matcher {
    /// Equal to a constant.
    Constant(Value),
    /// Null (when allowed) or assignable to `ty`.
    Any { ty: TypeRef, allow_null: bool },
    Predicate(Predicate),
    Range {
        from: Value,
        to: Value,
        range: Range,
    },
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Regex(regex::Regex),
    Capture(Capture),
    /// Structural equality against an expression argument.
    Expression(Arc<ExprTree>),
    /// Element-wise match of an expanded variadic argument.
    Params(Vec<Matcher>),
    /// Output parameter; always matches and writes the value back.
    Out(Value),
    Custom(Arc<dyn ArgMatcher>),
}

impl Matcher {
    pub fn eq(value: impl Into<Value>) -> Self {
        Matcher::Constant(value.into())
    }

    /// Any value of type `ty`, null included.
    pub fn any(ty: TypeRef) -> Self {
        Matcher::Any {
            ty,
            allow_null: true,
        }
    }

    /// Any non-null value of type `ty`.
    pub fn not_null(ty: TypeRef) -> Self {
        Matcher::Any {
            ty,
            allow_null: false,
        }
    }

    /// Typed predicate. Values that do not convert to `T` never match.
    pub fn is<T, F>(f: F) -> Self
    where
        T: FromValue,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Matcher::Predicate(Predicate {
            name: Arc::from(std::any::type_name::<T>()),
            f: Arc::new(move |v| T::from_value(v).is_some_and(|t| f(&t))),
        })
    }

    /// Predicate over the raw value.
    pub fn is_value<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Matcher::Predicate(Predicate {
            name: Arc::from("value"),
            f: Arc::new(f),
        })
    }

    pub fn in_range(from: impl Into<Value>, to: impl Into<Value>, range: Range) -> Self {
        Matcher::Range {
            from: from.into(),
            to: to.into(),
            range,
        }
    }

    pub fn is_in<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Matcher::In(values.into_iter().map(Into::into).collect())
    }

    pub fn is_not_in<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Matcher::NotIn(values.into_iter().map(Into::into).collect())
    }

    /// Non-null strings matching `pattern`.
    pub fn regex(pattern: &str) -> Result<Self> {
        regex::Regex::new(pattern)
            .map(Matcher::Regex)
            .map_err(|e| Error::unsupported(format!("invalid regex {pattern:?}: {e}")))
    }

    /// Capture any value into `sink`.
    pub fn capture<F>(sink: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self::capture_matching(Matcher::any(TypeRef::Any), sink)
    }

    /// Capture values accepted by `inner` into `sink`.
    pub fn capture_matching<F>(inner: Matcher, sink: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Matcher::Capture(Capture {
            inner: Box::new(inner),
            sink: Arc::new(sink),
            mode: CaptureMode::OnMatch,
        })
    }

    pub fn custom(matcher: impl ArgMatcher + 'static) -> Self {
        Matcher::Custom(Arc::new(matcher))
    }

    /// Trial evaluation. Deferred captures do not fire here.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Matcher::Constant(c) => c == value,
            Matcher::Any { ty, allow_null } => {
                if value.is_null() {
                    *allow_null
                } else {
                    ty.accepts(value)
                }
            }
            Matcher::Predicate(p) => (p.f)(value),
            Matcher::Range { from, to, range } => {
                if value.is_null() {
                    return false;
                }
                match range {
                    Range::Inclusive => from <= value && value <= to,
                    Range::Exclusive => from < value && value < to,
                }
            }
            Matcher::In(values) => values.contains(value),
            Matcher::NotIn(values) => !values.contains(value),
            Matcher::Regex(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Matcher::Capture(c) => {
                let matched = c.inner.matches(value);
                if matched && c.mode == CaptureMode::Immediate {
                    (c.sink)(value);
                }
                matched
            }
            Matcher::Expression(e) => matches!(value, Value::Expr(v) if **v == **e),
            Matcher::Params(matchers) => match value {
                Value::List(items) => {
                    items.len() == matchers.len()
                        && matchers.iter().zip(items).all(|(m, v)| m.matches(v))
                }
                _ => false,
            },
            Matcher::Out(_) => true,
            Matcher::Custom(c) => c.matches(value),
        }
    }

    /// Runs deferred side effects once the owning setup is selected.
    pub(crate) fn on_match(&self, value: &Value) {
        match self {
            Matcher::Capture(c) => {
                if c.mode == CaptureMode::OnMatch {
                    (c.sink)(value);
                }
                c.inner.on_match(value);
            }
            Matcher::Params(matchers) => {
                if let Value::List(items) = value {
                    for (m, v) in matchers.iter().zip(items) {
                        m.on_match(v);
                    }
                }
            }
            _ => {}
        }
    }

    /// Value to write back into the argument slot, for output parameters.
    pub(crate) fn write_back(&self) -> Option<&Value> {
        match self {
            Matcher::Out(v) => Some(v),
            _ => None,
        }
    }

    /// Returns true if both matchers accept exactly the same values.
    ///
    /// Closure-backed matchers are only equivalent to themselves.
    pub fn equivalent(&self, other: &Matcher) -> bool {
        match (self, other) {
            (Matcher::Constant(a), Matcher::Constant(b)) => a == b,
            (
                Matcher::Any {
                    ty: a,
                    allow_null: an,
                },
                Matcher::Any {
                    ty: b,
                    allow_null: bn,
                },
            ) => a == b && an == bn,
            (Matcher::Predicate(a), Matcher::Predicate(b)) => Arc::ptr_eq(&a.f, &b.f),
            (
                Matcher::Range {
                    from: af,
                    to: at,
                    range: ar,
                },
                Matcher::Range {
                    from: bf,
                    to: bt,
                    range: br,
                },
            ) => af == bf && at == bt && ar == br,
            (Matcher::In(a), Matcher::In(b)) | (Matcher::NotIn(a), Matcher::NotIn(b)) => a == b,
            (Matcher::Regex(a), Matcher::Regex(b)) => a.as_str() == b.as_str(),
            (Matcher::Capture(a), Matcher::Capture(b)) => Arc::ptr_eq(&a.sink, &b.sink),
            (Matcher::Expression(a), Matcher::Expression(b)) => a == b,
            (Matcher::Params(a), Matcher::Params(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            (Matcher::Out(a), Matcher::Out(b)) => a == b,
            (Matcher::Custom(a), Matcher::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Constant(v) => write!(f, "{v}"),
            Matcher::Any {
                ty,
                allow_null: true,
            } => write!(f, "any<{ty}>"),
            Matcher::Any {
                ty,
                allow_null: false,
            } => write!(f, "not_null<{ty}>"),
            Matcher::Predicate(p) => write!(f, "is<{}>", p.name),
            Matcher::Range { from, to, range } => match range {
                Range::Inclusive => write!(f, "[{from}..={to}]"),
                Range::Exclusive => write!(f, "({from}..{to})"),
            },
            Matcher::In(values) => write!(f, "in {:?}", values),
            Matcher::NotIn(values) => write!(f, "not in {:?}", values),
            Matcher::Regex(re) => write!(f, "/{}/", re.as_str()),
            Matcher::Capture(c) => write!(f, "capture({})", c.inner),
            Matcher::Expression(e) => write!(f, "{e}"),
            Matcher::Params(ms) => {
                write!(f, "...[")?;
                for (i, m) in ms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{m}")?;
                }
                write!(f, "]")
            }
            Matcher::Out(v) => write!(f, "out {v}"),
            Matcher::Custom(c) => write!(f, "{}", c.describe()),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Thread-safe collector for captured argument values.
///
/// # Example
///
/// ```rust
/// use understudy::{Captured, Value};
///
/// let captured = Captured::new();
/// let matcher = captured.matcher();
/// # let _ = matcher;
/// assert!(captured.values().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Captured {
    values: Arc<Mutex<Vec<Value>>>,
}

impl Captured {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matcher accepting any value and capturing it on match.
    pub fn matcher(&self) -> Matcher {
        self.matcher_for(Matcher::any(TypeRef::Any))
    }

    /// Matcher accepting what `inner` accepts and capturing it on match.
    pub fn matcher_for(&self, inner: Matcher) -> Matcher {
        let values = self.values.clone();
        Matcher::capture_matching(inner, move |v| values.lock().push(v.clone()))
    }

    pub fn values(&self) -> Vec<Value> {
        self.values.lock().clone()
    }

    pub fn last(&self) -> Option<Value> {
        self.values.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl fmt::Debug for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Captured")
            .field("values", &self.values.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_respects_nullability_and_type() {
        let any_str = Matcher::any(TypeRef::Str);
        assert!(any_str.matches(&Value::from("x")));
        assert!(any_str.matches(&Value::Null));
        assert!(!any_str.matches(&Value::Int(1)));

        let not_null = Matcher::not_null(TypeRef::Str);
        assert!(!not_null.matches(&Value::Null));
        assert!(not_null.matches(&Value::from("x")));
    }

    #[test]
    fn typed_predicate_tolerates_incompatible_values() {
        let even = Matcher::is(|n: &i64| n % 2 == 0);
        assert!(even.matches(&Value::Int(4)));
        assert!(!even.matches(&Value::Int(3)));
        assert!(!even.matches(&Value::from("four")));
        assert!(!even.matches(&Value::Null));
    }

    #[test]
    fn ranges_use_natural_ordering() {
        let inclusive = Matcher::in_range(1, 3, Range::Inclusive);
        let exclusive = Matcher::in_range(1, 3, Range::Exclusive);
        assert!(inclusive.matches(&Value::Int(1)));
        assert!(inclusive.matches(&Value::Int(3)));
        assert!(!exclusive.matches(&Value::Int(1)));
        assert!(exclusive.matches(&Value::Int(2)));
        assert!(exclusive.matches(&Value::Float(2.5)));
        assert!(!inclusive.matches(&Value::Null));
        assert!(!inclusive.matches(&Value::from("2")));
    }

    #[test]
    fn membership_and_negation() {
        let m = Matcher::is_in(["a", "b"]);
        let n = Matcher::is_not_in(["a", "b"]);
        assert!(m.matches(&Value::from("a")));
        assert!(!m.matches(&Value::from("c")));
        assert!(n.matches(&Value::from("c")));
        assert!(!n.matches(&Value::from("b")));
    }

    #[test]
    fn regex_requires_non_null_string() {
        let re = Matcher::regex("^ab+$").unwrap();
        assert!(re.matches(&Value::from("abbb")));
        assert!(!re.matches(&Value::from("ac")));
        assert!(!re.matches(&Value::Null));
        assert!(Matcher::regex("(").is_err());
    }

    #[test]
    fn deferred_capture_fires_only_on_confirmation() {
        let captured = Captured::new();
        let m = captured.matcher();
        assert!(m.matches(&Value::from("hi")));
        assert!(captured.is_empty());
        m.on_match(&Value::from("hi"));
        assert_eq!(captured.values(), vec![Value::from("hi")]);
    }

    #[test]
    fn immediate_capture_fires_during_trial() {
        let captured = Captured::new();
        let m = match captured.matcher_for(Matcher::any(TypeRef::Int)) {
            Matcher::Capture(c) => Matcher::Capture(c.with_mode(CaptureMode::Immediate)),
            other => other,
        };
        assert!(m.matches(&Value::Int(7)));
        assert!(!m.matches(&Value::from("x")));
        m.on_match(&Value::Int(7));
        assert_eq!(captured.values(), vec![Value::Int(7)]);
    }

    #[test]
    fn params_match_element_wise() {
        let m = Matcher::Params(vec![Matcher::eq(1), Matcher::any(TypeRef::Int)]);
        assert!(m.matches(&Value::List(vec![Value::Int(1), Value::Int(9)])));
        assert!(!m.matches(&Value::List(vec![Value::Int(2), Value::Int(9)])));
        assert!(!m.matches(&Value::List(vec![Value::Int(1)])));
    }

    #[test]
    fn equivalence_is_structural_for_closed_forms() {
        assert!(Matcher::eq("a").equivalent(&Matcher::eq("a")));
        assert!(!Matcher::eq("a").equivalent(&Matcher::eq("b")));
        assert!(Matcher::any(TypeRef::Str).equivalent(&Matcher::any(TypeRef::Str)));
        assert!(!Matcher::any(TypeRef::Str).equivalent(&Matcher::not_null(TypeRef::Str)));

        let p = Matcher::is(|n: &i64| *n > 0);
        assert!(p.equivalent(&p.clone()));
        assert!(!p.equivalent(&Matcher::is(|n: &i64| *n > 0)));
    }

    struct Even;

    impl ArgMatcher for Even {
        fn matches(&self, value: &Value) -> bool {
            value.as_int().is_some_and(|n| n % 2 == 0)
        }

        fn describe(&self) -> String {
            "even".into()
        }
    }

    #[test]
    fn custom_matchers_plug_in() {
        let m = Matcher::custom(Even);
        assert!(m.matches(&Value::Int(2)));
        assert!(!m.matches(&Value::Int(1)));
        assert_eq!(m.to_string(), "even");
    }
}
