use std::{any::Any, cmp::Ordering, fmt, sync::Arc};

use crate::{ExprTree, Mock, TypeRef};

/// A dynamically typed argument or return value.
///
/// Scalars, strings and lists compare by value. Mocks, delegates and opaque
/// payloads compare by identity. Expression trees compare structurally.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Vec<Value>),
    Mock(Mock),
    Delegate(Delegate),
    Expr(Arc<ExprTree>),
    Opaque(Opaque),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_mock(&self) -> Option<&Mock> {
        match self {
            Value::Mock(m) => Some(m),
            _ => None,
        }
    }

    /// Runtime type of this value. `None` for [`Value::Null`].
    pub fn type_ref(&self) -> Option<TypeRef> {
        Some(match self {
            Value::Null => return None,
            Value::Unit => TypeRef::Unit,
            Value::Bool(_) => TypeRef::Bool,
            Value::Int(_) => TypeRef::Int,
            Value::Float(_) => TypeRef::Float,
            Value::Str(_) => TypeRef::Str,
            Value::List(items) => TypeRef::list(
                items
                    .iter()
                    .find_map(Value::type_ref)
                    .unwrap_or(TypeRef::Any),
            ),
            Value::Mock(m) => TypeRef::Contract(m.contract().clone()),
            Value::Delegate(_) => TypeRef::Delegate,
            Value::Expr(_) => TypeRef::Expr,
            Value::Opaque(o) => TypeRef::Named(o.type_name.clone()),
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Mock(a), Value::Mock(b)) => a == b,
            (Value::Delegate(a), Value::Delegate(b)) => a == b,
            (Value::Expr(a), Value::Expr(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    /// Natural ordering: numbers (ints and floats mixed), strings and bools.
    /// Every other combination is unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Mock(m) => write!(f, "Mock<{}>", m.name()),
            Value::Delegate(_) => write!(f, "<delegate>"),
            Value::Expr(e) => write!(f, "{e}"),
            Value::Opaque(o) => write!(f, "<{}>", o.type_name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

type DelegateFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// A callable value, e.g. an event handler passed to an event accessor.
#[derive(Clone)]
pub struct Delegate(Arc<DelegateFn>);

impl Delegate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn invoke(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

impl PartialEq for Delegate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate").finish_non_exhaustive()
    }
}

/// A host value the engine carries around without inspecting.
#[derive(Clone)]
pub struct Opaque {
    type_name: Arc<str>,
    value: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(type_name: &str, value: T) -> Self {
        Self {
            type_name: Arc::from(type_name),
            value: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opaque")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Conversion from a [`Value`] into a Rust type.
///
/// Returns `None` when the value has an incompatible shape, which lets typed
/// predicates reject such values instead of failing.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

/// Conversion from a Rust type into a [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;

    /// Static type used to validate value functions against a method's
    /// declared return type.
    fn value_type() -> TypeRef
    where
        Self: Sized;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }

    fn value_type() -> TypeRef {
        TypeRef::Any
    }
}

macro_rules! int_conversions {
    ($($t:ty),*) => {$(
        impl FromValue for $t {
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Int(i) => <$t>::try_from(*i).ok(),
                    _ => None,
                }
            }
        }

        impl IntoValue for $t {
            fn into_value(self) -> Value {
                i64::try_from(self).map_or(Value::Int(i64::MAX), Value::Int)
            }

            fn value_type() -> TypeRef {
                TypeRef::Int
            }
        }

        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                v.into_value()
            }
        }
    )*};
}

int_conversions!(i64, i32, u32, usize);

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn value_type() -> TypeRef {
        TypeRef::Bool
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn value_type() -> TypeRef {
        TypeRef::Float
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(Arc::from(self))
    }

    fn value_type() -> TypeRef {
        TypeRef::Str
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(Arc::from(self))
    }

    fn value_type() -> TypeRef {
        TypeRef::Str
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Unit
    }

    fn value_type() -> TypeRef {
        TypeRef::Unit
    }
}

impl FromValue for Mock {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_mock().cloned()
    }
}

impl IntoValue for Mock {
    fn into_value(self) -> Value {
        Value::Mock(self)
    }

    fn value_type() -> TypeRef {
        TypeRef::Any
    }
}

impl FromValue for Delegate {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Delegate(d) => Some(d.clone()),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }

    fn value_type() -> TypeRef {
        T::value_type()
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }

    fn value_type() -> TypeRef {
        TypeRef::list(T::value_type())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<Mock> for Value {
    fn from(m: Mock) -> Self {
        Value::Mock(m)
    }
}

impl From<Delegate> for Value {
    fn from(d: Delegate) -> Self {
        Value::Delegate(d)
    }
}

impl From<ExprTree> for Value {
    fn from(e: ExprTree) -> Self {
        Value::Expr(Arc::new(e))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
