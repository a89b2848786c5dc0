use std::{fmt, sync::Arc};

use crate::{Contract, Value};

/// Whether a contract describes an interface or an overridable class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeKind {
    Interface,
    Class,
}

/// Identity and inheritance of a contract type.
///
/// Methods point at the `TypeDef` that declares them instead of at the full
/// [`Contract`], which keeps the contract graph acyclic.
#[derive(Debug)]
pub struct TypeDef {
    name: Arc<str>,
    kind: TypeKind,
    sealed: bool,
    bases: Vec<Arc<TypeDef>>,
}

impl TypeDef {
    pub(crate) fn new(
        name: Arc<str>,
        kind: TypeKind,
        sealed: bool,
        bases: Vec<Arc<TypeDef>>,
    ) -> Self {
        Self {
            name,
            kind,
            sealed,
            bases,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn bases(&self) -> &[Arc<TypeDef>] {
        &self.bases
    }

    /// Sealed classes cannot be substituted.
    pub fn is_mockable(&self) -> bool {
        !(self.kind == TypeKind::Class && self.sealed)
    }

    /// Returns true if `self` is `other` or inherits from it, directly or
    /// transitively.
    pub fn derives_from(&self, other: &TypeDef) -> bool {
        std::ptr::eq(self, other) || self.bases.iter().any(|b| b.derives_from(other))
    }
}

/// Static type of a parameter, return value or property.
///
/// Reference-like types (`Str`, `List`, `Contract`, `Delegate`, `Expr`,
/// `Named`, `Any`) accept [`Value::Null`]; `Unit`, `Bool`, `Int` and `Float`
/// do not.
#[derive(Clone)]
pub enum TypeRef {
    Unit,
    Bool,
    Int,
    Float,
    Str,
    List(Box<TypeRef>),
    Contract(Arc<Contract>),
    Delegate,
    Expr,
    /// An opaque host type, compared by name.
    Named(Arc<str>),
    /// Top type: every value is assignable to it.
    Any,
}

impl TypeRef {
    pub fn list(element: TypeRef) -> Self {
        TypeRef::List(Box::new(element))
    }

    pub fn named(name: &str) -> Self {
        TypeRef::Named(Arc::from(name))
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, TypeRef::Unit)
    }

    pub fn is_nullable(&self) -> bool {
        !matches!(
            self,
            TypeRef::Unit | TypeRef::Bool | TypeRef::Int | TypeRef::Float
        )
    }

    /// The contract behind this type, if it is one.
    pub fn contract(&self) -> Option<&Arc<Contract>> {
        match self {
            TypeRef::Contract(c) => Some(c),
            _ => None,
        }
    }

    /// Returns true if a value of static type `other` can be used where
    /// `self` is expected.
    pub fn is_assignable_from(&self, other: &TypeRef) -> bool {
        match (self, other) {
            (TypeRef::Any, _) => true,
            (TypeRef::Contract(to), TypeRef::Contract(from)) => from.def().derives_from(to.def()),
            (TypeRef::List(to), TypeRef::List(from)) => to.is_assignable_from(from),
            _ => self == other,
        }
    }

    /// Returns true if `value` is null (and this type is nullable) or its
    /// runtime type is assignable to this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => self.is_nullable(),
            (TypeRef::Any, _) => true,
            (TypeRef::List(element), Value::List(items)) => {
                items.iter().all(|item| element.accepts(item))
            }
            (TypeRef::Contract(c), Value::Mock(m)) => m.contract().def().derives_from(c.def()),
            (TypeRef::Named(name), Value::Opaque(o)) => o.type_name() == &**name,
            (TypeRef::Unit, Value::Unit)
            | (TypeRef::Bool, Value::Bool(_))
            | (TypeRef::Int, Value::Int(_))
            | (TypeRef::Float, Value::Float(_))
            | (TypeRef::Str, Value::Str(_))
            | (TypeRef::Delegate, Value::Delegate(_))
            | (TypeRef::Expr, Value::Expr(_)) => true,
            _ => false,
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeRef::List(a), TypeRef::List(b)) => a == b,
            (TypeRef::Contract(a), TypeRef::Contract(b)) => Arc::ptr_eq(a.def(), b.def()),
            (TypeRef::Named(a), TypeRef::Named(b)) => a == b,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl Eq for TypeRef {}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Unit => write!(f, "()"),
            TypeRef::Bool => write!(f, "bool"),
            TypeRef::Int => write!(f, "int"),
            TypeRef::Float => write!(f, "float"),
            TypeRef::Str => write!(f, "string"),
            TypeRef::List(e) => write!(f, "[{e}]"),
            TypeRef::Contract(c) => write!(f, "{}", c.name()),
            TypeRef::Delegate => write!(f, "delegate"),
            TypeRef::Expr => write!(f, "expr"),
            TypeRef::Named(n) => write!(f, "{n}"),
            TypeRef::Any => write!(f, "any"),
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
