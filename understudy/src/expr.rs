//! Symbolic call descriptions consumed by setup and verification.
//!
//! Turning host call syntax into these descriptions is the job of the
//! caller; the engine only sees a method plus one [`Arg`] per parameter.

use std::{fmt, sync::Arc};

use crate::{Matcher, Method, Mock, Property, Result, Value};

type Thunk = Arc<dyn Fn() -> Value + Send + Sync>;

/// Description of one argument position in a call description.
#[derive(Clone)]
pub enum Arg {
    /// A closed-form constant, matched by equality.
    Value(Value),
    /// A recognized matcher.
    Matcher(Matcher),
    /// Output parameter: matches anything, `Value` is written back after a match.
    Out(Value),
    /// Element-wise description of a variadic parameter.
    Spread(Vec<Arg>),
    /// A captured computation reduced to a constant when the description is compiled.
    Eval(Thunk),
    /// A symbolic sub-expression, matched structurally against expression arguments.
    Quote(ExprTree),
    /// A reference that cannot be reduced to a value (e.g. a lambda
    /// parameter used outside a matcher). Always rejected.
    Unbound(String),
}

impl Arg {
    pub fn eval<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Arg::Eval(Arc::new(f))
    }

    pub fn out(value: impl Into<Value>) -> Self {
        Arg::Out(value.into())
    }

    /// Shorthand for `Arg::Matcher(Matcher::any(ty))`.
    pub fn any(ty: crate::TypeRef) -> Self {
        Arg::Matcher(Matcher::any(ty))
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(v) => write!(f, "{v}"),
            Arg::Matcher(m) => write!(f, "{m}"),
            Arg::Out(v) => write!(f, "out {v}"),
            Arg::Spread(args) => f.debug_list().entries(args).finish(),
            Arg::Eval(_) => write!(f, "<eval>"),
            Arg::Quote(e) => write!(f, "{e}"),
            Arg::Unbound(name) => write!(f, "{name}"),
        }
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}

impl From<Matcher> for Arg {
    fn from(m: Matcher) -> Self {
        Arg::Matcher(m)
    }
}

impl From<ExprTree> for Arg {
    fn from(e: ExprTree) -> Self {
        Arg::Quote(e)
    }
}

macro_rules! arg_from_value {
    ($($t:ty),*) => {$(
        impl From<$t> for Arg {
            fn from(v: $t) -> Self {
                Arg::Value(Value::from(v))
            }
        }
    )*};
}

arg_from_value!(i64, i32, u32, usize, bool, f64, &str, String, Mock);

/// One hop of a call description: a method and its argument descriptions.
#[derive(Debug, Clone)]
pub struct Call {
    method: Method,
    args: Vec<Arg>,
}

impl Call {
    pub fn new<A>(method: &Method, args: A) -> Self
    where
        A: IntoIterator<Item = Arg>,
    {
        Self {
            method: method.clone(),
            args: args.into_iter().collect(),
        }
    }

    /// Read a property.
    pub fn get(property: &Property) -> Result<Self> {
        let getter = property.getter().ok_or_else(|| {
            crate::Error::unsupported(format!("property {} has no getter", property.name()))
        })?;
        Ok(Self::new(getter, []))
    }

    /// Write a property.
    pub fn set(property: &Property, value: impl Into<Arg>) -> Result<Self> {
        let setter = property.setter().ok_or_else(|| {
            crate::Error::unsupported(format!("property {} is read-only", property.name()))
        })?;
        Ok(Self::new(setter, [value.into()]))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }
}

/// A multi-hop call description, root first.
///
/// `root.a().b(x)` is the chain `[a(), b(x)]` where `b` is declared on the
/// return type of `a`.
#[derive(Debug, Clone)]
pub struct CallChain {
    calls: Vec<Call>,
}

impl CallChain {
    pub fn then(mut self, call: Call) -> Self {
        self.calls.push(call);
        self
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl From<Call> for CallChain {
    fn from(call: Call) -> Self {
        Self { calls: vec![call] }
    }
}

impl From<Vec<Call>> for CallChain {
    fn from(calls: Vec<Call>) -> Self {
        Self { calls }
    }
}

/// Binary operators in symbolic expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        f.write_str(op)
    }
}

/// A symbolic expression passed as an argument value (for instance a
/// predicate handed to a query method).
///
/// Equality is structural. Parameters are referenced by position, so two
/// lambdas that differ only in parameter names are equal.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprTree {
    Param(usize),
    Const(Value),
    Member(Box<ExprTree>, Arc<str>),
    Call(Option<Box<ExprTree>>, Arc<str>, Vec<ExprTree>),
    Binary(BinaryOp, Box<ExprTree>, Box<ExprTree>),
    Not(Box<ExprTree>),
    Lambda(usize, Box<ExprTree>),
}

impl ExprTree {
    pub fn lambda(arity: usize, body: ExprTree) -> Self {
        ExprTree::Lambda(arity, Box::new(body))
    }

    pub fn member(target: ExprTree, name: &str) -> Self {
        ExprTree::Member(Box::new(target), Arc::from(name))
    }

    pub fn binary(op: BinaryOp, lhs: ExprTree, rhs: ExprTree) -> Self {
        ExprTree::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn constant(v: impl Into<Value>) -> Self {
        ExprTree::Const(v.into())
    }
}

impl fmt::Display for ExprTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprTree::Param(i) => write!(f, "${i}"),
            ExprTree::Const(v) => write!(f, "{v}"),
            ExprTree::Member(target, name) => write!(f, "{target}.{name}"),
            ExprTree::Call(target, name, args) => {
                if let Some(t) = target {
                    write!(f, "{t}.")?;
                }
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            ExprTree::Binary(op, l, r) => write!(f, "({l} {op} {r})"),
            ExprTree::Not(e) => write!(f, "!{e}"),
            ExprTree::Lambda(arity, body) => write!(f, "|{arity}| {body}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_trees_compare_structurally() {
        let a = ExprTree::lambda(
            1,
            ExprTree::binary(
                BinaryOp::Gt,
                ExprTree::member(ExprTree::Param(0), "age"),
                ExprTree::constant(18),
            ),
        );
        let b = ExprTree::lambda(
            1,
            ExprTree::binary(
                BinaryOp::Gt,
                ExprTree::member(ExprTree::Param(0), "age"),
                ExprTree::constant(18),
            ),
        );
        let c = ExprTree::lambda(
            1,
            ExprTree::binary(
                BinaryOp::Ge,
                ExprTree::member(ExprTree::Param(0), "age"),
                ExprTree::constant(18),
            ),
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "|1| ($0.age > 18)");
    }

    #[test]
    fn property_calls_require_accessors() {
        let c = crate::Contract::interface("IFoo")
            .read_only_property("Id", crate::TypeRef::Int)
            .build();
        let id = c.property("Id").unwrap();
        assert!(Call::get(id).is_ok());
        assert!(Call::set(id, 3).is_err());
    }
}
