use std::{fmt, sync::Arc};

use crate::{Mock, Result, TypeDef, TypeRef, Value};

/// Native implementation of a class member, run when a call is delegated to
/// the base.
pub type Body = Arc<dyn Fn(&Mock, &[Value]) -> Result<Value> + Send + Sync>;

/// How an argument is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamMode {
    In,
    /// Output parameter: carries no input, receives a value after the call.
    Out,
    /// By-reference parameter: matched on input, may receive a value.
    Ref,
    /// Trailing variadic parameter; its type is the list type.
    Variadic,
}

/// A declared method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: Arc<str>,
    ty: TypeRef,
    mode: ParamMode,
}

impl Param {
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: Arc::from(name),
            ty,
            mode: ParamMode::In,
        }
    }

    pub fn out(name: &str, ty: TypeRef) -> Self {
        Self {
            mode: ParamMode::Out,
            ..Self::new(name, ty)
        }
    }

    pub fn by_ref(name: &str, ty: TypeRef) -> Self {
        Self {
            mode: ParamMode::Ref,
            ..Self::new(name, ty)
        }
    }

    /// A variadic parameter whose elements have type `element`.
    pub fn variadic(name: &str, element: TypeRef) -> Self {
        Self {
            mode: ParamMode::Variadic,
            ..Self::new(name, TypeRef::list(element))
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn mode(&self) -> ParamMode {
        self.mode
    }
}

/// What kind of member a method represents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Method,
    Getter(Arc<str>),
    Setter(Arc<str>),
    EventAdd(Arc<str>),
    EventRemove(Arc<str>),
}

impl MethodKind {
    pub fn is_property_accessor(&self) -> bool {
        matches!(self, MethodKind::Getter(_) | MethodKind::Setter(_))
    }

    /// Property name for getters and setters.
    pub fn property(&self) -> Option<&str> {
        match self {
            MethodKind::Getter(p) | MethodKind::Setter(p) => Some(p),
            _ => None,
        }
    }
}

pub(crate) struct MethodInfo {
    pub(crate) name: Arc<str>,
    pub(crate) declaring: Arc<TypeDef>,
    pub(crate) params: Vec<Param>,
    pub(crate) returns: TypeRef,
    pub(crate) kind: MethodKind,
    pub(crate) generic_arity: usize,
    pub(crate) generic_args: Vec<TypeRef>,
    pub(crate) definition: Option<Method>,
    pub(crate) overrides: Option<Method>,
    pub(crate) body: Option<Body>,
    pub(crate) overridable: bool,
}

/// Identity of a contract member that can be called on a substitute.
///
/// Cheap to clone. Two handles are the *same* method when they point at the
/// same declaration, or when both are closed over the same generic method
/// definition with equal type arguments.
#[derive(Clone)]
pub struct Method(Arc<MethodInfo>);

impl Method {
    pub(crate) fn from_info(info: MethodInfo) -> Self {
        Self(Arc::new(info))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The type that declares this method.
    pub fn declaring(&self) -> &Arc<TypeDef> {
        &self.0.declaring
    }

    pub fn params(&self) -> &[Param] {
        &self.0.params
    }

    pub fn arity(&self) -> usize {
        self.0.params.len()
    }

    pub fn returns(&self) -> &TypeRef {
        &self.0.returns
    }

    pub fn is_void(&self) -> bool {
        self.0.returns.is_unit()
    }

    pub fn kind(&self) -> &MethodKind {
        &self.0.kind
    }

    /// Base member this method overrides or implements, if any.
    pub fn overrides(&self) -> Option<&Method> {
        self.0.overrides.as_ref()
    }

    pub fn body(&self) -> Option<&Body> {
        self.0.body.as_ref()
    }

    pub fn has_body(&self) -> bool {
        self.0.body.is_some()
    }

    pub fn is_overridable(&self) -> bool {
        self.0.overridable
    }

    /// Open generic definitions and closed generic methods are both generic.
    pub fn is_generic(&self) -> bool {
        self.0.generic_arity > 0
    }

    pub(crate) fn generic_arity(&self) -> usize {
        self.0.generic_arity
    }

    pub fn generic_args(&self) -> &[TypeRef] {
        &self.0.generic_args
    }

    /// Close a generic method definition over concrete type arguments.
    ///
    /// [`TypeRef::Any`] may be used as a type argument in setups to match
    /// every instantiation.
    pub fn instantiate(&self, type_args: &[TypeRef]) -> Result<Method> {
        let definition = self.definition().clone();
        if definition.0.generic_arity == 0 {
            return Err(crate::Error::unsupported(format!(
                "{self} is not a generic method"
            )));
        }
        if type_args.len() != definition.0.generic_arity {
            return Err(crate::Error::unsupported(format!(
                "{self} expects {} type arguments, got {}",
                definition.0.generic_arity,
                type_args.len()
            )));
        }
        let info = &definition.0;
        Ok(Method::from_info(MethodInfo {
            name: info.name.clone(),
            declaring: info.declaring.clone(),
            params: info.params.clone(),
            returns: info.returns.clone(),
            kind: info.kind.clone(),
            generic_arity: info.generic_arity,
            generic_args: type_args.to_vec(),
            definition: Some(definition.clone()),
            overrides: info.overrides.clone(),
            body: info.body.clone(),
            overridable: info.overridable,
        }))
    }

    /// The open generic definition, or `self` for non-generic methods.
    pub fn definition(&self) -> &Method {
        self.0.definition.as_ref().unwrap_or(self)
    }

    /// Exact identity, see the type-level docs.
    pub fn is_same(&self, other: &Method) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (&self.0.definition, &other.0.definition) {
            (Some(a), Some(b)) => {
                Arc::ptr_eq(&a.0, &b.0) && self.0.generic_args == other.0.generic_args
            }
            _ => false,
        }
    }

    /// Returns true if this method overrides `base`, directly or through
    /// intermediate overrides.
    pub fn overrides_method(&self, base: &Method) -> bool {
        let mut current = self.definition().0.overrides.clone();
        while let Some(m) = current {
            if m.is_same(base.definition()) {
                return true;
            }
            current = m.0.overrides.clone();
        }
        false
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0.declaring.name(), self.0.name)?;
        if !self.0.generic_args.is_empty() {
            let args: Vec<String> = self.0.generic_args.iter().map(ToString::to_string).collect();
            write!(f, "<{}>", args.join(", "))?;
        }
        let params: Vec<String> = self.0.params.iter().map(|p| p.ty.to_string()).collect();
        write!(f, "({})", params.join(", "))
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
