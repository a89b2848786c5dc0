use std::{fmt, sync::Arc};

use crate::{
    Body, Method, Param, TypeDef, TypeKind, TypeRef,
    method::{MethodInfo, MethodKind},
};

/// A property of a contract with its accessor methods.
#[derive(Debug, Clone)]
pub struct Property {
    name: Arc<str>,
    ty: TypeRef,
    getter: Option<Method>,
    setter: Option<Method>,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn getter(&self) -> Option<&Method> {
        self.getter.as_ref()
    }

    pub fn setter(&self) -> Option<&Method> {
        self.setter.as_ref()
    }
}

/// An event of a contract with its subscription accessors.
#[derive(Debug, Clone)]
pub struct EventDef {
    name: Arc<str>,
    add: Method,
    remove: Method,
}

impl EventDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(&self) -> &Method {
        &self.add
    }

    pub fn remove(&self) -> &Method {
        &self.remove
    }
}

/// Runtime description of an interface or overridable class that can be
/// substituted by a [`Mock`](crate::Mock).
///
/// Contracts are what the proxy layer would derive from real types; tests
/// build them directly.
///
/// # Example
///
/// ```rust
/// use understudy::{Contract, Param, TypeRef};
///
/// let repo = Contract::interface("IRepository")
///     .method("get", [Param::new("key", TypeRef::Str)], TypeRef::Int)
///     .property("Name", TypeRef::Str)
///     .event("Changed")
///     .build();
///
/// assert_eq!(repo.method("get").unwrap().arity(), 1);
/// assert!(repo.property("Name").unwrap().setter().is_some());
/// ```
pub struct Contract {
    def: Arc<TypeDef>,
    methods: Vec<Method>,
    properties: Vec<Property>,
    events: Vec<EventDef>,
}

impl Contract {
    pub fn interface(name: &str) -> ContractBuilder {
        ContractBuilder::new(name, TypeKind::Interface)
    }

    pub fn class(name: &str) -> ContractBuilder {
        ContractBuilder::new(name, TypeKind::Class)
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn def(&self) -> &Arc<TypeDef> {
        &self.def
    }

    pub fn is_mockable(&self) -> bool {
        self.def.is_mockable()
    }

    /// All callable members, inherited ones included.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Most derived method with the given name.
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().rev().find(|m| m.name() == name)
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().rev().find(|p| p.name() == name)
    }

    pub fn events(&self) -> &[EventDef] {
        &self.events
    }

    pub fn event(&self, name: &str) -> Option<&EventDef> {
        self.events.iter().rev().find(|e| e.name() == name)
    }

    /// Returns true if `method` can be called on a substitute of this contract.
    pub fn declares(&self, method: &Method) -> bool {
        self.def.derives_from(method.declaring())
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("name", &self.name())
            .field("methods", &self.methods.len())
            .finish_non_exhaustive()
    }
}

struct MethodDecl {
    name: Arc<str>,
    params: Vec<Param>,
    returns: TypeRef,
    generic_arity: usize,
    body: Option<Body>,
    overridable: bool,
}

enum MemberDecl {
    Method(MethodDecl),
    Property {
        name: Arc<str>,
        ty: TypeRef,
        writable: bool,
    },
    Event(Arc<str>),
    Override {
        name: Arc<str>,
        body: Option<Body>,
    },
}

/// Builder for [`Contract`]s.
///
/// Returned by [`Contract::interface`] and [`Contract::class`].
pub struct ContractBuilder {
    name: Arc<str>,
    kind: TypeKind,
    sealed: bool,
    bases: Vec<Arc<Contract>>,
    members: Vec<MemberDecl>,
}

impl ContractBuilder {
    fn new(name: &str, kind: TypeKind) -> Self {
        Self {
            name: Arc::from(name),
            kind,
            sealed: false,
            bases: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Inherit every member of `base`.
    pub fn extends(mut self, base: &Arc<Contract>) -> Self {
        self.bases.push(base.clone());
        self
    }

    /// Declare an abstract (interface or abstract class) method.
    pub fn method<P>(self, name: &str, params: P, returns: TypeRef) -> Self
    where
        P: IntoIterator<Item = Param>,
    {
        self.push_method(name, params, returns, 0, None, true)
    }

    /// Declare an overridable method with a base implementation.
    pub fn method_with_body<P>(self, name: &str, params: P, returns: TypeRef, body: Body) -> Self
    where
        P: IntoIterator<Item = Param>,
    {
        self.push_method(name, params, returns, 0, Some(body), true)
    }

    /// Declare a non-overridable method. Such methods cannot be set up or verified.
    pub fn sealed_method<P>(self, name: &str, params: P, returns: TypeRef, body: Body) -> Self
    where
        P: IntoIterator<Item = Param>,
    {
        self.push_method(name, params, returns, 0, Some(body), false)
    }

    /// Declare a generic method definition with `arity` type parameters.
    pub fn generic_method<P>(self, name: &str, arity: usize, params: P, returns: TypeRef) -> Self
    where
        P: IntoIterator<Item = Param>,
    {
        self.push_method(name, params, returns, arity, None, true)
    }

    /// Declare a read-write property.
    pub fn property(mut self, name: &str, ty: TypeRef) -> Self {
        self.members.push(MemberDecl::Property {
            name: Arc::from(name),
            ty,
            writable: true,
        });
        self
    }

    /// Declare a get-only property.
    pub fn read_only_property(mut self, name: &str, ty: TypeRef) -> Self {
        self.members.push(MemberDecl::Property {
            name: Arc::from(name),
            ty,
            writable: false,
        });
        self
    }

    pub fn event(mut self, name: &str) -> Self {
        self.members.push(MemberDecl::Event(Arc::from(name)));
        self
    }

    /// Override (or implement) an inherited method, optionally with a new
    /// base body. Unknown names are ignored at build time.
    pub fn override_method(mut self, name: &str, body: Option<Body>) -> Self {
        self.members.push(MemberDecl::Override {
            name: Arc::from(name),
            body,
        });
        self
    }

    /// Mark a class as sealed, making it impossible to substitute.
    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    fn push_method<P>(
        mut self,
        name: &str,
        params: P,
        returns: TypeRef,
        generic_arity: usize,
        body: Option<Body>,
        overridable: bool,
    ) -> Self
    where
        P: IntoIterator<Item = Param>,
    {
        self.members.push(MemberDecl::Method(MethodDecl {
            name: Arc::from(name),
            params: params.into_iter().collect(),
            returns,
            generic_arity,
            body,
            overridable,
        }));
        self
    }

    pub fn build(self) -> Arc<Contract> {
        let def = Arc::new(TypeDef::new(
            self.name,
            self.kind,
            self.sealed,
            self.bases.iter().map(|b| b.def.clone()).collect(),
        ));

        let mut methods: Vec<Method> = Vec::new();
        let mut properties: Vec<Property> = Vec::new();
        let mut events: Vec<EventDef> = Vec::new();
        for base in &self.bases {
            for m in &base.methods {
                if !methods.iter().any(|known| known.is_same(m)) {
                    methods.push(m.clone());
                }
            }
            properties.extend(base.properties.iter().cloned());
            events.extend(base.events.iter().cloned());
        }

        let new_method = |name: Arc<str>, params, returns, kind| {
            Method::from_info(MethodInfo {
                name,
                declaring: def.clone(),
                params,
                returns,
                kind,
                generic_arity: 0,
                generic_args: Vec::new(),
                definition: None,
                overrides: None,
                body: None,
                overridable: true,
            })
        };

        for member in self.members {
            match member {
                MemberDecl::Method(decl) => methods.push(Method::from_info(MethodInfo {
                    name: decl.name,
                    declaring: def.clone(),
                    params: decl.params,
                    returns: decl.returns,
                    kind: MethodKind::Method,
                    generic_arity: decl.generic_arity,
                    generic_args: Vec::new(),
                    definition: None,
                    overrides: None,
                    body: decl.body,
                    overridable: decl.overridable,
                })),
                MemberDecl::Property { name, ty, writable } => {
                    let getter = new_method(
                        Arc::from(format!("get_{name}")),
                        Vec::new(),
                        ty.clone(),
                        MethodKind::Getter(name.clone()),
                    );
                    let setter = writable.then(|| {
                        new_method(
                            Arc::from(format!("set_{name}")),
                            vec![Param::new("value", ty.clone())],
                            TypeRef::Unit,
                            MethodKind::Setter(name.clone()),
                        )
                    });
                    methods.push(getter.clone());
                    methods.extend(setter.clone());
                    properties.push(Property {
                        name,
                        ty,
                        getter: Some(getter),
                        setter,
                    });
                }
                MemberDecl::Event(name) => {
                    let add = new_method(
                        Arc::from(format!("add_{name}")),
                        vec![Param::new("handler", TypeRef::Delegate)],
                        TypeRef::Unit,
                        MethodKind::EventAdd(name.clone()),
                    );
                    let remove = new_method(
                        Arc::from(format!("remove_{name}")),
                        vec![Param::new("handler", TypeRef::Delegate)],
                        TypeRef::Unit,
                        MethodKind::EventRemove(name.clone()),
                    );
                    methods.push(add.clone());
                    methods.push(remove.clone());
                    events.push(EventDef { name, add, remove });
                }
                MemberDecl::Override { name, body } => {
                    let Some(pos) = methods.iter().rposition(|m| *m.name() == *name) else {
                        continue;
                    };
                    let base = methods.remove(pos);
                    let info = MethodInfo {
                        name: base.name().into(),
                        declaring: def.clone(),
                        params: base.params().to_vec(),
                        returns: base.returns().clone(),
                        kind: base.kind().clone(),
                        generic_arity: base.generic_arity(),
                        generic_args: Vec::new(),
                        definition: None,
                        body: body.or_else(|| base.body().cloned()),
                        overridable: true,
                        overrides: Some(base),
                    };
                    methods.push(Method::from_info(info));
                }
            }
        }

        Arc::new(Contract {
            def,
            methods,
            properties,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn properties_expose_accessors() {
        let c = Contract::interface("IFoo")
            .property("Name", TypeRef::Str)
            .read_only_property("Id", TypeRef::Int)
            .build();

        let name = c.property("Name").unwrap();
        assert_eq!(name.getter().unwrap().name(), "get_Name");
        assert_eq!(name.setter().unwrap().arity(), 1);
        assert!(c.property("Id").unwrap().setter().is_none());
        assert_eq!(
            name.getter().unwrap().kind().property(),
            Some("Name")
        );
    }

    #[test]
    fn derived_contracts_inherit_and_override() {
        let body: Body = Arc::new(|_: &crate::Mock, _: &[Value]| Ok(Value::Int(1)));
        let base = Contract::class("Base")
            .method_with_body("run", [], TypeRef::Int, body)
            .method("stop", [], TypeRef::Unit)
            .build();
        let derived = Contract::class("Derived")
            .extends(&base)
            .override_method("run", None)
            .build();

        let run = derived.method("run").unwrap();
        assert!(!run.is_same(base.method("run").unwrap()));
        assert!(run.overrides_method(base.method("run").unwrap()));
        assert!(run.has_body());
        assert!(derived.method("stop").unwrap().is_same(base.method("stop").unwrap()));
        assert!(derived.declares(base.method("stop").unwrap()));
        assert!(!base.declares(run));
    }

    #[test]
    fn sealed_classes_are_not_mockable() {
        assert!(!Contract::class("Fixed").sealed().build().is_mockable());
        assert!(Contract::interface("IOpen").build().is_mockable());
    }
}
