use std::fmt;

use crate::{Invocation, Matcher, Method, TypeRef, Value};

/// A method plus one matcher per parameter.
///
/// Built from a [`Call`](crate::Call) by the matcher factory; used both by
/// setups to claim calls and by verification to count them.
#[derive(Clone)]
pub struct CallShape {
    method: Method,
    matchers: Vec<Matcher>,
}

impl CallShape {
    pub(crate) fn new(method: Method, matchers: Vec<Matcher>) -> Self {
        Self { method, matchers }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    /// Returns true if `invocation` is a call of this shape's method (or of
    /// an override of it) whose arguments satisfy every matcher.
    pub fn is_match(&self, invocation: &Invocation) -> bool {
        invocation.with_arguments(|args| self.matches_call(invocation.method(), args))
    }

    pub(crate) fn matches_call(&self, method: &Method, args: &[Value]) -> bool {
        if self.matchers.len() != args.len() {
            return false;
        }
        if !self.matches_method(method) {
            return false;
        }
        self.matchers.iter().zip(args).all(|(m, v)| m.matches(v))
    }

    /// Method identity, independent of arguments.
    pub(crate) fn matches_method(&self, actual: &Method) -> bool {
        let expected = &self.method;
        if expected.is_same(actual) || actual.overrides_method(expected) {
            return true;
        }
        if expected.name() != actual.name() || expected.returns() != actual.returns() {
            return false;
        }
        if !actual.declaring().derives_from(expected.declaring()) {
            return false;
        }
        let same_params = expected.arity() == actual.arity()
            && expected
                .params()
                .iter()
                .zip(actual.params())
                .all(|(e, a)| e.ty() == a.ty());
        if !same_params {
            return false;
        }
        match (expected.is_generic(), actual.is_generic()) {
            (false, false) => true,
            (true, true) => {
                let expected_args = expected.generic_args();
                let actual_args = actual.generic_args();
                // An open definition accepts every instantiation.
                expected_args.is_empty()
                    || (expected_args.len() == actual_args.len()
                        && expected_args
                            .iter()
                            .zip(actual_args)
                            .all(|(e, a)| matches!(e, TypeRef::Any) || e.is_assignable_from(a)))
            }
            _ => false,
        }
    }

    /// Returns true if the shape targets exactly `method`, not a base of it.
    pub(crate) fn is_exact(&self, method: &Method) -> bool {
        self.method.is_same(method)
    }

    /// Runs deferred captures and writes output parameters back into the
    /// invocation. Called once the owning setup has been selected.
    pub(crate) fn confirm(&self, invocation: &Invocation) {
        let args = invocation.arguments();
        for (index, (matcher, value)) in self.matchers.iter().zip(&args).enumerate() {
            matcher.on_match(value);
            if let Some(out) = matcher.write_back() {
                invocation.write_argument(index, out.clone());
            }
        }
    }

    /// Returns true if both shapes accept exactly the same calls.
    pub fn equivalent(&self, other: &CallShape) -> bool {
        self.method.is_same(&other.method)
            && self.matchers.len() == other.matchers.len()
            && self
                .matchers
                .iter()
                .zip(&other.matchers)
                .all(|(a, b)| a.equivalent(b))
    }
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.method.declaring().name(), self.method.name())?;
        let generic_args = self.method.generic_args();
        if !generic_args.is_empty() {
            let args: Vec<String> = generic_args.iter().map(ToString::to_string).collect();
            write!(f, "<{}>", args.join(", "))?;
        }
        let matchers: Vec<String> = self.matchers.iter().map(ToString::to_string).collect();
        write!(f, "({})", matchers.join(", "))
    }
}

impl fmt::Debug for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Captured, Contract, Param};

    fn repo() -> std::sync::Arc<crate::Contract> {
        Contract::interface("IRepo")
            .method("get", [Param::new("key", TypeRef::Str)], TypeRef::Int)
            .method(
                "try_get",
                [
                    Param::new("key", TypeRef::Str),
                    Param::out("value", TypeRef::Int),
                ],
                TypeRef::Bool,
            )
            .generic_method("load", 1, [], TypeRef::Any)
            .build()
    }

    #[test]
    fn arguments_are_matched_positionally() {
        let c = repo();
        let get = c.method("get").unwrap();
        let shape = CallShape::new(get.clone(), vec![Matcher::eq("a")]);
        assert!(shape.is_match(&Invocation::new(get.clone(), vec![Value::from("a")])));
        assert!(!shape.is_match(&Invocation::new(get.clone(), vec![Value::from("b")])));
        assert!(!shape.is_match(&Invocation::new(get.clone(), vec![])));
    }

    #[test]
    fn calls_through_overrides_match_base_shapes() {
        let base = Contract::class("Base")
            .method("run", [Param::new("n", TypeRef::Int)], TypeRef::Int)
            .build();
        let derived = Contract::class("Derived")
            .extends(&base)
            .override_method("run", None)
            .build();
        let shape = CallShape::new(
            base.method("run").unwrap().clone(),
            vec![Matcher::any(TypeRef::Int)],
        );
        let inv = Invocation::new(derived.method("run").unwrap().clone(), vec![Value::Int(1)]);
        assert!(shape.is_match(&inv));
        assert!(!shape.is_exact(inv.method()));

        let reverse = CallShape::new(
            derived.method("run").unwrap().clone(),
            vec![Matcher::any(TypeRef::Int)],
        );
        let base_inv = Invocation::new(base.method("run").unwrap().clone(), vec![Value::Int(1)]);
        assert!(!reverse.is_match(&base_inv));
    }

    #[test]
    fn generic_arguments_use_assignability() {
        let c = repo();
        let load = c.method("load").unwrap();
        let any_shape = CallShape::new(load.instantiate(&[TypeRef::Any]).unwrap(), vec![]);
        let int_shape = CallShape::new(load.instantiate(&[TypeRef::Int]).unwrap(), vec![]);
        let open_shape = CallShape::new(load.clone(), vec![]);

        let int_call = Invocation::new(load.instantiate(&[TypeRef::Int]).unwrap(), vec![]);
        let str_call = Invocation::new(load.instantiate(&[TypeRef::Str]).unwrap(), vec![]);

        assert!(any_shape.is_match(&int_call));
        assert!(any_shape.is_match(&str_call));
        assert!(int_shape.is_match(&int_call));
        assert!(!int_shape.is_match(&str_call));
        assert!(open_shape.is_match(&str_call));
    }

    #[test]
    fn confirm_captures_and_writes_back() {
        let c = repo();
        let try_get = c.method("try_get").unwrap();
        let captured = Captured::new();
        let shape = CallShape::new(
            try_get.clone(),
            vec![captured.matcher(), Matcher::Out(Value::Int(42))],
        );
        let inv = Invocation::new(try_get.clone(), vec![Value::from("k"), Value::Null]);
        assert!(shape.is_match(&inv));
        assert!(captured.is_empty());

        shape.confirm(&inv);
        assert_eq!(captured.values(), vec![Value::from("k")]);
        assert_eq!(inv.arguments()[1], Value::Int(42));
    }

    #[test]
    fn equivalence_and_display() {
        let c = repo();
        let get = c.method("get").unwrap();
        let a = CallShape::new(get.clone(), vec![Matcher::eq("a")]);
        let b = CallShape::new(get.clone(), vec![Matcher::eq("a")]);
        let other = CallShape::new(get.clone(), vec![Matcher::any(TypeRef::Str)]);
        assert!(a.equivalent(&b));
        assert!(!a.equivalent(&other));
        assert_eq!(a.to_string(), "IRepo.get(\"a\")");
        assert_eq!(other.to_string(), "IRepo.get(any<string>)");
    }
}
