//! Compilation of call descriptions into [`CallShape`]s.

use std::sync::Arc;

use crate::{
    Arg, Call, CallChain, CallShape, Contract, Error, Matcher, Method, Param, ParamMode, Result,
    TypeRef, Value,
};

/// Compilation context for the arguments of one call.
///
/// Every matcher produced for the call is derived from the [`Arg`] list
/// handed in; nothing is picked up from outside the factory.
pub(crate) struct MatcherFactory<'a> {
    method: &'a Method,
}

impl<'a> MatcherFactory<'a> {
    pub(crate) fn new(method: &'a Method) -> Self {
        Self { method }
    }

    pub(crate) fn compile(&self, args: &[Arg]) -> Result<Vec<Matcher>> {
        if !self.method.is_overridable() {
            return Err(Error::unsupported(format!(
                "non-overridable member {} may not be used in setup or verification expressions",
                self.method
            )));
        }
        let params = self.method.params();
        if args.len() != params.len() {
            return Err(Error::unsupported(format!(
                "{} takes {} arguments but the expression supplies {}",
                self.method,
                params.len(),
                args.len()
            )));
        }
        params
            .iter()
            .zip(args)
            .map(|(param, arg)| self.compile_arg(param, arg))
            .collect()
    }

    fn compile_arg(&self, param: &Param, arg: &Arg) -> Result<Matcher> {
        match arg {
            Arg::Value(v) => self.constant(param, v.clone()),
            Arg::Eval(f) => self.constant(param, f()),
            Arg::Matcher(m) => self.matcher(param, m),
            Arg::Out(v) => match param.mode() {
                ParamMode::Out | ParamMode::Ref => {
                    self.check_value(param, v)?;
                    Ok(Matcher::Out(v.clone()))
                }
                _ => Err(Error::unsupported(format!(
                    "parameter '{}' of {} is not an output parameter",
                    param.name(),
                    self.method
                ))),
            },
            Arg::Spread(items) => {
                let element = match (param.mode(), param.ty()) {
                    (ParamMode::Variadic, TypeRef::List(element)) => (**element).clone(),
                    _ => {
                        return Err(Error::unsupported(format!(
                            "parameter '{}' of {} is not variadic",
                            param.name(),
                            self.method
                        )));
                    }
                };
                let element_param = Param::new(param.name(), element);
                items
                    .iter()
                    .map(|item| self.compile_arg(&element_param, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Matcher::Params)
            }
            Arg::Quote(expr) => {
                if !param.ty().is_assignable_from(&TypeRef::Expr) {
                    return Err(Error::unsupported(format!(
                        "expression {expr} cannot be passed as {} parameter '{}'",
                        param.ty(),
                        param.name()
                    )));
                }
                Ok(Matcher::Expression(Arc::new(expr.clone())))
            }
            Arg::Unbound(name) => Err(Error::unsupported(format!(
                "'{name}' cannot be reduced to a value or matcher (parameter '{}' of {})",
                param.name(),
                self.method
            ))),
        }
    }

    fn constant(&self, param: &Param, value: Value) -> Result<Matcher> {
        self.check_value(param, &value)?;
        // Output parameters carry no input; a constant is the value to write back.
        if param.mode() == ParamMode::Out {
            return Ok(Matcher::Out(value));
        }
        Ok(Matcher::Constant(value))
    }

    fn matcher(&self, param: &Param, matcher: &Matcher) -> Result<Matcher> {
        match matcher {
            Matcher::Constant(v) => self.constant(param, v.clone()),
            Matcher::Any { ty, .. } => {
                let expected = param.ty();
                if expected.is_assignable_from(ty) || ty.is_assignable_from(expected) {
                    Ok(matcher.clone())
                } else {
                    Err(self.type_mismatch(param, ty))
                }
            }
            Matcher::Out(v) => self.compile_arg(param, &Arg::Out(v.clone())),
            Matcher::Params(_) if param.mode() != ParamMode::Variadic => {
                Err(Error::unsupported(format!(
                    "parameter '{}' of {} is not variadic",
                    param.name(),
                    self.method
                )))
            }
            _ => Ok(matcher.clone()),
        }
    }

    fn check_value(&self, param: &Param, value: &Value) -> Result {
        if param.ty().accepts(value) {
            Ok(())
        } else {
            let ty = value.type_ref().unwrap_or(TypeRef::Any);
            Err(self.type_mismatch(param, &ty))
        }
    }

    fn type_mismatch(&self, param: &Param, actual: &TypeRef) -> Error {
        Error::unsupported(format!(
            "{actual} is not compatible with {} parameter '{}' of {}",
            param.ty(),
            param.name(),
            self.method
        ))
    }
}

/// Compile a single call.
pub(crate) fn compile_call(call: &Call) -> Result<CallShape> {
    let matchers = MatcherFactory::new(call.method()).compile(call.args())?;
    Ok(CallShape::new(call.method().clone(), matchers))
}

/// Compile a chain rooted at a substitute of `root`, validating that every
/// hop is declared on the type returned by the hop before it.
pub(crate) fn compile_chain(root: &Arc<Contract>, chain: &CallChain) -> Result<Vec<CallShape>> {
    let calls = chain.calls();
    if calls.is_empty() {
        return Err(Error::unsupported("empty call chain"));
    }
    let mut owner = root.clone();
    let mut shapes = Vec::with_capacity(calls.len());
    for (index, call) in calls.iter().enumerate() {
        if !owner.declares(call.method()) {
            return Err(Error::unsupported(format!(
                "{} is not a member of {}",
                call.method(),
                owner.name()
            )));
        }
        shapes.push(compile_call(call)?);
        if index + 1 < calls.len() {
            owner = hop_contract(call.method())?;
        }
    }
    Ok(shapes)
}

/// Mockable contract returned by a non-terminal hop.
pub(crate) fn hop_contract(method: &Method) -> Result<Arc<Contract>> {
    match method.returns().contract() {
        Some(contract) if contract.is_mockable() => Ok(contract.clone()),
        _ => Err(Error::TypeNotMockable(method.returns().to_string())),
    }
}
