//! Typed closures adapted to the dynamic call surface.

use std::sync::Arc;

use crate::{Error, FromValue, IntoValue, Method, Result, TypeRef, Value};

/// A function over the raw argument list of a call.
pub type ValueFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// A closure usable as a return-value function or callback.
///
/// Implemented for `Fn` closures of up to four arguments whose parameters
/// implement [`FromValue`] and whose result implements [`IntoValue`]. A
/// closure either takes no arguments or one per method parameter; this is
/// checked when the closure is configured.
///
/// # Example
///
/// ```rust,ignore
/// mock.setup(Call::new(get, [Matcher::any(TypeRef::Str).into()]))?
///     .returns_with(|key: String| key.len() as i64)?;
/// ```
pub trait ValueFunction<Args>: Send + Sync + 'static {
    /// Number of arguments the closure takes.
    fn arity() -> usize;

    /// Static type of the closure's result.
    fn return_type() -> TypeRef;

    fn into_value_fn(self) -> ValueFn;
}

fn arg<T: FromValue>(args: &[Value], index: usize) -> Result<T> {
    args.get(index)
        .and_then(|v| T::from_value(v))
        .ok_or_else(|| {
            let shown = args
                .get(index)
                .map_or_else(|| "<missing>".to_string(), ToString::to_string);
            Error::unsupported(format!(
                "argument {index} ({shown}) cannot be converted to {}",
                std::any::type_name::<T>()
            ))
        })
}

macro_rules! impl_value_function {
    ($n:expr; $($ty:ident $idx:tt),*) => {
        impl<F, R, $($ty,)*> ValueFunction<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: IntoValue,
            $($ty: FromValue + 'static,)*
        {
            fn arity() -> usize {
                $n
            }

            fn return_type() -> TypeRef {
                R::value_type()
            }

            #[allow(unused_variables)]
            fn into_value_fn(self) -> ValueFn {
                Arc::new(move |args: &[Value]| {
                    Ok((self)($(arg::<$ty>(args, $idx)?),*).into_value())
                })
            }
        }
    };
}

impl_value_function!(0;);
impl_value_function!(1; A 0);
impl_value_function!(2; A 0, B 1);
impl_value_function!(3; A 0, B 1, C 2);
impl_value_function!(4; A 0, B 1, C 2, D 3);

/// Check a closure's arity against `method`.
pub(crate) fn check_arity(method: &Method, arity: usize) -> Result {
    if arity == 0 || arity == method.arity() {
        Ok(())
    } else {
        Err(Error::invalid_setup(
            method,
            format!(
                "closure takes {arity} arguments but the method has {} parameters",
                method.arity()
            ),
        ))
    }
}

/// Check a value function's result type against `method`'s return type.
pub(crate) fn check_return_type(method: &Method, ty: &TypeRef) -> Result {
    if method.is_void() {
        return Err(Error::invalid_setup(method, "a void method cannot return a value"));
    }
    if matches!(ty, TypeRef::Any) || method.returns().is_assignable_from(ty) {
        Ok(())
    } else {
        Err(Error::invalid_setup(
            method,
            format!(
                "closure returns {ty} but the method returns {}",
                method.returns()
            ),
        ))
    }
}

/// Check a fixed return value against `method`'s return type.
pub(crate) fn check_return_value(method: &Method, value: &Value) -> Result {
    if method.is_void() {
        return Err(Error::invalid_setup(method, "a void method cannot return a value"));
    }
    if method.returns().accepts(value) {
        Ok(())
    } else {
        Err(Error::invalid_setup(
            method,
            format!("{value} is not a valid {} return value", method.returns()),
        ))
    }
}

/// Wrap a typed closure after validating its arity against `method`.
pub(crate) fn adapt<Args, F: ValueFunction<Args>>(method: &Method, f: F) -> Result<ValueFn> {
    check_arity(method, F::arity())?;
    let inner = f.into_value_fn();
    if F::arity() == 0 {
        Ok(Arc::new(move |_: &[Value]| inner(&[])))
    } else {
        Ok(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Contract, Param, Reason};

    fn method() -> Method {
        Contract::interface("IFoo")
            .method(
                "add",
                [Param::new("a", TypeRef::Int), Param::new("b", TypeRef::Int)],
                TypeRef::Int,
            )
            .build()
            .method("add")
            .unwrap()
            .clone()
    }

    fn describe<Args, F: ValueFunction<Args>>(_: &F) -> (usize, TypeRef) {
        (F::arity(), F::return_type())
    }

    #[test]
    fn typed_closures_report_their_shape() {
        assert_eq!(describe(&|| 1i64), (0, TypeRef::Int));
        assert_eq!(describe(&|a: i64, b: i64| a + b), (2, TypeRef::Int));
        assert_eq!(describe(&|s: String| s), (1, TypeRef::Str));
    }

    #[test]
    fn adapted_closures_convert_arguments() {
        let f = adapt(&method(), |a: i64, b: i64| a + b).unwrap();
        assert_eq!(f(&[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));
        let err = f(&[Value::Int(2), Value::from("x")]).unwrap_err();
        assert_eq!(err.reason(), Reason::UnsupportedExpression);
    }

    #[test]
    fn arity_is_checked_at_configuration_time() {
        let m = method();
        assert!(adapt(&m, || 1i64).is_ok());
        let Err(err) = adapt(&m, |a: i64| a) else {
            panic!("expected an arity error");
        };
        assert_eq!(err.reason(), Reason::InvalidSetup);
    }

    #[test]
    fn return_types_are_checked() {
        let m = method();
        assert!(check_return_type(&m, &TypeRef::Int).is_ok());
        assert!(check_return_type(&m, &TypeRef::Any).is_ok());
        assert!(check_return_type(&m, &TypeRef::Str).is_err());
        assert!(check_return_value(&m, &Value::Int(1)).is_ok());
        assert!(check_return_value(&m, &Value::Null).is_err());
    }
}
