use crate::{Mock, TypeRef, Value};

/// Produces values for calls that have no configured result.
///
/// Set per substitute through [`MockBuilder::default_value_provider`]; the
/// built-in providers are selected by [`DefaultValue`](crate::DefaultValue).
pub trait DefaultValueProvider: Send + Sync {
    /// Value for a result of type `ty` on `mock`.
    fn default_value(&self, ty: &TypeRef, mock: &Mock) -> Value;
}

/// Zero, false, empty list or null.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDefaults;

impl DefaultValueProvider for EmptyDefaults {
    fn default_value(&self, ty: &TypeRef, _mock: &Mock) -> Value {
        match ty {
            TypeRef::Unit => Value::Unit,
            TypeRef::Bool => Value::Bool(false),
            TypeRef::Int => Value::Int(0),
            TypeRef::Float => Value::Float(0.0),
            TypeRef::List(_) => Value::List(Vec::new()),
            _ => Value::Null,
        }
    }
}

/// Like [`EmptyDefaults`], but mockable contracts get a fresh inner
/// substitute that shares the parent's configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockDefaults;

impl DefaultValueProvider for MockDefaults {
    fn default_value(&self, ty: &TypeRef, mock: &Mock) -> Value {
        let Some(contract) = ty.contract().filter(|c| c.is_mockable()) else {
            return EmptyDefaults.default_value(ty, mock);
        };
        let name = format!("{}.<{}>", mock.name(), contract.name());
        match mock.inner_builder(contract).name(&name).build() {
            Ok(inner) => Value::Mock(inner),
            Err(_) => Value::Null,
        }
    }
}
