use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, atomic::Ordering},
};

use parking_lot::Mutex;

use super::Setup;
use crate::{Error, Invocation, Mock, MethodKind, Reply, Result, ValueFn, Value};

/// Response of a setup. One variant per kind of answer.
#[derive(Clone)]
pub(crate) enum Response {
    /// Call on a method without a result.
    Void(CallResponse),
    /// Call on a method with a result.
    Value(CallResponse),
    /// Non-terminal hop of a fluent chain.
    InnerMock(Mock),
    /// Answers consumed one per call.
    Queue(Arc<Mutex<VecDeque<QueueStep>>>),
    /// Storage for one property.
    Property(Arc<Mutex<Option<Value>>>),
    /// Storage for every property of the substitute.
    AllProperties(Arc<Mutex<HashMap<Arc<str>, Value>>>),
}

#[derive(Clone)]
pub(crate) enum Returns {
    Value(Value),
    Func(ValueFn),
}

#[derive(Clone)]
pub(crate) enum QueueStep {
    /// Answer as if nothing had been configured.
    Pass,
    Base,
    Value(Value),
    Func(ValueFn),
    Throw(Error),
}

#[derive(Clone, Default)]
pub(crate) struct CallResponse {
    pub(crate) callback: Option<ValueFn>,
    pub(crate) raise: Option<(Arc<str>, Vec<Value>)>,
    pub(crate) throws: Option<Error>,
    pub(crate) limit: Option<usize>,
    pub(crate) call_base: bool,
    pub(crate) returns: Option<Returns>,
}

impl CallResponse {
    /// Call cap, callback, event and error, shared by void and value calls.
    fn prelude(&self, mock: &Mock, invocation: &Invocation, count: usize) -> Result {
        if let Some(limit) = self.limit {
            if count > limit {
                let call = invocation.to_string();
                return Err(if limit == 1 {
                    Error::MoreThanOneCall { call }
                } else {
                    Error::MoreThanNCalls { call, limit }
                });
            }
        }
        if let Some(callback) = &self.callback {
            callback(&invocation.arguments())?;
        }
        if let Some((event, args)) = &self.raise {
            mock.raise(event, args)?;
        }
        if let Some(e) = &self.throws {
            return Err(e.clone());
        }
        Ok(())
    }
}

impl Setup {
    /// Run the response for `invocation`.
    ///
    /// The response is cloned out of its lock first, so user code running
    /// here may configure or call the same substitute.
    pub(crate) fn execute(&self, mock: &Mock, invocation: &Invocation) -> Result<Reply> {
        let count = self.executions.fetch_add(1, Ordering::AcqRel) + 1;
        let response = self.response.lock().clone();
        let method = invocation.method();

        match response {
            Response::Void(r) => {
                r.prelude(mock, invocation, count)?;
                Ok(if r.call_base { Reply::Base } else { Reply::Void })
            }
            Response::Value(r) => {
                r.prelude(mock, invocation, count)?;
                if r.call_base {
                    return Ok(Reply::Base);
                }
                match r.returns {
                    Some(Returns::Value(v)) => Ok(Reply::Value(v)),
                    Some(Returns::Func(f)) => f(&invocation.arguments()).map(Reply::Value),
                    None if mock.is_strict() => Err(Error::ReturnValueRequired {
                        call: invocation.to_string(),
                    }),
                    None => Ok(Reply::Value(mock.default_value(method.returns()))),
                }
            }
            Response::InnerMock(inner) => Ok(Reply::Value(Value::Mock(inner))),
            Response::Queue(queue) => {
                let step = queue.lock().pop_front();
                match step {
                    Some(QueueStep::Base) => Ok(Reply::Base),
                    Some(QueueStep::Value(v)) => Ok(Reply::Value(v)),
                    Some(QueueStep::Func(f)) => f(&invocation.arguments()).map(Reply::Value),
                    Some(QueueStep::Throw(e)) => Err(e),
                    Some(QueueStep::Pass) | None if method.is_void() => Ok(Reply::Void),
                    Some(QueueStep::Pass) | None => {
                        Ok(Reply::Value(mock.default_value(method.returns())))
                    }
                }
            }
            Response::Property(slot) => match method.kind() {
                MethodKind::Setter(_) => {
                    *slot.lock() = Some(first_argument(invocation));
                    Ok(Reply::Void)
                }
                _ => {
                    if let Some(v) = slot.lock().clone() {
                        return Ok(Reply::Value(v));
                    }
                    let fresh = mock.default_value(method.returns());
                    Ok(Reply::Value(slot.lock().get_or_insert(fresh).clone()))
                }
            },
            Response::AllProperties(store) => {
                let Some(name) = method.kind().property() else {
                    return Ok(Reply::Void);
                };
                let name: Arc<str> = Arc::from(name);
                match method.kind() {
                    MethodKind::Setter(_) => {
                        store.lock().insert(name, first_argument(invocation));
                        Ok(Reply::Void)
                    }
                    _ => {
                        if let Some(v) = store.lock().get(&name).cloned() {
                            return Ok(Reply::Value(v));
                        }
                        let fresh = mock.default_value(method.returns());
                        Ok(Reply::Value(store.lock().entry(name).or_insert(fresh).clone()))
                    }
                }
            }
        }
    }
}

fn first_argument(invocation: &Invocation) -> Value {
    invocation.with_arguments(|args| args.first().cloned().unwrap_or_default())
}
