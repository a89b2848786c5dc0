#![cfg_attr(docsrs, feature(doc_cfg))]
//! # Understudy
//!
//! A runtime test-double engine: setups, call interception, verification and
//! cross-mock sequencing.
//!
//! Understudy works on runtime descriptions of contracts (interfaces and
//! overridable classes). A proxy layer forwards intercepted calls to a
//! [`Mock`]; the mock records each call, picks the setup that answers it and
//! runs the configured response. Afterwards tests verify what was called, how
//! often and in which order.
//!
//! ## Quick Start
//!
//! ```rust
//! use understudy::*;
//!
//! let contract = Contract::interface("IRepository")
//!     .method("get", [Param::new("key", TypeRef::Str)], TypeRef::Int)
//!     .build();
//! let get = contract.method("get").unwrap().clone();
//!
//! let repo = Mock::new(&contract)?;
//! repo.setup(Call::new(&get, [Arg::from("a")]))?.returns(1)?;
//! repo.setup(Call::new(&get, [Arg::from("a")]))?.returns(2)?;
//!
//! // The newest matching setup wins
//! assert_eq!(repo.call(&get, vec![Value::from("a")])?, Value::Int(2));
//!
//! repo.verify_call(Call::new(&get, [Arg::any(TypeRef::Str)]), Times::once())?;
//! repo.verify_no_other_calls()?;
//! # Ok::<(), understudy::Error>(())
//! ```
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Contract`] | Runtime description of a mockable type |
//! | [`Mock`] | Substitute that records and answers calls |
//! | [`Call`] / [`CallChain`] | Symbolic call descriptions used by setups and verification |
//! | [`Matcher`] | Argument constraint (`any`, ranges, regex, captures, ...) |
//! | [`SetupHandle`] | Configures the response of a setup |
//! | [`Times`] | Expected call count |
//! | [`Sequence`] | Ordering constraint across substitutes |
//! | [`Error`] | The single error type, with a [`Reason`] code |
//!
//! ## Strict and Loose Substitutes
//!
//! Loose substitutes (the default) answer unconfigured calls with default
//! values. Strict substitutes fail them with [`Error::NoSetup`]:
//!
//! ```rust,ignore
//! let repo = Mock::builder(&contract).behavior(MockBehavior::Strict).build()?;
//! ```
//!
//! ## Fluent Setups
//!
//! A [`CallChain`] sets up a call several hops deep. Every hop but the last
//! gets an inner substitute, shared by all chains through the same hop:
//!
//! ```rust,ignore
//! root.setup(CallChain::from(Call::get(child)?).then(Call::get(value)?))?
//!     .returns(42)?;
//! ```
//!
//! ## Features
//!
//! - **`serde`** - serialization of configuration and state types, and
//!   `Mock::to_json()` for exporting setups and the call log

mod call_shape;
mod compile;
mod contract;
mod default_value;
mod error;
mod expr;
mod handler;
mod invocation;
mod matcher;
mod method;
mod mock;
mod mock_builder;
mod mock_config;
mod mock_id;
mod sequence;
mod setup;
mod times;
mod types;
mod value;
mod verify;

#[cfg(feature = "serde")]
mod report;

pub use call_shape::CallShape;
pub use contract::{Contract, ContractBuilder, EventDef, Property};
pub use default_value::{DefaultValueProvider, EmptyDefaults, MockDefaults};
pub use error::{CallMismatch, Error, Reason};
pub use expr::{Arg, BinaryOp, Call, CallChain, ExprTree};
pub use handler::{ValueFn, ValueFunction};
pub use invocation::{Invocation, Outcome, VerificationState};
pub use matcher::{ArgMatcher, Capture, CaptureMode, Captured, Matcher, Predicate, Range};
pub use method::{Body, Method, MethodKind, Param, ParamMode};
pub use mock::{ConditionalSetup, Dispatch, Mock, Reply};
pub use mock_builder::MockBuilder;
pub use mock_config::{DefaultValue, MockBehavior, MockConfig};
pub use mock_id::MockId;
pub use sequence::{Sequence, SequenceMode};
pub use setup::{FluentSetup, ResponseQueue, Setup, SetupHandle, SetupId};
pub use times::Times;
pub use types::{TypeDef, TypeKind, TypeRef};
pub use value::{Delegate, FromValue, IntoValue, Opaque, Value};

/// Convenience alias for `Result<T, understudy::Error>`.
pub type Result<T = ()> = std::result::Result<T, Error>;
