use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use understudy::*;

#[derive(Debug, thiserror::Error)]
#[error("boom")]
struct Boom;

struct Repo {
    contract: Arc<Contract>,
    get: Method,
    next: Method,
    save: Method,
}

fn repo() -> Repo {
    let contract = Contract::interface("IRepository")
        .method("get", [Param::new("key", TypeRef::Str)], TypeRef::Int)
        .method("next", [], TypeRef::Int)
        .method("save", [Param::new("key", TypeRef::Str)], TypeRef::Unit)
        .event("Saved")
        .build();
    Repo {
        get: contract.method("get").unwrap().clone(),
        next: contract.method("next").unwrap().clone(),
        save: contract.method("save").unwrap().clone(),
        contract,
    }
}

struct Tree {
    root: Arc<Contract>,
    child: Arc<Contract>,
}

fn tree() -> Tree {
    let child = Contract::interface("IChild")
        .property("Value", TypeRef::Int)
        .property("Name", TypeRef::Str)
        .build();
    let root = Contract::interface("IRoot")
        .property("Child", TypeRef::Contract(child.clone()))
        .build();
    Tree { root, child }
}

fn chain(tree: &Tree, leaf: &str) -> CallChain {
    let child = tree.root.property("Child").unwrap();
    let leaf = tree.child.property(leaf).unwrap();
    CallChain::from(Call::get(child).unwrap()).then(Call::get(leaf).unwrap())
}

#[test]
fn newest_setup_with_the_same_arguments_wins() {
    let r = repo();
    let mock = Mock::new(&r.contract).unwrap();
    mock.setup(Call::new(&r.get, [Arg::from("a")]))
        .unwrap()
        .returns(1)
        .unwrap();
    mock.setup(Call::new(&r.get, [Arg::from("a")]))
        .unwrap()
        .returns(2)
        .unwrap();

    assert_eq!(mock.call(&r.get, vec![Value::from("a")]).unwrap(), Value::Int(2));
}

#[test]
fn strict_mock_without_setups_rejects_calls() {
    let r = repo();
    let mock = Mock::builder(&r.contract)
        .behavior(MockBehavior::Strict)
        .build()
        .unwrap();

    let err = mock.call(&r.save, vec![Value::from("a")]).unwrap_err();
    assert_eq!(err.reason(), Reason::NoSetup);
    assert!(err.is_mock_failure());
    assert!(matches!(mock.invocations()[0].outcome(), Outcome::Threw(_)));
}

#[test]
fn captured_arguments_follow_the_selected_setup() {
    let r = repo();
    let mock = Mock::new(&r.contract).unwrap();
    let captured = Captured::new();
    mock.setup(Call::new(
        &r.get,
        [Arg::from(captured.matcher_for(Matcher::any(TypeRef::Str)))],
    ))
    .unwrap()
    .returns_with(|key: String| key.len() as i64)
    .unwrap();

    assert!(captured.is_empty());
    assert_eq!(mock.call(&r.get, vec![Value::from("hi")]).unwrap(), Value::Int(2));
    assert_eq!(captured.values(), vec![Value::from("hi")]);

    // Verification evaluates capture matchers without capturing.
    mock.verify_call(
        Call::new(&r.get, [Arg::from(captured.matcher_for(Matcher::any(TypeRef::Str)))]),
        Times::once(),
    )
    .unwrap();
    assert_eq!(captured.len(), 1);
}

#[test]
fn fluent_setups_answer_through_inner_mocks() {
    let t = tree();
    let root = Mock::new(&t.root).unwrap();
    root.setup(chain(&t, "Value")).unwrap().returns(42).unwrap();

    let child_getter = t.root.property("Child").unwrap().getter().unwrap();
    let value_getter = t.child.property("Value").unwrap().getter().unwrap();
    let child = root.call(child_getter, vec![]).unwrap();
    let child = child.as_mock().unwrap();
    assert_eq!(child.call(value_getter, vec![]).unwrap(), Value::Int(42));

    root.verify_call(chain(&t, "Value"), Times::once()).unwrap();
    root.verify_no_other_calls().unwrap();
    root.verify_call(Call::get(t.root.property("Child").unwrap()).unwrap(), Times::once())
        .unwrap();
}

#[test]
fn response_queues_are_consumed_in_order() {
    let r = repo();
    let mock = Mock::new(&r.contract).unwrap();
    mock.setup_sequence(Call::new(&r.next, []))
        .unwrap()
        .returns(1)
        .unwrap()
        .returns(2)
        .unwrap()
        .throws(Boom);

    assert_eq!(mock.call(&r.next, vec![]).unwrap(), Value::Int(1));
    assert_eq!(mock.call(&r.next, vec![]).unwrap(), Value::Int(2));
    let err = mock.call(&r.next, vec![]).unwrap_err();
    assert_eq!(err.reason(), Reason::External);
    assert_eq!(err.to_string(), "boom");
    assert_eq!(mock.call(&r.next, vec![]).unwrap(), Value::Int(0));
}

#[test]
fn exact_method_setups_win_regardless_of_order() {
    let base = Contract::class("Service")
        .method("load", [], TypeRef::Int)
        .build();
    let derived = Contract::class("CachedService")
        .extends(&base)
        .override_method("load", None)
        .build();
    let base_load = base.method("load").unwrap();
    let derived_load = derived.method("load").unwrap();
    let mock = Mock::new(&derived).unwrap();

    mock.setup(Call::new(derived_load, [])).unwrap().returns(1).unwrap();
    mock.setup(Call::new(base_load, [])).unwrap().returns(2).unwrap();
    assert_eq!(mock.call(derived_load, vec![]).unwrap(), Value::Int(1));

    let other = Mock::new(&derived).unwrap();
    other.setup(Call::new(base_load, [])).unwrap().returns(2).unwrap();
    other.setup(Call::new(derived_load, [])).unwrap().returns(1).unwrap();
    assert_eq!(other.call(derived_load, vec![]).unwrap(), Value::Int(1));
}

#[test]
fn occurrence_caps_allow_exactly_n_calls() {
    let r = repo();
    let mock = Mock::new(&r.contract).unwrap();
    mock.setup(Call::new(&r.get, [Arg::any(TypeRef::Str)]))
        .unwrap()
        .returns(5)
        .unwrap()
        .at_most(2)
        .unwrap();

    for _ in 0..2 {
        assert_eq!(mock.call(&r.get, vec![Value::from("a")]).unwrap(), Value::Int(5));
    }
    let err = mock.call(&r.get, vec![Value::from("a")]).unwrap_err();
    assert_eq!(err.reason(), Reason::MoreThanNCalls);

    mock.setup(Call::new(&r.save, [Arg::any(TypeRef::Str)]))
        .unwrap()
        .at_most_once()
        .unwrap();
    mock.call(&r.save, vec![Value::from("a")]).unwrap();
    let err = mock.call(&r.save, vec![Value::from("a")]).unwrap_err();
    assert_eq!(err.reason(), Reason::MoreThanOneCall);
}

#[test]
fn verification_never_downgrades_state() {
    let r = repo();
    let mock = Mock::new(&r.contract).unwrap();
    mock.call(&r.get, vec![Value::from("a")]).unwrap();

    mock.verify_call(Call::new(&r.get, [Arg::from("a")]), Times::once())
        .unwrap();
    mock.verify_call(Call::new(&r.get, [Arg::any(TypeRef::Str)]), Times::at_least_once())
        .unwrap();
    assert!(
        mock.verify_call(Call::new(&r.get, [Arg::from("b")]), Times::once())
            .is_err()
    );
    assert_eq!(mock.invocations()[0].state(), VerificationState::Verified);
}

#[test]
fn fluent_chains_share_inner_mocks() {
    let t = tree();
    let root = Mock::new(&t.root).unwrap();
    let value = root.setup(chain(&t, "Value")).unwrap().returns(1).unwrap();
    let name = root.setup(chain(&t, "Name")).unwrap().returns("n").unwrap();

    assert_eq!(root.setups().len(), 1);
    assert_eq!(value.mock(), name.mock());
    assert_eq!(value.mock().setups().len(), 2);
    assert!(value.verify().is_err());

    let child_getter = t.root.property("Child").unwrap().getter().unwrap();
    let child = root.call(child_getter, vec![]).unwrap();
    let value_getter = t.child.property("Value").unwrap().getter().unwrap();
    child.as_mock().unwrap().call(value_getter, vec![]).unwrap();
    value.verify().unwrap();
}

#[test]
fn sequences_enforce_order_across_mocks() {
    let r = repo();
    let first = Mock::new(&r.contract).unwrap();
    let second = Mock::new(&r.contract).unwrap();

    let in_order = Sequence::new(SequenceMode::Strict, &[&first, &second]);
    in_order
        .step(Times::once(), || first.setup(Call::new(&r.next, [])))
        .unwrap();
    in_order
        .step(Times::once(), || second.setup(Call::new(&r.next, [])))
        .unwrap();
    first.call(&r.next, vec![]).unwrap();
    second.call(&r.next, vec![]).unwrap();
    in_order.verify().unwrap();

    let a = Mock::new(&r.contract).unwrap();
    let b = Mock::new(&r.contract).unwrap();
    let reversed = Sequence::new(SequenceMode::Strict, &[&a, &b]);
    reversed
        .step(Times::once(), || a.setup(Call::new(&r.next, [])))
        .unwrap();
    reversed
        .step(Times::once(), || b.setup(Call::new(&r.next, [])))
        .unwrap();
    let _ = b.call(&r.next, vec![]);
    let _ = a.call(&r.next, vec![]);
    assert!(reversed.verify().is_err());
}

#[test]
fn exactly_zero_and_never_are_interchangeable() {
    assert_eq!(Times::exactly(0), Times::never());
    for count in 0..4 {
        assert_eq!(
            Times::exactly(0).validate(count),
            Times::never().validate(count)
        );
    }
}

#[test]
fn callbacks_and_events_run_before_the_result() {
    let r = repo();
    let mock = Mock::new(&r.contract).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let saved = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    mock.setup(Call::new(&r.save, [Arg::any(TypeRef::Str)]))
        .unwrap()
        .callback(move |_key: String| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap()
        .raises("Saved", vec![])
        .unwrap();

    let on_saved = saved.clone();
    let handler = Delegate::new(move |_| {
        on_saved.fetch_add(1, Ordering::Relaxed);
        Value::Unit
    });
    let event = r.contract.event("Saved").unwrap();
    mock.call(event.add(), vec![Value::Delegate(handler)]).unwrap();

    mock.call(&r.save, vec![Value::from("a")]).unwrap();
    assert_eq!(calls.load(Ordering::Relaxed), 1);
    assert_eq!(saved.load(Ordering::Relaxed), 1);
}

#[test]
fn configuration_errors_surface_at_registration() {
    let r = repo();
    let mock = Mock::new(&r.contract).unwrap();

    let err = mock
        .setup(Call::new(&r.save, [Arg::any(TypeRef::Str)]))
        .unwrap()
        .returns(1)
        .err()
        .unwrap();
    assert_eq!(err.reason(), Reason::InvalidSetup);

    let err = mock
        .setup(Call::new(&r.get, [Arg::any(TypeRef::Str)]))
        .unwrap()
        .returns("text")
        .err()
        .unwrap();
    assert_eq!(err.reason(), Reason::InvalidSetup);

    let err = mock
        .setup(Call::new(&r.get, [Arg::any(TypeRef::Str)]))
        .unwrap()
        .returns_with(|a: String, b: String| a.len() + b.len())
        .err()
        .unwrap();
    assert_eq!(err.reason(), Reason::InvalidSetup);

    let err = mock.setup(Call::new(&r.get, [Arg::from(1)])).err().unwrap();
    assert_eq!(err.reason(), Reason::UnsupportedExpression);
}
