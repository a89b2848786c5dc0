//! Ordering constraints across one or more substitutes.

use std::{collections::HashSet, fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{Error, Invocation, Mock, Result, SetupId, Times, setup::Condition};

/// How a [`Sequence`] treats its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SequenceMode {
    /// Steps run once through, in order. A call that matches a step out of
    /// turn is a violation.
    #[default]
    Strict,
    /// After the last step the sequence starts over. Out-of-turn calls are
    /// not answered by the step and fall through to other setups.
    Cyclic,
}

struct Step {
    setup: SetupId,
    description: String,
    times: Times,
    count: usize,
    executions: Vec<usize>,
}

struct Cursor {
    steps: Vec<Step>,
    current: usize,
    completed_cycles: usize,
    executions: usize,
    violations: Vec<String>,
}

impl Cursor {
    fn next_index(&self, mode: SequenceMode) -> Option<usize> {
        let next = self.current + 1;
        if next < self.steps.len() {
            Some(next)
        } else if mode == SequenceMode::Cyclic && !self.steps.is_empty() {
            Some(0)
        } else {
            None
        }
    }

    fn is_eligible(&self, index: usize, mode: SequenceMode) -> bool {
        let Some(current) = self.steps.get(self.current) else {
            return false;
        };
        if self.stays_on(index) {
            return true;
        }
        self.next_index(mode) == Some(index) && current.count >= current.times.lower_bound()
    }

    fn stays_on(&self, index: usize) -> bool {
        index == self.current
            && self
                .steps
                .get(index)
                .is_some_and(|s| s.count < s.times.upper_bound())
    }
}

struct SequenceState {
    mode: SequenceMode,
    cursor: Mutex<Cursor>,
}

/// Sequence condition attached to the setup of one step.
#[derive(Clone)]
pub(crate) struct StepCondition {
    state: Arc<SequenceState>,
    index: usize,
}

impl StepCondition {
    pub(crate) fn holds(&self) -> bool {
        self.state
            .cursor
            .lock()
            .is_eligible(self.index, self.state.mode)
    }

    /// Advance the cursor after this step answered a call.
    pub(crate) fn on_selected(&self) {
        let mut cursor = self.state.cursor.lock();
        if !cursor.stays_on(self.index) {
            if self.index <= cursor.current {
                // wrapped around
                cursor.completed_cycles += 1;
                for step in &mut cursor.steps {
                    step.count = 0;
                }
            }
            cursor.current = self.index;
        }
        cursor.executions += 1;
        let execution = cursor.executions;
        if let Some(step) = cursor.steps.get_mut(self.index) {
            step.count += 1;
            step.executions.push(execution);
        }
    }

    pub(crate) fn is_strict(&self) -> bool {
        self.state.mode == SequenceMode::Strict
    }

    pub(crate) fn same_sequence(&self, other: &StepCondition) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Record a call that matched this step out of turn. Returns the
    /// violation message.
    pub(crate) fn record_violation(&self, invocation: &Invocation) -> String {
        let mut cursor = self.state.cursor.lock();
        let expected = cursor
            .steps
            .get(cursor.current)
            .map(|s| s.description.clone())
            .unwrap_or_default();
        let message = format!(
            "{invocation} was called out of order: it is step {} of the sequence, but step {} ({expected}) is current",
            self.index + 1,
            cursor.current + 1,
        );
        warn!(call = %invocation, step = self.index + 1, "sequence violation");
        cursor.violations.push(message.clone());
        message
    }
}

/// An ordering constraint over setups on one or more substitutes.
///
/// Each [`step`](Sequence::step) wraps an ordinary setup registration and
/// turns the setup it creates into the next step of the sequence. A step's
/// setup only answers calls while it is the step's turn.
///
/// # Example
///
/// ```rust,ignore
/// let seq = Sequence::new(SequenceMode::Strict, &[&db, &cache]);
/// seq.step(Times::once(), || db.setup(Call::new(&open, [])))?;
/// seq.step(Times::at_least_once(), || {
///     cache.setup(Call::new(&put, [Arg::any(TypeRef::Str)]))
/// })?;
///
/// // ... exercise the code under test ...
///
/// seq.verify()?;
/// ```
pub struct Sequence {
    state: Arc<SequenceState>,
    observed: Vec<Mock>,
}

impl Sequence {
    pub fn new(mode: SequenceMode, mocks: &[&Mock]) -> Self {
        Self {
            state: Arc::new(SequenceState {
                mode,
                cursor: Mutex::new(Cursor {
                    steps: Vec::new(),
                    current: 0,
                    completed_cycles: 0,
                    executions: 0,
                    violations: Vec::new(),
                }),
            }),
            observed: mocks.iter().map(|m| (*m).clone()).collect(),
        }
    }

    pub fn mode(&self) -> SequenceMode {
        self.state.mode
    }

    /// Declare the next step.
    ///
    /// `register` must register exactly one setup (possibly multi-hop) on an
    /// observed substitute. The newest terminal setup it adds becomes the
    /// step; calls it answers count against `times`.
    pub fn step<T, F>(&self, times: Times, register: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let before: HashSet<SetupId> = self
            .reachable_setups()
            .iter()
            .map(|(_, s)| s.id())
            .collect();
        let out = register()?;
        let added = self
            .reachable_setups()
            .into_iter()
            .filter(|(_, s)| !before.contains(&s.id()) && !s.is_inner_mock())
            .max_by_key(|(_, s)| s.id());

        let Some((mock, setup)) = added else {
            return Err(Error::unsupported(
                "sequence step did not register a setup on an observed mock",
            ));
        };

        let index = {
            let mut cursor = self.state.cursor.lock();
            cursor.steps.push(Step {
                setup: setup.id(),
                description: setup.to_string(),
                times,
                count: 0,
                executions: Vec::new(),
            });
            cursor.steps.len() - 1
        };
        setup.set_condition(Condition::Step(StepCondition {
            state: self.state.clone(),
            index,
        }));
        debug!(mock = %mock.name(), setup = %setup, step = index + 1, "sequence step");
        Ok(out)
    }

    /// Every setup on the observed substitutes and the inner substitutes
    /// reachable from them.
    fn reachable_setups(&self) -> Vec<(Mock, Arc<crate::Setup>)> {
        let mut visited: Vec<Mock> = Vec::new();
        let mut pending: Vec<Mock> = self.observed.clone();
        let mut out = Vec::new();
        while let Some(mock) = pending.pop() {
            if visited.contains(&mock) {
                continue;
            }
            for setup in mock.registry().snapshot() {
                if let Some(inner) = setup.inner_mock() {
                    pending.push(inner);
                }
                out.push((mock.clone(), setup));
            }
            visited.push(mock);
        }
        out
    }

    /// Execution indices of each step, in step order.
    pub fn executions(&self) -> Vec<Vec<usize>> {
        self.state
            .cursor
            .lock()
            .steps
            .iter()
            .map(|s| s.executions.clone())
            .collect()
    }

    /// Setups of the steps, in step order.
    pub fn steps(&self) -> Vec<SetupId> {
        self.state.cursor.lock().steps.iter().map(|s| s.setup).collect()
    }

    /// Report out-of-order calls and steps whose count is not satisfied.
    ///
    /// In cyclic mode, once a full cycle has completed, steps after the
    /// cursor belong to an unfinished cycle and are not checked.
    pub fn verify(&self) -> Result {
        let cursor = self.state.cursor.lock();
        let mut errors: Vec<Error> = cursor
            .violations
            .iter()
            .cloned()
            .map(Error::Sequence)
            .collect();

        let checked = if self.state.mode == SequenceMode::Cyclic && cursor.completed_cycles > 0 {
            cursor.current + 1
        } else {
            cursor.steps.len()
        };
        for (index, step) in cursor.steps.iter().enumerate().take(checked) {
            if !step.times.validate(step.count) {
                errors.push(Error::Sequence(format!(
                    "step {} ({}): {}",
                    index + 1,
                    step.description,
                    step.times.message(step.count).trim_end_matches([':', ' '])
                )));
            }
        }
        match Error::combine(errors) {
            Some(e) => {
                debug!(error = %e, "sequence verification failed");
                Err(e)
            }
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cursor = self.state.cursor.lock();
        f.debug_struct("Sequence")
            .field("mode", &self.state.mode)
            .field("steps", &cursor.steps.len())
            .field("current", &cursor.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Arg, Call, Contract, Method, MockBehavior, Reason, TypeRef, Value};

    struct Fixture {
        db: Mock,
        cache: Mock,
        open: Method,
        put: Method,
    }

    fn fixture(behavior: MockBehavior) -> Fixture {
        let db = Contract::interface("IDb").method("open", [], TypeRef::Unit).build();
        let cache = Contract::interface("ICache")
            .method("put", [crate::Param::new("key", TypeRef::Str)], TypeRef::Unit)
            .build();
        Fixture {
            open: db.method("open").unwrap().clone(),
            put: cache.method("put").unwrap().clone(),
            db: Mock::builder(&db).behavior(behavior).build().unwrap(),
            cache: Mock::builder(&cache).behavior(behavior).build().unwrap(),
        }
    }

    fn two_steps(f: &Fixture, mode: SequenceMode) -> Sequence {
        let seq = Sequence::new(mode, &[&f.db, &f.cache]);
        seq.step(Times::once(), || f.db.setup(Call::new(&f.open, [])))
            .unwrap();
        seq.step(Times::once(), || {
            f.cache.setup(Call::new(&f.put, [Arg::any(TypeRef::Str)]))
        })
        .unwrap();
        seq
    }

    #[test]
    fn calls_in_order_pass() {
        let f = fixture(MockBehavior::Loose);
        let seq = two_steps(&f, SequenceMode::Strict);

        f.db.call(&f.open, vec![]).unwrap();
        f.cache.call(&f.put, vec![Value::from("k")]).unwrap();

        seq.verify().unwrap();
        assert_eq!(seq.executions(), vec![vec![1], vec![2]]);
        assert_eq!(seq.steps().len(), 2);
    }

    #[test]
    fn out_of_order_calls_fail_loose_mocks_immediately() {
        let f = fixture(MockBehavior::Loose);
        let seq = two_steps(&f, SequenceMode::Strict);

        let err = f.cache.call(&f.put, vec![Value::from("k")]).unwrap_err();
        assert_eq!(err.reason(), Reason::Sequence);
        f.db.call(&f.open, vec![]).unwrap();

        let err = seq.verify().unwrap_err();
        assert!(err.reasons().iter().all(|r| *r == Reason::Sequence));
    }

    #[test]
    fn out_of_order_calls_on_strict_mocks_are_unmatched() {
        let f = fixture(MockBehavior::Strict);
        let seq = two_steps(&f, SequenceMode::Strict);

        let err = f.cache.call(&f.put, vec![Value::from("k")]).unwrap_err();
        assert_eq!(err.reason(), Reason::NoSetup);
        assert!(seq.verify().is_err());
    }

    #[test]
    fn unmet_step_counts_fail_verification() {
        let f = fixture(MockBehavior::Loose);
        let seq = Sequence::new(SequenceMode::Strict, &[&f.db, &f.cache]);
        seq.step(Times::exactly(2), || f.db.setup(Call::new(&f.open, [])))
            .unwrap();

        f.db.call(&f.open, vec![]).unwrap();
        assert!(seq.verify().is_err());
        f.db.call(&f.open, vec![]).unwrap();
        seq.verify().unwrap();
    }

    #[test]
    fn cyclic_sequences_wrap_around() {
        let f = fixture(MockBehavior::Loose);
        let seq = two_steps(&f, SequenceMode::Cyclic);

        for _ in 0..2 {
            f.db.call(&f.open, vec![]).unwrap();
            f.cache.call(&f.put, vec![Value::from("k")]).unwrap();
        }
        f.db.call(&f.open, vec![]).unwrap();

        seq.verify().unwrap();
        assert_eq!(seq.executions(), vec![vec![1, 3, 5], vec![2, 4]]);
        assert_eq!(f.db.invocations().iter().filter(|i| i.matched_setup().is_some()).count(), 3);
    }

    #[test]
    fn steps_must_register_a_setup() {
        let f = fixture(MockBehavior::Loose);
        let seq = Sequence::new(SequenceMode::Strict, &[&f.db]);
        let err = seq.step(Times::once(), || Ok(())).unwrap_err();
        assert_eq!(err.reason(), Reason::UnsupportedExpression);
    }
}
