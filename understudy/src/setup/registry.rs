use std::{collections::HashSet, sync::Arc};

use parking_lot::Mutex;

use super::{Pattern, Setup, SetupId};
use crate::{CallShape, Invocation, Mock, sequence::StepCondition};

/// Outcome of [`SetupRegistry::find_match`].
pub(crate) struct Resolution {
    pub(crate) setup: Option<Arc<Setup>>,
    /// A strict sequence step that claims the call but is not its turn.
    pub(crate) out_of_order: Option<StepCondition>,
}

/// Setups of one substitute in registration order.
#[derive(Default)]
pub(crate) struct SetupRegistry {
    setups: Mutex<Vec<Arc<Setup>>>,
}

impl SetupRegistry {
    pub(crate) fn add(&self, setup: Arc<Setup>) {
        self.setups.lock().push(setup);
    }

    /// Find the setup that answers `invocation`.
    ///
    /// Scans newest first. The newest matching setup is the candidate, but
    /// an older setup declared on exactly the invoked method wins over a
    /// candidate that only matches through an override. Conditional setups
    /// take part only while their condition holds and never end the scan
    /// early.
    ///
    /// Patterns and conditions are evaluated on a snapshot, so matchers and
    /// conditions may call back into the substitute.
    pub(crate) fn find_match(&self, invocation: &Invocation) -> Resolution {
        let setups = self.snapshot();
        let mut candidate: Option<&Arc<Setup>> = None;
        let mut out_of_order: Option<StepCondition> = None;

        for setup in setups.iter().rev() {
            if !setup.pattern().is_match(invocation) {
                continue;
            }
            let condition = setup.condition();
            if let Some(condition) = &condition {
                if !condition.holds() {
                    if out_of_order.is_none() {
                        out_of_order = setup.step().filter(StepCondition::is_strict);
                    }
                    continue;
                }
            }
            let exact = setup.pattern().is_exact(invocation.method());
            match candidate {
                None => candidate = Some(setup),
                Some(newer) if exact && !newer.pattern().is_exact(invocation.method()) => {
                    candidate = Some(setup);
                }
                Some(_) => {}
            }
            if exact && condition.is_none() {
                break;
            }
        }

        let setup = candidate.cloned();
        let out_of_order = out_of_order.filter(|violated| {
            !setup
                .as_ref()
                .and_then(|s| s.step())
                .is_some_and(|step| step.same_sequence(violated))
        });
        Resolution {
            setup,
            out_of_order,
        }
    }

    /// Remove every setup for which `predicate` holds. Returns how many were
    /// removed.
    pub(crate) fn clear_where(&self, predicate: impl Fn(&Setup) -> bool) -> usize {
        let mut setups = self.setups.lock();
        let before = setups.len();
        setups.retain(|s| !predicate(s));
        before - setups.len()
    }

    /// Setups oldest first.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Setup>> {
        self.setups.lock().clone()
    }

    /// Unconditional setups shadowed by a newer unconditional setup with an
    /// equivalent pattern.
    pub(crate) fn overridden(&self) -> HashSet<SetupId> {
        let setups = self.snapshot();
        let unconditional: Vec<&Arc<Setup>> =
            setups.iter().filter(|s| !s.is_conditional()).collect();
        let mut overridden = HashSet::new();
        for (i, older) in unconditional.iter().enumerate() {
            if unconditional[i + 1..]
                .iter()
                .any(|newer| newer.pattern().equivalent(older.pattern()))
            {
                overridden.insert(older.id());
            }
        }
        overridden
    }

    /// Newest inner-mock setup whose shape is equivalent to `shape`.
    pub(crate) fn find_inner_mock(&self, shape: &CallShape) -> Option<(Mock, Arc<Setup>)> {
        self.setups.lock().iter().rev().find_map(|setup| {
            let same = matches!(setup.pattern(), Pattern::Call(s) if s.equivalent(shape));
            if !same {
                return None;
            }
            setup.inner_mock().map(|inner| (inner, setup.clone()))
        })
    }

    /// Substitutes handed out by setups, without duplicates.
    pub(crate) fn returned_mocks(&self) -> Vec<Mock> {
        let mut mocks: Vec<Mock> = Vec::new();
        for setup in self.snapshot() {
            if let Some(inner) = setup.returned_mock() {
                if !mocks.contains(&inner) {
                    mocks.push(inner);
                }
            }
        }
        mocks
    }

    pub(crate) fn len(&self) -> usize {
        self.setups.lock().len()
    }
}
