//! Verification of recorded calls against expectations.

use std::{collections::HashSet, sync::Arc};

use tracing::debug;

use crate::{
    CallChain, CallMismatch, CallShape, Error, Invocation, Mock, Result, Setup, SetupId, Times,
    VerificationState, compile::compile_chain, setup::Pattern,
};

/// Which setups [`Mock::verify`] and [`Mock::verify_all`] check.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Selection {
    Verifiable,
    All,
}

impl Selection {
    fn includes(self, setup: &Setup, overridden: &HashSet<SetupId>) -> bool {
        match self {
            Selection::Verifiable => setup.is_verifiable(),
            Selection::All => {
                matches!(setup.pattern(), Pattern::Call(_))
                    && !setup.is_conditional()
                    && !overridden.contains(&setup.id())
            }
        }
    }
}

impl Mock {
    /// Check that calls matching `chain` happened `times`.
    ///
    /// For multi-hop chains only the last hop is counted; every earlier hop
    /// must have returned an inner substitute that received the rest of the
    /// chain. Matching calls become [`Verified`](VerificationState::Verified)
    /// on success.
    ///
    /// # Errors
    ///
    /// [`Error::NoMatchingCalls`] with the configured setups and the actual
    /// calls when the count does not fit; compile errors for bad chains.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// repo.verify_call(Call::new(&get, [Arg::any(TypeRef::Str)]), Times::at_least(2))?;
    /// root.verify_call(
    ///     CallChain::from(Call::get(child)?).then(Call::get(value)?),
    ///     Times::once(),
    /// )?;
    /// ```
    pub fn verify_call(&self, chain: impl Into<CallChain>, times: Times) -> Result {
        self.check_calls(chain.into(), times, None)
    }

    /// Like [`verify_call`](Mock::verify_call), prefixing failures with
    /// `message`.
    pub fn verify_call_with_message(
        &self,
        chain: impl Into<CallChain>,
        times: Times,
        message: &str,
    ) -> Result {
        self.check_calls(chain.into(), times, Some(message.to_string()))
    }

    fn check_calls(&self, chain: CallChain, times: Times, message: Option<String>) -> Result {
        let shapes = compile_chain(self.contract(), &chain)?;
        let mut contributing = Vec::new();
        let count = count_matches(self, &shapes, &mut contributing);

        if times.validate(count) {
            for invocation in contributing {
                invocation.advance(VerificationState::Verified);
            }
            return Ok(());
        }

        let described: Vec<String> = shapes.iter().map(CallShape::to_string).collect();
        let error = Error::NoMatchingCalls(Box::new(CallMismatch {
            message,
            expectation: format!("{}{}", times.message(count), described.join(" -> ")),
            actual: count,
            setups: self.setups().iter().map(|s| s.to_string()).collect(),
            invocations: self.invocations().iter().map(|i| i.to_string()).collect(),
        }));
        debug!(mock = %self.name(), error = %error, "verification failed");
        Err(error)
    }

    /// Check every setup marked [`verifiable`](crate::SetupHandle::verifiable),
    /// including those on inner substitutes.
    pub fn verify(&self) -> Result {
        self.check_setups(Selection::Verifiable)
    }

    /// Check every unconditional setup that is not overridden by a newer one,
    /// including those on inner substitutes. Property stubs are not checked.
    pub fn verify_all(&self) -> Result {
        self.check_setups(Selection::All)
    }

    fn check_setups(&self, selection: Selection) -> Result {
        let mut unmatched = Vec::new();
        let mut visited = Vec::new();
        collect_unmatched(self, selection, &mut visited, &mut unmatched);
        if unmatched.is_empty() {
            return Ok(());
        }
        let error = Error::UnmatchedSetups {
            mock: self.name().to_string(),
            setups: unmatched,
        };
        debug!(mock = %self.name(), error = %error, "verification failed");
        Err(error)
    }

    /// Fail if any call, here or on reachable inner substitutes, has not
    /// been verified.
    ///
    /// Calls that returned an inner substitute which was itself called are
    /// covered by the calls on that substitute.
    pub fn verify_no_other_calls(&self) -> Result {
        let mut unverified = Vec::new();
        let mut visited = Vec::new();
        collect_unverified(self, &mut visited, &mut unverified);
        if unverified.is_empty() {
            return Ok(());
        }
        let error = Error::UnverifiedInvocations {
            mock: self.name().to_string(),
            invocations: unverified,
        };
        debug!(mock = %self.name(), error = %error, "verification failed");
        Err(error)
    }
}

/// Count calls matching the last of `shapes` reachable from `mock` through
/// the earlier ones. Each inner substitute is counted once per hop.
fn count_matches(
    mock: &Mock,
    shapes: &[CallShape],
    contributing: &mut Vec<Arc<Invocation>>,
) -> usize {
    let Some((hop, rest)) = shapes.split_first() else {
        return 0;
    };
    let matching = mock
        .log()
        .snapshot()
        .into_iter()
        .filter(|i| hop.is_match(i));

    if rest.is_empty() {
        let before = contributing.len();
        contributing.extend(matching);
        return contributing.len() - before;
    }

    let mut counted: Vec<(Mock, usize)> = Vec::new();
    let mut total = 0;
    for invocation in matching {
        let Some(inner) = invocation.returned_mock() else {
            continue;
        };
        let found = match counted.iter().find(|(m, _)| *m == inner) {
            Some((_, n)) => *n,
            None => {
                let n = count_matches(&inner, rest, contributing);
                total += n;
                counted.push((inner, n));
                n
            }
        };
        if found > 0 {
            contributing.push(invocation);
        }
    }
    total
}

fn collect_unmatched(
    mock: &Mock,
    selection: Selection,
    visited: &mut Vec<Mock>,
    unmatched: &mut Vec<String>,
) {
    if visited.contains(mock) {
        return;
    }
    visited.push(mock.clone());

    let overridden = mock.registry().overridden();
    let invocations = mock.log().snapshot();
    for setup in mock.registry().snapshot() {
        if let Some(inner) = setup.returned_mock() {
            collect_unmatched(&inner, selection, visited, unmatched);
        }
        if setup.is_inner_mock() {
            continue;
        }
        if !selection.includes(&setup, &overridden) {
            continue;
        }
        let matched: Vec<&Arc<Invocation>> = invocations
            .iter()
            .filter(|i| i.matched_setup() == Some(setup.id()))
            .collect();
        let times = setup.expected_times().unwrap_or_default();
        if times.validate(matched.len()) {
            for invocation in matched {
                invocation.advance(VerificationState::Verified);
            }
        } else {
            unmatched.push(format!("{}{setup}", times.message(matched.len())));
        }
    }
}

fn collect_unverified(mock: &Mock, visited: &mut Vec<Mock>, unverified: &mut Vec<String>) {
    if visited.contains(mock) {
        return;
    }
    visited.push(mock.clone());

    let mut nested = mock.registry().returned_mocks();
    for invocation in mock.log().snapshot() {
        let returned = invocation.returned_mock();
        if let Some(inner) = &returned {
            if !nested.contains(inner) {
                nested.push(inner.clone());
            }
        }
        if invocation.is_verified() {
            continue;
        }
        if returned.is_some_and(|inner| !inner.log().is_empty()) {
            continue;
        }
        unverified.push(invocation.to_string());
    }
    for inner in nested {
        collect_unverified(&inner, visited, unverified);
    }
}
