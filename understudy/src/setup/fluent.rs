use std::{fmt, sync::Arc};

use tracing::debug;

use super::{Pattern, Response, Setup};
use crate::{
    CallChain, CallShape, Error, Mock, Result,
    compile::{compile_chain, hop_contract},
};

/// The per-hop setups created for one multi-hop registration, root first.
///
/// Every hop but the last is an inner-mock setup that hands out the
/// substitute the next hop is registered on.
#[derive(Clone)]
pub struct FluentSetup {
    parts: Vec<(Mock, Arc<Setup>)>,
}

impl FluentSetup {
    pub(crate) fn new(parts: Vec<(Mock, Arc<Setup>)>) -> Self {
        Self { parts }
    }

    /// Substitute and setup of each hop, root first.
    pub fn parts(&self) -> &[(Mock, Arc<Setup>)] {
        &self.parts
    }

    pub fn terminal(&self) -> Option<&Arc<Setup>> {
        self.parts.last().map(|(_, setup)| setup)
    }

    /// Check that every hop has been used.
    ///
    /// Non-terminal hops only need to have been matched. The terminal hop
    /// must meet its expected [`Times`](crate::Times) when it is verifiable, and be
    /// matched at least once otherwise.
    pub fn verify(&self) -> Result {
        let Some((last, non_terminal)) = self.parts.split_last() else {
            return Ok(());
        };
        let mut unmatched = Vec::new();
        for (mock, setup) in non_terminal {
            if mock.matched_count(setup) == 0 {
                unmatched.push(setup.to_string());
            }
        }
        let (mock, terminal) = last;
        let times = terminal.expected_times().unwrap_or_default();
        let count = mock.matched_count(terminal);
        if !times.validate(count) {
            unmatched.push(format!("{}{terminal}", times.message(count)));
        }
        if unmatched.is_empty() {
            Ok(())
        } else {
            Err(Error::UnmatchedSetups {
                mock: self.parts[0].0.name().to_string(),
                setups: unmatched,
            })
        }
    }
}

impl fmt::Display for FluentSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hops: Vec<String> = self.parts.iter().map(|(_, s)| s.to_string()).collect();
        write!(f, "{}", hops.join(" -> "))
    }
}

impl fmt::Debug for FluentSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FluentSetup")
            .field("hops", &self.parts.len())
            .finish()
    }
}

/// Walk `chain` from `root`, reusing or creating inner substitutes for every
/// hop but the last.
///
/// Returns the substitute that receives the terminal setup, the terminal
/// hop's shape, and the inner-mock parts created or reused on the way.
pub(crate) fn resolve_chain(
    root: &Mock,
    chain: &CallChain,
) -> Result<(Mock, CallShape, Vec<(Mock, Arc<Setup>)>)> {
    let mut shapes = compile_chain(root.contract(), chain)?;
    let Some(terminal) = shapes.pop() else {
        return Err(Error::unsupported("empty call chain"));
    };

    let mut current = root.clone();
    let mut parts = Vec::with_capacity(shapes.len() + 1);
    for shape in shapes {
        let (inner, setup) = match current.registry().find_inner_mock(&shape) {
            Some(existing) => existing,
            None => {
                let contract = hop_contract(shape.method())?;
                let name = format!("{}.{}", current.name(), shape.method().name());
                let inner = current.inner_builder(&contract).name(&name).build()?;
                debug!(mock = %current.name(), inner = %inner.name(), "created inner mock");
                let setup = Arc::new(Setup::new(
                    Pattern::Call(shape),
                    Response::InnerMock(inner.clone()),
                    None,
                ));
                current.registry().add(setup.clone());
                (inner, setup)
            }
        };
        parts.push((current, setup));
        current = inner;
    }
    Ok((current, terminal, parts))
}
