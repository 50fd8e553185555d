use std::fmt;

use kestrel_engine::AbstractState;

use crate::{Counterexample, RefinementError, RefinementOutcome, RefinementResult};

/// The single answer of a verification run.
#[derive(Clone, Debug)]
pub enum Verdict<S> {
    /// Exhausted the state space soundly and precisely without a feasible
    /// target.
    Safe,
    BugFound(Counterexample<S>),
    /// No feasible target was found, but some part of the state space may
    /// have been dropped.
    SafeButUnsound,
    Inconclusive(String),
}

impl<S> Verdict<S> {
    pub fn is_safe(&self) -> bool {
        matches!(self, Verdict::Safe)
    }

    pub fn counterexample(&self) -> Option<&Counterexample<S>> {
        match self {
            Verdict::BugFound(counterexample) => Some(counterexample),
            _ => None,
        }
    }
}

impl<S> From<Result<RefinementResult<S>, RefinementError>> for Verdict<S> {
    fn from(result: Result<RefinementResult<S>, RefinementError>) -> Self {
        let result = match result {
            Ok(result) => result,
            Err(err) => return Verdict::Inconclusive(err.to_string()),
        };
        match result.outcome {
            RefinementOutcome::BugFound(counterexample) => Verdict::BugFound(counterexample),
            RefinementOutcome::Exhausted if !result.status.is_sound() => Verdict::SafeButUnsound,
            RefinementOutcome::Exhausted if !result.status.is_precise() => {
                Verdict::Inconclusive("no target found by an imprecise analysis".to_string())
            }
            RefinementOutcome::Exhausted => Verdict::Safe,
        }
    }
}

impl<S: AbstractState> fmt::Display for Verdict<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Safe => write!(f, "safe"),
            Verdict::BugFound(counterexample) => write!(f, "bug found: {counterexample}"),
            Verdict::SafeButUnsound => write!(f, "safe, but possibly unsound"),
            Verdict::Inconclusive(reason) => write!(f, "inconclusive: {reason}"),
        }
    }
}
