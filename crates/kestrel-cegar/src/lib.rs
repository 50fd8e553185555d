//! Counterexample-guided refinement on top of the reachability engine.
//!
//! A [`RefinementController`] runs the [`Engine`](kestrel_engine::Engine)
//! until it reports target states, hands the graph paths leading to each
//! target to a [`CounterexampleChecker`], and either reports a confirmed bug
//! or cuts the spurious path out of the graph before exploring further. Any
//! loss of soundness along the way is recorded in the returned status and
//! surfaces in the final [`Verdict`].

mod controller;
mod counterexample;
mod error;
mod options;
mod verdict;

pub use controller::{RefinementController, RefinementOutcome, RefinementResult};
pub use counterexample::{Counterexample, CounterexampleChecker};
pub use error::{CheckerError, RefinementError};
pub use options::CegarOptions;
pub use verdict::Verdict;
