use kestrel_engine::{ArgError, ArgStateId, EngineError};

/// Failure of a feasibility checker.
#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    #[error("counterexample check failed: {0}")]
    Failed(String),
    #[error("checker does not support {0}")]
    Unsupported(&'static str),
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl CheckerError {
    pub fn custom<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Custom(Box::new(error))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RefinementError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("feasibility check of {target} failed")]
    Checker {
        target: ArgStateId,
        #[source]
        source: CheckerError,
    },
    /// Raised instead of continuing when the configuration asks for every
    /// counterexample to be real.
    #[error("infeasible counterexample along {}", render_path(.path))]
    InfeasibleCounterexample { path: Vec<ArgStateId> },
    #[error(transparent)]
    Arg(#[from] ArgError),
}

fn render_path(path: &[ArgStateId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
