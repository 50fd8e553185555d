/// Refinement configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CegarOptions {
    /// Keep exploring after an infeasible counterexample instead of failing
    /// with [`RefinementError::InfeasibleCounterexample`](crate::RefinementError::InfeasibleCounterexample).
    continue_after_infeasible_error: bool,
    /// Detach the covering relation of infeasible paths before continuing.
    /// Without it, a run that saw an infeasible counterexample is unsound.
    remove_infeasible_errors: bool,
    /// Check every unchecked target after a run, not only the one the run
    /// stopped at.
    check_all_targets: bool,
}

impl Default for CegarOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[bon::bon]
impl CegarOptions {
    #[builder]
    pub fn new(
        #[builder(default = true)] continue_after_infeasible_error: bool,
        #[builder(default)] remove_infeasible_errors: bool,
        #[builder(default)] check_all_targets: bool,
    ) -> Self {
        Self {
            continue_after_infeasible_error,
            remove_infeasible_errors,
            check_all_targets,
        }
    }
}

impl CegarOptions {
    pub fn continue_after_infeasible_error(&self) -> bool {
        self.continue_after_infeasible_error
    }

    pub fn remove_infeasible_errors(&self) -> bool {
        self.remove_infeasible_errors
    }

    pub fn check_all_targets(&self) -> bool {
        self.check_all_targets
    }
}
