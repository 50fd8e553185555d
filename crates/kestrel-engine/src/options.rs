use crate::WaitlistOrder;

/// Engine configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineOptions {
    waitlist_order: WaitlistOrder,
    /// Report a completed run as imprecise, so that "no target found" is
    /// never read as a proof.
    report_false_as_unknown: bool,
    /// Summarize the blocks of the configured partitioning.
    block_modular: bool,
    /// Pass expanded function exits through
    /// [`Reducer::rebuild_after_function_call`](crate::Reducer::rebuild_after_function_call).
    rebuild_after_function_call: bool,
}

#[bon::bon]
impl EngineOptions {
    #[builder]
    pub fn new(
        #[builder(default)] waitlist_order: WaitlistOrder,
        #[builder(default)] report_false_as_unknown: bool,
        #[builder(default)] block_modular: bool,
        #[builder(default)] rebuild_after_function_call: bool,
    ) -> Self {
        Self {
            waitlist_order,
            report_false_as_unknown,
            block_modular,
            rebuild_after_function_call,
        }
    }
}

impl EngineOptions {
    pub fn waitlist_order(&self) -> WaitlistOrder {
        self.waitlist_order
    }

    pub fn report_false_as_unknown(&self) -> bool {
        self.report_false_as_unknown
    }

    pub fn block_modular(&self) -> bool {
        self.block_modular
    }

    pub fn rebuild_after_function_call(&self) -> bool {
        self.rebuild_after_function_call
    }
}
