use crate::{
    AbstractState, BoundaryInfoProvider, ConfigError, ForcedCovering, Merge, Precision,
    PrecisionAdjustment, Reducer, StaticPrecisionAdjustment, StopOperator, SummaryApplicator,
    TransferRelation,
};

/// The operator set of one configured analysis.
///
/// Transfer relation, merge and stop are mandatory; everything else is an
/// optional capability.
pub struct Cpa<S, P> {
    pub(crate) transfer: Box<dyn TransferRelation<S, P>>,
    pub(crate) merge: Merge<S, P>,
    pub(crate) stop: Box<dyn StopOperator<S, P>>,
    pub(crate) precision_adjustment: Box<dyn PrecisionAdjustment<S, P>>,
    pub(crate) forced_covering: Option<Box<dyn ForcedCovering<S, P>>>,
    pub(crate) summary_applicator: Option<Box<dyn SummaryApplicator<S>>>,
    pub(crate) boundary: Option<Box<dyn BoundaryInfoProvider<S>>>,
    pub(crate) reducer: Option<Box<dyn Reducer<S, P>>>,
}

#[bon::bon]
impl<S: AbstractState + 'static, P: Precision + 'static> Cpa<S, P> {
    #[builder]
    pub fn new(
        transfer: Option<Box<dyn TransferRelation<S, P>>>,
        merge: Option<Merge<S, P>>,
        stop: Option<Box<dyn StopOperator<S, P>>>,
        precision_adjustment: Option<Box<dyn PrecisionAdjustment<S, P>>>,
        forced_covering: Option<Box<dyn ForcedCovering<S, P>>>,
        summary_applicator: Option<Box<dyn SummaryApplicator<S>>>,
        boundary: Option<Box<dyn BoundaryInfoProvider<S>>>,
        reducer: Option<Box<dyn Reducer<S, P>>>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            transfer: transfer.ok_or(ConfigError::MissingOperator("transfer"))?,
            merge: merge.ok_or(ConfigError::MissingOperator("merge"))?,
            stop: stop.ok_or(ConfigError::MissingOperator("stop"))?,
            precision_adjustment: precision_adjustment
                .unwrap_or_else(|| Box::new(StaticPrecisionAdjustment)),
            forced_covering,
            summary_applicator,
            boundary,
            reducer,
        })
    }
}

impl<S, P> Cpa<S, P> {
    pub fn merge(&self) -> &Merge<S, P> {
        &self.merge
    }

    pub fn has_reducer(&self) -> bool {
        self.reducer.is_some()
    }

    pub fn reducer(&self) -> Option<&dyn Reducer<S, P>> {
        self.reducer.as_deref()
    }
}

impl<S, P> std::fmt::Debug for Cpa<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpa")
            .field("merge", &self.merge)
            .field("forced_covering", &self.forced_covering.is_some())
            .field("summary_applicator", &self.summary_applicator.is_some())
            .field("boundary", &self.boundary.is_some())
            .field("reducer", &self.reducer.is_some())
            .finish_non_exhaustive()
    }
}
