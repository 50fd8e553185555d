use kestrel_blocks::Block;
use kestrel_cfa::CfaNode;

use crate::ReducerError;

/// Memoization key of a reduced block entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemoKey<S, P> {
    state: S,
    precision: P,
}

impl<S, P> MemoKey<S, P> {
    pub fn new(state: S, precision: P) -> Self {
        Self { state, precision }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn precision(&self) -> &P {
        &self.precision
    }
}

/// Projection of states and precisions onto a block's variables, and the
/// inverse re-expansion into the caller context.
///
/// For every state `s`, block `b` and call node `n`,
/// `expand(s, b, reduce(s, b, n))` must agree with `s` on every fact about
/// variables outside `b`.
pub trait Reducer<S, P> {
    /// Drop everything `state` tracks about variables `block` never touches.
    fn reduce(&self, state: &S, block: &Block, call_node: CfaNode) -> Result<S, ReducerError>;

    /// Re-add the block-external facts of `root` to a block exit state.
    fn expand(&self, root: &S, block: &Block, reduced: &S) -> Result<S, ReducerError>;

    fn reduce_precision(&self, precision: &P, block: &Block) -> Result<P, ReducerError>;

    fn expand_precision(
        &self,
        root: &P,
        block: &Block,
        reduced: &P,
    ) -> Result<P, ReducerError>;

    /// Repair information lost across a call boundary. Domains without such
    /// information reject the request.
    fn rebuild_after_function_call(
        &self,
        _root: &S,
        _entry: CfaNode,
        _expanded: &S,
        _exit: CfaNode,
    ) -> Result<S, ReducerError> {
        Err(ReducerError::Unsupported("rebuild after function call"))
    }

    fn hash_key(&self, state: &S, precision: &P) -> MemoKey<S, P>
    where
        S: Clone,
        P: Clone,
    {
        MemoKey::new(state.clone(), precision.clone())
    }
}
