//! Assertion helpers for the structural laws of partitionings, reducers and
//! reachability graphs.
//!
//! Each helper checks every sample and collects all violations into a single
//! report, so every broken law shows up at once.

use std::collections::BTreeSet;
use std::fmt::{Debug, Write};

use kestrel_blocks::{Block, BlockPartitioning};
use kestrel_cfa::CfaNode;
use kestrel_engine::{AbstractState, Arg, Precision, Reducer};

fn report(what: &str, violations: Vec<String>) {
    if violations.is_empty() {
        return;
    }
    let mut msg = format!("{} {what} violation(s):\n", violations.len());
    for (i, v) in violations.iter().enumerate() {
        let _ = writeln!(msg, "  {}. {}", i + 1, v);
    }
    panic!("{msg}");
}

/// Check that expanding a reduced state restores what the original state
/// knows outside the block.
///
/// `outside` extracts the caller-visible facts of a state that `block` does
/// not touch. For every sample `s` this verifies
/// `outside(expand(s, b, reduce(s, b, n))) == outside(s)`.
pub fn assert_reducer_round_trip<S, P, R, F, T>(
    reducer: &R,
    block: &Block,
    call_node: CfaNode,
    states: &[S],
    outside: F,
) where
    S: AbstractState,
    P: Precision,
    R: Reducer<S, P>,
    F: Fn(&S, &Block) -> T,
    T: PartialEq + Debug,
{
    let mut violations = Vec::new();
    for state in states {
        let reduced = match reducer.reduce(state, block, call_node) {
            Ok(reduced) => reduced,
            Err(err) => {
                violations.push(format!("reduce({state:?}) failed: {err}"));
                continue;
            }
        };
        let expanded = match reducer.expand(state, block, &reduced) {
            Ok(expanded) => expanded,
            Err(err) => {
                violations.push(format!("expand({state:?}) failed: {err}"));
                continue;
            }
        };
        let before = outside(state, block);
        let after = outside(&expanded, block);
        if before != after {
            violations.push(format!(
                "round trip of {state:?} changed outside facts: {before:?} became {after:?}"
            ));
        }
    }
    report("reducer round-trip", violations);
}

/// Check that the graph is internally consistent and its covering relation
/// is acyclic.
pub fn assert_arg_integrity<S: AbstractState>(arg: &Arg<S>) {
    let mut violations = Vec::new();
    if let Err(err) = arg.check_consistency() {
        violations.push(err.to_string());
    }
    if !arg.covering_is_acyclic() {
        violations.push("covering relation has a cycle".to_string());
    }
    for id in arg.ids() {
        if let Some(by) = arg.covered_by(id) {
            if arg.is_covered(by) {
                violations.push(format!("{id} is covered by covered state {by}"));
            }
        }
    }
    report("graph integrity", violations);
}

/// Check that register nodes are unique, call-node sets are non-empty, and
/// every block references at least the variables of the blocks it calls.
pub fn assert_partitioning_laws(partitioning: &BlockPartitioning) {
    let mut violations = Vec::new();
    let mut registers = BTreeSet::new();
    for block in partitioning.blocks() {
        if !registers.insert(block.register_node()) {
            violations.push(format!("register node {} is shared", block.register_node()));
        }
        if block.call_nodes().is_empty() {
            violations.push(format!("{} has no call nodes", block.id()));
        }
        for &callee in block.inner_function_calls() {
            let Some(inner) = partitioning.block_for_call_node(callee) else {
                continue;
            };
            if !inner
                .referenced_variables()
                .is_subset(block.referenced_variables())
            {
                violations.push(format!(
                    "{} misses variables of called block {}",
                    block.id(),
                    inner.id()
                ));
            }
        }
    }
    report("partitioning law", violations);
}
