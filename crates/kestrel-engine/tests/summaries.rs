use std::collections::BTreeSet;
use std::sync::Arc;

use kestrel_cfa::{Cfa, CfaEdge, CfaNode, EdgeKind, LoopId};
use kestrel_engine::*;
use kestrel_test_utils::*;

/// `main: r = 0; g(); skip` and `g: r = 7`.
struct CallProgram {
    cfa: Cfa,
    transfer: ExplicitTransfer,
    call_edge: CfaEdge,
    g_entry: CfaNode,
    g_exit: CfaNode,
    after: CfaNode,
}

fn call_program() -> CallProgram {
    let mut b = ExplicitProgramBuilder::new();
    let main = b.function("main").unwrap();
    let g = b.function("g").unwrap();
    let call = b.node("main");
    let after = b.node("main");
    b.assign(main.entry, call, "r", Expr::Const(0));
    b.call(call, after, "g");
    b.blank(after, main.exit);
    b.assign(g.entry, g.exit, "r", Expr::Const(7));
    let (cfa, transfer) = b.build("main").unwrap();
    let call_edge = cfa
        .leaving_edges(call)
        .find(|&edge| cfa.edge_kind(edge) == EdgeKind::FunctionCall)
        .unwrap();
    CallProgram {
        cfa,
        transfer,
        call_edge,
        g_entry: g.entry,
        g_exit: g.exit,
        after,
    }
}

/// Bounds calls into one callee; flags states at `discard` as bounded by a
/// loop, and reports an unknown bound kind when entering `unrecognized`.
struct CallBoundary {
    callee_entry: CfaNode,
    call_edge: CfaEdge,
    discard: BTreeSet<CfaNode>,
    unrecognized: Option<CfaNode>,
}

impl CallBoundary {
    fn new(program: &CallProgram) -> Self {
        Self {
            callee_entry: program.g_entry,
            call_edge: program.call_edge,
            discard: BTreeSet::new(),
            unrecognized: None,
        }
    }
}

impl BoundaryInfoProvider<ExplicitState> for CallBoundary {
    fn flags(&self, state: &ExplicitState) -> BoundaryFlags {
        let flag = if self.discard.contains(&state.location) {
            BoundaryFlag::Loop
        } else {
            BoundaryFlag::None
        };
        BoundaryFlags {
            flag,
            ..BoundaryFlags::default()
        }
    }

    fn boundary_info(
        &self,
        _from: &ExplicitState,
        to: &ExplicitState,
        _flags: &BoundaryFlags,
    ) -> BoundedInfo {
        if to.location == self.callee_entry {
            BoundedInfo::Function {
                name: "g".to_string(),
                entry: self.call_edge,
                exits: Vec::new(),
            }
        } else if Some(to.location) == self.unrecognized {
            BoundedInfo::Unrecognized {
                kind: "recursion".to_string(),
            }
        } else {
            BoundedInfo::None
        }
    }
}

/// Function summaries are the callee's value of `r`.
struct ReturnValue {
    return_site: CfaNode,
}

impl SummaryApplicator<ExplicitState> for ReturnValue {
    fn supports(&self, _state: &ExplicitState) -> bool {
        true
    }

    fn apply_function_summary(
        &self,
        state: &ExplicitState,
        summaries: &[SummaryInstance],
        _entry: CfaEdge,
        _exits: &[CfaEdge],
    ) -> Result<Vec<ExplicitState>, CpaError> {
        summaries
            .iter()
            .map(|summary| {
                let value = summary.downcast_ref::<i64>().ok_or_else(|| {
                    CpaError::SummaryApplication("expected an i64 summary".to_string())
                })?;
                let mut next = state.clone().with_value("r", *value);
                next.location = self.return_site;
                Ok(next)
            })
            .collect()
    }

    fn apply_internal_loop_summary(
        &self,
        _state: &ExplicitState,
        _summaries: &[SummaryInstance],
        _entry: CfaEdge,
    ) -> Result<Vec<ExplicitState>, CpaError> {
        Ok(Vec::new())
    }

    fn apply_external_loop_summary(
        &self,
        _state: &ExplicitState,
        _summaries: &[SummaryInstance],
        _entry: CfaEdge,
        _exits: &[CfaEdge],
    ) -> Result<Vec<(CfaEdge, ExplicitState)>, CpaError> {
        Ok(Vec::new())
    }
}

fn explore(
    cfa: &Cfa,
    transfer: ExplicitTransfer,
    boundary: Box<dyn BoundaryInfoProvider<ExplicitState>>,
    applicator: Box<dyn SummaryApplicator<ExplicitState>>,
    summaries: SummaryProvider,
) -> ReachedSet<ExplicitState, ()> {
    let cpa = Cpa::<ExplicitState, ()>::builder()
        .transfer(Box::new(transfer))
        .merge(MergeSep.into())
        .stop(Box::new(StopSep))
        .boundary(boundary)
        .summary_applicator(applicator)
        .build()
        .unwrap();
    let mut engine = Engine::builder()
        .cfa(cfa)
        .cpa(cpa)
        .summaries(summaries)
        .build()
        .unwrap();
    let mut reached = engine.initial_reached_set(ExplicitState::new(cfa.main_entry()), ());
    engine.run(&mut reached).unwrap();
    reached
}

fn run(
    program: &CallProgram,
    boundary: CallBoundary,
    summaries: SummaryProvider,
) -> ReachedSet<ExplicitState, ()> {
    let applicator = ReturnValue {
        return_site: program.after,
    };
    explore(
        &program.cfa,
        program.transfer.clone(),
        Box::new(boundary),
        Box::new(applicator),
        summaries,
    )
}

fn values_at(reached: &ReachedSet<ExplicitState, ()>, location: CfaNode) -> Vec<Option<i64>> {
    values_of(reached, location, "r")
}

fn values_of(
    reached: &ReachedSet<ExplicitState, ()>,
    location: CfaNode,
    variable: &str,
) -> Vec<Option<i64>> {
    reached
        .reached_at(location)
        .into_iter()
        .filter_map(|id| reached.arg().state(id).map(|state| state.value(variable)))
        .collect()
}

#[test]
fn test_function_summary_replaces_call() {
    init_tracing();
    let program = call_program();
    let mut store = InMemorySummaryStore::new();
    assert!(store.insert("g".to_string(), SummaryInstance::new(5_i64)));
    let summaries = SummaryProvider::new().with_function_store(Arc::new(store));

    let reached = run(&program, CallBoundary::new(&program), summaries);
    assert!(reached.reached_at(program.g_entry).is_empty());
    assert!(reached.reached_at(program.g_exit).is_empty());
    assert_eq!(values_at(&reached, program.after), vec![Some(5)]);
}

#[test]
fn test_call_without_summary_is_explored() {
    let program = call_program();
    let reached = run(&program, CallBoundary::new(&program), SummaryProvider::new());
    assert_eq!(reached.reached_at(program.g_entry).len(), 1);
    assert_eq!(values_at(&reached, program.after), vec![Some(7)]);
}

#[test]
fn test_flagged_successor_without_bound_is_discarded() {
    let program = call_program();
    let mut boundary = CallBoundary::new(&program);
    boundary.discard.insert(program.g_exit);
    let reached = run(&program, boundary, SummaryProvider::new());
    assert_eq!(reached.reached_at(program.g_entry).len(), 1);
    assert!(reached.reached_at(program.g_exit).is_empty());
    assert!(reached.reached_at(program.after).is_empty());
}

#[test]
fn test_unrecognized_bound_keeps_successor() {
    let program = call_program();
    let mut boundary = CallBoundary::new(&program);
    boundary.unrecognized = Some(program.after);
    let reached = run(&program, boundary, SummaryProvider::new());
    assert_eq!(values_at(&reached, program.after), vec![Some(7)]);
}

/// A function summary that no successor satisfies.
struct NoReturn;

impl SummaryApplicator<ExplicitState> for NoReturn {
    fn supports(&self, _state: &ExplicitState) -> bool {
        true
    }

    fn apply_function_summary(
        &self,
        _state: &ExplicitState,
        _summaries: &[SummaryInstance],
        _entry: CfaEdge,
        _exits: &[CfaEdge],
    ) -> Result<Vec<ExplicitState>, CpaError> {
        Ok(Vec::new())
    }

    fn apply_internal_loop_summary(
        &self,
        _state: &ExplicitState,
        _summaries: &[SummaryInstance],
        _entry: CfaEdge,
    ) -> Result<Vec<ExplicitState>, CpaError> {
        Ok(Vec::new())
    }

    fn apply_external_loop_summary(
        &self,
        _state: &ExplicitState,
        _summaries: &[SummaryInstance],
        _entry: CfaEdge,
        _exits: &[CfaEdge],
    ) -> Result<Vec<(CfaEdge, ExplicitState)>, CpaError> {
        Ok(Vec::new())
    }
}

#[test]
fn test_empty_function_summary_result_keeps_call() {
    let program = call_program();
    let mut store = InMemorySummaryStore::new();
    store.insert("g".to_string(), SummaryInstance::new(5_i64));
    let summaries = SummaryProvider::new().with_function_store(Arc::new(store));

    let reached = explore(
        &program.cfa,
        program.transfer.clone(),
        Box::new(CallBoundary::new(&program)),
        Box::new(NoReturn),
        summaries,
    );
    assert_eq!(reached.reached_at(program.g_entry).len(), 1);
    assert_eq!(values_at(&reached, program.after), vec![Some(7)]);
}

/// Bounds the first entry into a loop head at nesting depth one.
struct LoopBoundary {
    id: LoopId,
    head: CfaNode,
    entry: CfaEdge,
}

impl BoundaryInfoProvider<ExplicitState> for LoopBoundary {
    fn flags(&self, state: &ExplicitState) -> BoundaryFlags {
        if state.location == self.head {
            BoundaryFlags {
                flag: BoundaryFlag::Loop,
                under_abstract: false,
                loop_depth: 1,
            }
        } else {
            BoundaryFlags::default()
        }
    }

    fn boundary_info(
        &self,
        _from: &ExplicitState,
        to: &ExplicitState,
        _flags: &BoundaryFlags,
    ) -> BoundedInfo {
        if to.location == self.head {
            BoundedInfo::Loop {
                id: self.id,
                reason: LoopBoundReason::MaxIterationReached,
                entry: self.entry,
                exits: Vec::new(),
            }
        } else {
            BoundedInfo::None
        }
    }
}

/// Internal loop summaries are the value of `i` after the loop.
struct LoopResult {
    after: CfaNode,
}

impl SummaryApplicator<ExplicitState> for LoopResult {
    fn supports(&self, _state: &ExplicitState) -> bool {
        true
    }

    fn apply_function_summary(
        &self,
        _state: &ExplicitState,
        _summaries: &[SummaryInstance],
        _entry: CfaEdge,
        _exits: &[CfaEdge],
    ) -> Result<Vec<ExplicitState>, CpaError> {
        Ok(Vec::new())
    }

    fn apply_internal_loop_summary(
        &self,
        state: &ExplicitState,
        summaries: &[SummaryInstance],
        _entry: CfaEdge,
    ) -> Result<Vec<ExplicitState>, CpaError> {
        summaries
            .iter()
            .map(|summary| {
                let value = summary.downcast_ref::<i64>().ok_or_else(|| {
                    CpaError::SummaryApplication("expected an i64 summary".to_string())
                })?;
                let mut next = state.clone().with_value("i", *value);
                next.location = self.after;
                Ok(next)
            })
            .collect()
    }

    fn apply_external_loop_summary(
        &self,
        _state: &ExplicitState,
        _summaries: &[SummaryInstance],
        _entry: CfaEdge,
        _exits: &[CfaEdge],
    ) -> Result<Vec<(CfaEdge, ExplicitState)>, CpaError> {
        Ok(Vec::new())
    }
}

#[test]
fn test_every_internal_loop_summary_is_applied() {
    let (cfa, transfer, nodes) = programs::bounded_loop();
    let [head, body, after, _] = nodes[..] else {
        panic!("bounded loop names four locations");
    };
    let id = cfa.loop_structure().loops_with_head(head).next().unwrap().id();
    let entry = cfa
        .entering_edges(head)
        .find(|&edge| cfa.source(edge) != Some(body))
        .unwrap();

    let mut summaries = SummaryProvider::new();
    for value in [3_i64, 4] {
        let mut store = InMemorySummaryStore::new();
        store.insert(id, SummaryInstance::new(value));
        summaries = summaries.with_internal_loop_store(Arc::new(store));
    }
    let reached = explore(
        &cfa,
        transfer,
        Box::new(LoopBoundary { id, head, entry }),
        Box::new(LoopResult { after }),
        summaries,
    );
    assert!(reached.reached_at(head).is_empty());
    assert!(reached.reached_at(body).is_empty());
    assert_eq!(values_of(&reached, after, "i"), vec![Some(3), Some(4)]);
}

#[test]
fn test_summary_store_is_append_only() {
    let mut store = InMemorySummaryStore::new();
    assert!(store.insert("g".to_string(), SummaryInstance::new(1_i64)));
    assert!(!store.insert("g".to_string(), SummaryInstance::new(2_i64)));
    let first = FunctionSummaryStore::query(&store, "g").unwrap();
    assert_eq!(first.downcast_ref::<i64>(), Some(&1));
    assert!(first.downcast_ref::<String>().is_none());
    assert!(FunctionSummaryStore::query(&store, "h").is_none());
    assert_eq!(store.len(), 1);
}
