use kestrel_blocks::{PartitioningOptions, partition};
use kestrel_cegar::*;
use kestrel_cfa::{Cfa, CfaBuilder, CfaNode};
use kestrel_engine::{
    AbstractState, BreakOnTarget, Engine, EngineOptions, PrecisionAdjustment, TransferRelation,
};
use kestrel_test_utils::laws::assert_arg_integrity;
use kestrel_test_utils::*;

/// Replays the locations of a counterexample under explicit values. The
/// path is feasible when every step has a successor.
struct ReplayChecker<'a> {
    cfa: &'a Cfa,
    transfer: ExplicitTransfer,
}

impl<S: AbstractState> CounterexampleChecker<S> for ReplayChecker<'_> {
    fn check_counterexample(
        &mut self,
        counterexample: &Counterexample<S>,
    ) -> Result<bool, CheckerError> {
        let locations = counterexample.locations();
        let Some((&first, rest)) = locations.split_first() else {
            return Ok(false);
        };
        let mut state = ExplicitState::new(first);
        for &next in rest {
            let edge = self
                .cfa
                .leaving_edges(state.location)
                .find(|&edge| self.cfa.target(edge) == Some(next))
                .ok_or_else(|| {
                    CheckerError::Failed(format!("no edge from {} to {next}", state.location))
                })?;
            let successors = self
                .transfer
                .successors_for_edge(self.cfa, &state, &(), edge)
                .map_err(CheckerError::custom)?;
            match successors.into_iter().next() {
                Some(successor) => state = successor,
                None => return Ok(false),
            }
        }
        Ok(true)
    }
}

/// `x = 0` then either the exit or a guarded error behind `x != 0`.
///
/// nodes: `[fork, guarded, error]`
fn guarded_by_zero() -> (Cfa, ExplicitTransfer, Vec<CfaNode>) {
    let mut b = ExplicitProgramBuilder::new();
    let main = b.function("main").unwrap();
    let fork = b.node("main");
    let guarded = b.node("main");
    let error = b.error_node("main");
    b.assign(main.entry, fork, "x", Expr::Const(0));
    b.blank(fork, guarded);
    b.blank(fork, main.exit);
    b.assume(guarded, error, "x", Cmp::Ne, 0);
    let (cfa, transfer) = b.build("main").unwrap();
    (cfa, transfer, vec![fork, guarded, error])
}

fn location_engine<'a>(
    cfa: &'a Cfa,
    targets: impl IntoIterator<Item = CfaNode>,
    precision_adjustment: Option<Box<dyn PrecisionAdjustment<LocationState, ()>>>,
) -> Engine<'a, LocationState, ()> {
    Engine::builder()
        .cfa(cfa)
        .cpa(location_cpa(targets, precision_adjustment))
        .build()
        .unwrap()
}

fn never_feasible(_: &Counterexample<LocationState>) -> Result<bool, CheckerError> {
    Ok(false)
}

#[test]
fn test_feasible_counterexample_is_reported() {
    init_tracing();
    let (cfa, transfer, nodes) = programs::reachable_error();
    let engine = Engine::builder()
        .cfa(&cfa)
        .cpa(explicit_cpa(transfer.clone(), false, Some(Box::new(BreakOnTarget))))
        .build()
        .unwrap();
    let mut controller = RefinementController::builder()
        .engine(engine)
        .checker(ReplayChecker {
            cfa: &cfa,
            transfer,
        })
        .build();
    let mut reached = controller
        .engine()
        .initial_reached_set(ExplicitState::new(cfa.main_entry()), ());

    let result = controller.run(&mut reached).unwrap();
    assert_eq!(result.checked, 1);
    assert_eq!(result.infeasible, 0);
    assert!(result.status.is_sound());
    let RefinementOutcome::BugFound(cex) = &result.outcome else {
        panic!("expected a confirmed bug, got {:?}", result.outcome);
    };
    assert_eq!(cex.locations(), vec![cfa.main_entry(), nodes[0], nodes[1]]);
    assert_eq!(cex.target_state().and_then(|s| s.value("x")), Some(1));
    assert!(controller.confirmed_targets().contains(&cex.target()));

    let verdict = Verdict::from(Ok(result));
    insta::assert_snapshot!(verdict.to_string(), @"bug found: #0@N0 -> #1@N2 -> #2@N3");
}

#[test]
fn test_erased_counterexample_is_not_rediscovered() {
    init_tracing();
    let (cfa, transfer, nodes) = guarded_by_zero();
    let targets: Vec<CfaNode> = transfer.targets().iter().copied().collect();
    let engine = location_engine(&cfa, targets, Some(Box::new(BreakOnTarget)));
    let mut controller = RefinementController::builder()
        .engine(engine)
        .checker(ReplayChecker {
            cfa: &cfa,
            transfer,
        })
        .options(CegarOptions::builder().remove_infeasible_errors(true).build())
        .build();
    let mut reached = controller
        .engine()
        .initial_reached_set(LocationState::new(cfa.main_entry()), ());

    let result = controller.run(&mut reached).unwrap();
    assert!(matches!(result.outcome, RefinementOutcome::Exhausted));
    assert_eq!(result.checked, 1);
    assert_eq!(result.infeasible, 1);
    assert!(result.status.is_sound());

    // the target and its single parent are gone and stay gone
    assert!(reached.reached_at(nodes[2]).is_empty());
    assert!(reached.reached_at(nodes[1]).is_empty());
    assert_eq!(reached.reached_at(cfa.function("main").unwrap().exit).len(), 1);
    assert!(!reached.has_waiting_state());
    assert_arg_integrity(reached.arg());
    assert!(Verdict::from(Ok(result)).is_safe());
}

#[test]
fn test_infeasible_without_removal_is_unsound() {
    let (cfa, transfer, _) = guarded_by_zero();
    let targets: Vec<CfaNode> = transfer.targets().iter().copied().collect();
    let engine = location_engine(&cfa, targets, Some(Box::new(BreakOnTarget)));
    let mut controller = RefinementController::builder()
        .engine(engine)
        .checker(ReplayChecker {
            cfa: &cfa,
            transfer,
        })
        .build();
    let mut reached = controller
        .engine()
        .initial_reached_set(LocationState::new(cfa.main_entry()), ());

    let verdict = controller.verify(&mut reached);
    insta::assert_snapshot!(verdict.to_string(), @"safe, but possibly unsound");
}

#[test]
fn test_infeasible_counterexample_fails_when_not_continuing() {
    let (cfa, transfer, nodes) = guarded_by_zero();
    let targets: Vec<CfaNode> = transfer.targets().iter().copied().collect();
    let engine = location_engine(&cfa, targets, Some(Box::new(BreakOnTarget)));
    let mut controller = RefinementController::builder()
        .engine(engine)
        .checker(ReplayChecker {
            cfa: &cfa,
            transfer,
        })
        .options(
            CegarOptions::builder()
                .continue_after_infeasible_error(false)
                .build(),
        )
        .build();
    let mut reached = controller
        .engine()
        .initial_reached_set(LocationState::new(cfa.main_entry()), ());

    let err = controller.run(&mut reached).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"infeasible counterexample along #0 -> #1 -> #2 -> #4");
    // nothing was cut out
    assert_eq!(reached.reached_at(nodes[2]).len(), 1);
}

#[test]
fn test_checker_failure_is_fatal() {
    let (cfa, transfer, _) = guarded_by_zero();
    let targets: Vec<CfaNode> = transfer.targets().iter().copied().collect();
    let engine = location_engine(&cfa, targets, Some(Box::new(BreakOnTarget)));
    let mut controller = RefinementController::builder()
        .engine(engine)
        .checker(
            |_: &Counterexample<LocationState>| -> Result<bool, CheckerError> {
                Err(CheckerError::Failed("solver timed out".to_string()))
            },
        )
        .build();
    let mut reached = controller
        .engine()
        .initial_reached_set(LocationState::new(cfa.main_entry()), ());

    let err = controller.run(&mut reached).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"feasibility check of #4 failed");
    let source = std::error::Error::source(&err).map(ToString::to_string);
    assert_eq!(
        source.as_deref(),
        Some("counterexample check failed: solver timed out")
    );

    let verdict = controller.verify(&mut reached);
    assert!(matches!(verdict, Verdict::Inconclusive(_)));
}

#[test]
fn test_readmission_through_own_ancestor_is_unsound() {
    init_tracing();
    // entry -> head; head -> body -> head; head -> error
    let mut b = CfaBuilder::new();
    let main = b.function("main").unwrap();
    let head = b.node("main");
    let body = b.node("main");
    let error = b.node("main");
    b.blank(main.entry, head);
    b.assume(head, body, "i < n", &["i", "n"]);
    b.statement(body, head, "i++", &["i"]);
    b.assume(head, error, "i >= n", &["i", "n"]);
    let cfa = b.build("main").unwrap();

    let engine = location_engine(&cfa, [error], None);
    let mut controller = RefinementController::builder()
        .engine(engine)
        .checker(never_feasible)
        .options(CegarOptions::builder().remove_infeasible_errors(true).build())
        .build();
    let mut reached = controller
        .engine()
        .initial_reached_set(LocationState::new(cfa.main_entry()), ());

    let result = controller.run(&mut reached).unwrap();
    assert!(matches!(result.outcome, RefinementOutcome::Exhausted));
    assert_eq!(result.infeasible, 1);
    assert!(!result.status.is_sound());

    // the loop head, its successors and the covered loop state are gone
    assert_eq!(reached.len(), 1);
    assert_eq!(reached.arg().len(), 1);
    assert!(reached.reached_at(error).is_empty());
    assert_arg_integrity(reached.arg());
    insta::assert_snapshot!(Verdict::from(Ok(result)).to_string(), @"safe, but possibly unsound");
}

#[test]
fn test_confirmed_target_is_not_rechecked() {
    let mut b = ExplicitProgramBuilder::new();
    let main = b.function("main").unwrap();
    let left = b.node("main");
    let right = b.node("main");
    let spurious = b.error_node("main");
    let real = b.error_node("main");
    b.assign(main.entry, left, "x", Expr::Const(0));
    b.assign(main.entry, right, "y", Expr::Const(1));
    b.assume(left, spurious, "x", Cmp::Ne, 0);
    b.assume(right, real, "y", Cmp::Eq, 1);
    let (cfa, transfer) = b.build("main").unwrap();

    let targets: Vec<CfaNode> = transfer.targets().iter().copied().collect();
    let engine = location_engine(&cfa, targets, None);
    let mut controller = RefinementController::builder()
        .engine(engine)
        .checker(ReplayChecker {
            cfa: &cfa,
            transfer,
        })
        .options(
            CegarOptions::builder()
                .check_all_targets(true)
                .remove_infeasible_errors(true)
                .build(),
        )
        .build();
    let mut reached = controller
        .engine()
        .initial_reached_set(LocationState::new(cfa.main_entry()), ());

    let result = controller.run(&mut reached).unwrap();
    assert_eq!(result.checked, 2);
    assert_eq!(result.infeasible, 1);
    assert!(result.status.is_sound());
    let RefinementOutcome::BugFound(cex) = result.outcome else {
        panic!("expected a confirmed bug");
    };
    assert_eq!(cex.target_state().map(AbstractState::location), Some(real));
    assert!(reached.reached_at(spurious).is_empty());

    // exploring the confirmed path again does not ask the checker twice
    let parent = reached.arg().parents(cex.target()).next().unwrap();
    reached.re_add_to_waitlist(parent);
    let again = controller.run(&mut reached).unwrap();
    assert_eq!(again.checked, 0);
    assert!(matches!(again.outcome, RefinementOutcome::Exhausted));
    assert_eq!(controller.confirmed_targets().len(), 1);
}

#[test]
fn test_removing_target_with_waiting_parent_is_unsound() {
    init_tracing();
    let (cfa, transfer, nodes) = programs::erroneous_callee();
    let callee_error = nodes[2];
    let partitioning = partition(&cfa, &PartitioningOptions::default()).unwrap();
    let engine = Engine::builder()
        .cfa(&cfa)
        .cpa(explicit_cpa(transfer, false, Some(Box::new(BreakOnTarget))))
        .partitioning(&partitioning)
        .options(EngineOptions::builder().block_modular(true).build())
        .build()
        .unwrap();
    // rejects the error inside the callee, accepts everything else
    let checker = move |cex: &Counterexample<ExplicitState>| -> Result<bool, CheckerError> {
        Ok(cex.target_state().map(|s| s.location) != Some(callee_error))
    };
    let mut controller = RefinementController::builder()
        .engine(engine)
        .checker(checker)
        .options(CegarOptions::builder().remove_infeasible_errors(true).build())
        .build();
    let mut reached = controller
        .engine()
        .initial_reached_set(ExplicitState::new(cfa.main_entry()), ());

    let result = controller.run(&mut reached).unwrap();
    assert_eq!(result.checked, 1);
    assert_eq!(result.infeasible, 1);
    assert!(matches!(result.outcome, RefinementOutcome::Exhausted));
    // the call site went with the target before its other exits were
    // expanded, so the error in main was never reached
    assert!(!result.status.is_sound());
    assert!(reached.reached_at(nodes[0]).is_empty());
    assert!(reached.reached_at(nodes[4]).is_empty());
    assert_arg_integrity(reached.arg());
    insta::assert_snapshot!(Verdict::from(Ok(result)).to_string(), @"safe, but possibly unsound");
}
