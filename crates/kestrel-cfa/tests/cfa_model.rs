use std::collections::BTreeSet;

use kestrel_cfa::*;

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// main: N0 -> N2 ; while (x < 10) { x++ } ; -> N1
fn while_loop() -> (Cfa, [CfaNode; 4]) {
    let mut b = CfaBuilder::new();
    let main = b.function("main").unwrap();
    let head = b.node("main");
    let body = b.node("main");
    b.blank(main.entry, head);
    b.assume(head, body, "x < 10", &["x"]);
    b.statement(body, head, "x++", &["x"]);
    b.assume(head, main.exit, "!(x < 10)", &["x"]);
    (b.build("main").unwrap(), [main.entry, main.exit, head, body])
}

/// main calls f once; f assigns y.
fn caller_callee() -> (Cfa, [CfaNode; 6]) {
    let mut b = CfaBuilder::new();
    let main = b.function("main").unwrap();
    let f = b.function("f").unwrap();
    let call = b.node("main");
    let ret = b.node("main");
    b.blank(main.entry, call);
    b.call(call, ret, "f", &["a"]);
    b.blank(ret, main.exit);
    b.statement(f.entry, f.exit, "y = 1", &["y"]);
    let cfa = b.build("main").unwrap();
    (cfa, [main.entry, main.exit, f.entry, f.exit, call, ret])
}

fn render_edges(cfa: &Cfa, node: CfaNode) -> String {
    cfa.leaving_edges(node)
        .map(|e| {
            let (source, target) = cfa.endpoints(e).unwrap();
            format!(
                "{e}: {} -{:?}-> {} [{}]",
                source,
                cfa.edge_kind(e),
                target,
                cfa.edge(e).description()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[test]
fn test_builder_wires_calls() {
    let (cfa, [_, _, f_entry, f_exit, call, ret]) = caller_callee();
    insta::assert_snapshot!(render_edges(&cfa, call), @r"
    E3: N4 -FunctionCall-> N2 [f()]
    E5: N4 -CallToReturn-> N5 [f()]
    ");
    assert_eq!(cfa.successors(f_exit).collect::<Vec<_>>(), vec![ret]);
    assert!(cfa.is_function_entry(f_entry));
    assert_eq!(cfa.function_name(f_exit), "f");
    let summary = cfa.entering_summary_edge(ret).unwrap();
    assert_eq!(cfa.source(summary), Some(call));
    let call_edge = cfa.leaving_edges(call).next().unwrap();
    assert_eq!(cfa.summary_edge_of_call(call_edge), Some(summary));
    assert_eq!(
        cfa.edge(call_edge).variables(),
        &[ReferencedVariable::new("a")]
    );
}

#[test]
fn test_edge_of_another_cfa_has_no_endpoints() {
    let (small, _) = while_loop();
    let (large, [.., call, ret]) = caller_callee();
    let summary = large.entering_summary_edge(ret).unwrap();
    assert_eq!(large.endpoints(summary), Some((call, ret)));
    assert_eq!(small.endpoints(summary), None);
    assert_eq!(small.source(summary), None);
    assert_eq!(small.target(summary), None);
    assert_eq!(small.summary_edge_of_call(summary), None);
}

#[test]
fn test_builder_errors() {
    let mut b = CfaBuilder::new();
    b.function("f").unwrap();
    assert!(matches!(b.function("f"), Err(CfaError::DuplicateFunction(name)) if name == "f"));
    assert!(matches!(
        b.build("main"),
        Err(CfaError::MissingMainFunction(name)) if name == "main"
    ));

    let mut b = CfaBuilder::new();
    let main = b.function("main").unwrap();
    b.call(main.entry, main.exit, "g", &[]);
    assert!(matches!(
        b.build("main"),
        Err(CfaError::UnknownCallee { callee, .. }) if callee == "g"
    ));

    let mut b = CfaBuilder::new();
    b.function("main").unwrap();
    b.node("ghost");
    assert!(matches!(
        b.build("main"),
        Err(CfaError::UnknownNodeFunction { function, .. }) if function == "ghost"
    ));
}

#[test]
fn test_main_entry_and_exit() {
    let (cfa, [entry, exit, f_entry, ..]) = caller_callee();
    assert_eq!(cfa.main_entry(), entry);
    assert!(cfa.is_main_entry(entry));
    assert!(cfa.is_main_exit(exit));
    assert!(!cfa.is_main_entry(f_entry));
    assert_eq!(cfa.functions().map(|(n, _)| n).collect::<Vec<_>>(), ["main", "f"]);
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

#[test]
fn test_intraprocedural_traversal_skips_callee() {
    let (cfa, [entry, exit, f_entry, f_exit, call, ret]) = caller_callee();
    let intra = CfaTraversal::dfs()
        .ignore_function_calls()
        .collect_nodes_reachable_from(&cfa, entry);
    assert_eq!(intra, BTreeSet::from([entry, call, ret, exit]));

    let full = CfaTraversal::dfs().collect_nodes_reachable_from(&cfa, entry);
    assert_eq!(full, BTreeSet::from([entry, call, f_entry, f_exit, ret, exit]));
}

#[test]
fn test_backwards_traversal() {
    let (cfa, [entry, exit, head, body]) = while_loop();
    let back = CfaTraversal::dfs()
        .backwards()
        .collect_nodes_reachable_from(&cfa, exit);
    assert_eq!(back, BTreeSet::from([entry, exit, head, body]));
    let preds: Vec<_> = CfaTraversal::dfs().backwards().successors_of(&cfa, head).collect();
    assert_eq!(preds, vec![entry, body]);
}

// ---------------------------------------------------------------------------
// Loop structure
// ---------------------------------------------------------------------------

#[test]
fn test_natural_loop() {
    let (cfa, [_, _, head, body]) = while_loop();
    let loops = cfa.loop_structure();
    assert_eq!(loops.len(), 1);
    let l = loops.loops().next().unwrap();
    assert_eq!(l.heads(), &BTreeSet::from([head]));
    assert_eq!(l.nodes(), &BTreeSet::from([head, body]));
    assert_eq!(l.incoming_edges().len(), 1);
    assert_eq!(l.outgoing_edges().len(), 1);
    assert!(!l.is_multi_header());
    assert_eq!(loops.all_loop_heads(), BTreeSet::from([head]));
    assert_eq!(loops.loops_with_head(head).count(), 1);
    assert!(loops.get(l.id()).is_some());
}

#[test]
fn test_self_loop_is_a_loop() {
    let mut b = CfaBuilder::new();
    let main = b.function("main").unwrap();
    let spin = b.node("main");
    b.blank(main.entry, spin);
    b.blank(spin, spin);
    let cfa = b.build("main").unwrap();
    let l = cfa.loop_structure().loops().next().unwrap();
    assert_eq!(l.nodes(), &BTreeSet::from([spin]));
    assert!(l.outgoing_edges().is_empty());
}

#[test]
fn test_irreducible_region_is_multi_header() {
    let mut b = CfaBuilder::new();
    let main = b.function("main").unwrap();
    let a = b.node("main");
    let c = b.node("main");
    b.assume(main.entry, a, "p", &["p"]);
    b.assume(main.entry, c, "!p", &["p"]);
    b.blank(a, c);
    b.blank(c, a);
    b.blank(c, main.exit);
    let cfa = b.build("main").unwrap();

    let loops: Vec<_> = cfa.loop_structure().loops().collect();
    assert_eq!(loops.len(), 1);
    assert!(loops[0].is_multi_header());
    assert_eq!(loops[0].heads(), &BTreeSet::from([a, c]));
    assert_eq!(loops[0].incoming_edges().len(), 2);
}

#[test]
fn test_loops_are_per_function() {
    let (cfa, _) = caller_callee();
    assert!(cfa.loop_structure().is_empty());
}
