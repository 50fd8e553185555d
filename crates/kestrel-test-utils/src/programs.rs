//! Small example programs.

use kestrel_cfa::{Cfa, CfaBuilder, CfaNode};

use crate::{Cmp, ExplicitProgramBuilder, ExplicitTransfer, Expr};

/// Program handle plus the locations tests refer to.
#[derive(Debug)]
pub struct Program {
    pub cfa: Cfa,
    pub nodes: Vec<CfaNode>,
}

fn build(builder: CfaBuilder) -> Cfa {
    match builder.build("main") {
        Ok(cfa) => cfa,
        Err(err) => panic!("fixture program is well formed: {err}"),
    }
}

fn function(builder: &mut CfaBuilder, name: &str) -> kestrel_cfa::FunctionInfo {
    match builder.function(name) {
        Ok(info) => info,
        Err(err) => panic!("fixture function {name}: {err}"),
    }
}

/// `main` that goes straight from entry to exit.
pub fn trivial() -> Cfa {
    let mut b = CfaBuilder::new();
    let main = function(&mut b, "main");
    b.blank(main.entry, main.exit);
    build(b)
}

/// `main: x = 0; f(x); z = x` and `f: y = 1`.
pub fn caller_callee() -> Cfa {
    let mut b = CfaBuilder::new();
    let main = function(&mut b, "main");
    let f = function(&mut b, "f");
    let call = b.node("main");
    let ret = b.node("main");
    b.statement(main.entry, call, "x = 0", &["x"]);
    b.call(call, ret, "f", &["x"]);
    b.statement(ret, main.exit, "z = x", &["z", "x"]);
    b.statement(f.entry, f.exit, "y = 1", &["y"]);
    build(b)
}

/// A branch and a loop, plus a function that is never called.
///
/// nodes: `[branch, then, else, join, head, body, dead]`
pub fn branching_loop() -> Program {
    let mut b = CfaBuilder::new();
    let main = function(&mut b, "main");
    let unused = function(&mut b, "unused");
    let branch = b.node("main");
    let then = b.node("main");
    let other = b.node("main");
    let join = b.node("main");
    let head = b.node("main");
    let body = b.node("main");
    let dead = b.node("main");
    b.statement(main.entry, branch, "x = 0", &["x"]);
    b.assume(branch, then, "p", &["p"]);
    b.assume(branch, other, "!p", &["p"]);
    b.statement(then, join, "x = 1", &["x"]);
    b.statement(other, join, "x = 2", &["x"]);
    b.blank(join, head);
    b.assume(head, body, "x < 10", &["x"]);
    b.statement(body, head, "x++", &["x"]);
    b.assume(head, main.exit, "x >= 10", &["x"]);
    // only reachable from itself
    b.blank(dead, main.exit);
    b.statement(unused.entry, unused.exit, "q = 0", &["q"]);
    Program {
        cfa: build(b),
        nodes: vec![branch, then, other, join, head, body, dead],
    }
}

fn explicit_function(builder: &mut ExplicitProgramBuilder, name: &str) -> kestrel_cfa::FunctionInfo {
    match builder.function(name) {
        Ok(info) => info,
        Err(err) => panic!("fixture function {name}: {err}"),
    }
}

fn explicit_build(builder: ExplicitProgramBuilder) -> (Cfa, ExplicitTransfer) {
    match builder.build("main") {
        Ok(built) => built,
        Err(err) => panic!("fixture program is well formed: {err}"),
    }
}

/// `x = 0; if (x != 0) error;`: the error location is unreachable under
/// explicit values but reachable for a location-only analysis.
///
/// nodes: `[check, error]`
pub fn guarded_error() -> (Cfa, ExplicitTransfer, Vec<CfaNode>) {
    let mut b = ExplicitProgramBuilder::new();
    let main = explicit_function(&mut b, "main");
    let check = b.node("main");
    let error = b.error_node("main");
    b.assign(main.entry, check, "x", Expr::Const(0));
    b.assume(check, error, "x", Cmp::Ne, 0);
    b.assume(check, main.exit, "x", Cmp::Eq, 0);
    b.blank(error, main.exit);
    let (cfa, transfer) = explicit_build(b);
    (cfa, transfer, vec![check, error])
}

/// `x = *; if (x == 1) error;`: the error location is really reachable.
///
/// nodes: `[check, error]`
pub fn reachable_error() -> (Cfa, ExplicitTransfer, Vec<CfaNode>) {
    let mut b = ExplicitProgramBuilder::new();
    let main = explicit_function(&mut b, "main");
    let check = b.node("main");
    let error = b.error_node("main");
    b.havoc(main.entry, check, "x");
    b.assume(check, error, "x", Cmp::Eq, 1);
    b.assume(check, main.exit, "x", Cmp::Ne, 1);
    b.blank(error, main.exit);
    let (cfa, transfer) = explicit_build(b);
    (cfa, transfer, vec![check, error])
}

/// `main: a = 1; g(); a = a + 1; g();` then an error if `a != 2`, with
/// `g: t = 5; t = *`. Both calls enter `g` with nothing known about `t`.
///
/// nodes: `[first_call, second_call, after, error, g_body]`
pub fn repeated_call() -> (Cfa, ExplicitTransfer, Vec<CfaNode>) {
    let mut b = ExplicitProgramBuilder::new();
    let main = explicit_function(&mut b, "main");
    let g = explicit_function(&mut b, "g");
    let first_call = b.node("main");
    let between = b.node("main");
    let second_call = b.node("main");
    let after = b.node("main");
    let error = b.error_node("main");
    let g_body = b.node("g");
    b.assign(main.entry, first_call, "a", Expr::Const(1));
    b.call(first_call, between, "g");
    b.assign(between, second_call, "a", Expr::Add("a".to_string(), 1));
    b.call(second_call, after, "g");
    b.assume(after, error, "a", Cmp::Ne, 2);
    b.assume(after, main.exit, "a", Cmp::Eq, 2);
    b.blank(error, main.exit);
    b.assign(g.entry, g_body, "t", Expr::Const(5));
    b.havoc(g_body, g.exit, "t");
    let (cfa, transfer) = explicit_build(b);
    (cfa, transfer, vec![first_call, second_call, after, error, g_body])
}

/// `i = 0; while (i < 3) i = i + 1;` then an error if `i != 3`.
///
/// nodes: `[head, body, after, error]`
pub fn bounded_loop() -> (Cfa, ExplicitTransfer, Vec<CfaNode>) {
    let mut b = ExplicitProgramBuilder::new();
    let main = explicit_function(&mut b, "main");
    let pre = b.node("main");
    let head = b.node("main");
    let body = b.node("main");
    let after = b.node("main");
    let error = b.error_node("main");
    b.assign(main.entry, pre, "i", Expr::Const(0));
    b.blank(pre, head);
    b.assume(head, body, "i", Cmp::Lt, 3);
    b.assign(body, head, "i", Expr::Add("i".to_string(), 1));
    b.assume(head, after, "i", Cmp::Ge, 3);
    b.assume(after, error, "i", Cmp::Ne, 3);
    b.assume(after, main.exit, "i", Cmp::Eq, 3);
    b.blank(error, main.exit);
    let (cfa, transfer) = explicit_build(b);
    (cfa, transfer, vec![head, body, after, error])
}

/// `main: f(); y = *;` then an error if `y == 1`, with
/// `f: z = *; if (z == 5) error;`. Both error locations are reachable.
///
/// nodes: `[call, after, callee_error, check, error]`
pub fn erroneous_callee() -> (Cfa, ExplicitTransfer, Vec<CfaNode>) {
    let mut b = ExplicitProgramBuilder::new();
    let main = explicit_function(&mut b, "main");
    let f = explicit_function(&mut b, "f");
    let call = b.node("main");
    let after = b.node("main");
    let check = b.node("main");
    let error = b.error_node("main");
    let mid = b.node("f");
    let callee_error = b.error_node("f");
    b.blank(main.entry, call);
    b.call(call, after, "f");
    b.havoc(after, check, "y");
    b.assume(check, error, "y", Cmp::Eq, 1);
    b.assume(check, main.exit, "y", Cmp::Ne, 1);
    b.blank(error, main.exit);
    b.havoc(f.entry, mid, "z");
    b.assume(mid, callee_error, "z", Cmp::Eq, 5);
    b.assume(mid, f.exit, "z", Cmp::Ne, 5);
    b.blank(callee_error, f.exit);
    let (cfa, transfer) = explicit_build(b);
    (cfa, transfer, vec![call, after, callee_error, check, error])
}
