use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use kestrel_blocks::Block;
use kestrel_cfa::{Cfa, CfaBuilder, CfaEdge, CfaError, CfaNode, EdgeKind, FunctionInfo};
use kestrel_engine::{
    AbstractState, Cpa, CpaError, Merge, MergeOperator, MergeSep, PrecisionAdjustment, Reducer,
    ReducerError, StopSep, TransferRelation,
};
use rustc_hash::FxHashMap;

/// Tracks integer variables with known values at one location, plus the
/// return sites of the active calls.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExplicitState {
    pub location: CfaNode,
    pub values: BTreeMap<String, i64>,
    pub stack: Vec<CfaNode>,
    pub target: bool,
}

impl ExplicitState {
    pub fn new(location: CfaNode) -> Self {
        Self {
            location,
            values: BTreeMap::new(),
            stack: Vec::new(),
            target: false,
        }
    }

    pub fn with_value(mut self, variable: &str, value: i64) -> Self {
        self.values.insert(variable.to_string(), value);
        self
    }

    pub fn value(&self, variable: &str) -> Option<i64> {
        self.values.get(variable).copied()
    }
}

impl fmt::Display for ExplicitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.location)?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {name}={value}")?;
        }
        write!(f, " }}")?;
        if self.target {
            write!(f, " !")?;
        }
        Ok(())
    }
}

impl AbstractState for ExplicitState {
    fn location(&self) -> CfaNode {
        self.location
    }

    fn is_target(&self) -> bool {
        self.target
    }

    /// Every value known in `other` is known, and equal, in `self`.
    fn is_less_or_equal(&self, other: &Self) -> bool {
        self.location == other.location
            && self.stack == other.stack
            && self.target == other.target
            && other
                .values
                .iter()
                .all(|(name, value)| self.values.get(name) == Some(value))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Const(i64),
    Var(String),
    /// `var + constant`
    Add(String, i64),
}

impl Expr {
    fn eval(&self, values: &BTreeMap<String, i64>) -> Option<i64> {
        match self {
            Expr::Const(value) => Some(*value),
            Expr::Var(name) => values.get(name).copied(),
            Expr::Add(name, offset) => values.get(name).map(|value| value + offset),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl Cmp {
    fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Cmp::Lt => lhs < rhs,
            Cmp::Le => lhs <= rhs,
            Cmp::Eq => lhs == rhs,
            Cmp::Ne => lhs != rhs,
            Cmp::Ge => lhs >= rhs,
            Cmp::Gt => lhs > rhs,
        }
    }
}

/// The effect of a statement or assume edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Assign(String, Expr),
    Assume { variable: String, cmp: Cmp, value: i64 },
    /// Forget the variable's value.
    Havoc(String),
}

/// Interprets edge effects over [`ExplicitState`]. An assumption over an
/// unknown variable is feasible; an equality assumption makes it known.
#[derive(Clone, Debug, Default)]
pub struct ExplicitTransfer {
    effects: FxHashMap<CfaEdge, Effect>,
    targets: BTreeSet<CfaNode>,
}

impl ExplicitTransfer {
    pub fn targets(&self) -> &BTreeSet<CfaNode> {
        &self.targets
    }

    pub fn effect(&self, edge: CfaEdge) -> Option<&Effect> {
        self.effects.get(&edge)
    }

    fn apply(&self, edge: CfaEdge, values: &mut BTreeMap<String, i64>) -> bool {
        match self.effects.get(&edge) {
            None => true,
            Some(Effect::Assign(variable, expr)) => {
                match expr.eval(values) {
                    Some(value) => values.insert(variable.clone(), value),
                    None => values.remove(variable),
                };
                true
            }
            Some(Effect::Havoc(variable)) => {
                values.remove(variable);
                true
            }
            Some(Effect::Assume {
                variable,
                cmp,
                value,
            }) => match values.get(variable) {
                Some(&known) => cmp.holds(known, *value),
                None => {
                    if *cmp == Cmp::Eq {
                        values.insert(variable.clone(), *value);
                    }
                    true
                }
            },
        }
    }
}

impl TransferRelation<ExplicitState, ()> for ExplicitTransfer {
    fn successors_for_edge(
        &self,
        cfa: &Cfa,
        state: &ExplicitState,
        _precision: &(),
        edge: CfaEdge,
    ) -> Result<Vec<ExplicitState>, CpaError> {
        let mut next = state.clone();
        next.location = cfa
            .target(edge)
            .ok_or_else(|| CpaError::Transfer(format!("edge {edge} is not part of the CFA")))?;
        match cfa.edge_kind(edge) {
            EdgeKind::FunctionCall => {
                let summary = cfa.summary_edge_of_call(edge).ok_or_else(|| {
                    CpaError::Transfer(format!("call edge {edge} has no return site"))
                })?;
                let site = cfa.target(summary).ok_or_else(|| {
                    CpaError::Transfer(format!("summary edge {summary} is not part of the CFA"))
                })?;
                next.stack.push(site);
            }
            EdgeKind::FunctionReturn => match next.stack.last() {
                Some(&site) if site == next.location => {
                    next.stack.pop();
                }
                Some(_) => return Ok(Vec::new()),
                None => {}
            },
            _ => {
                if !self.apply(edge, &mut next.values) {
                    return Ok(Vec::new());
                }
            }
        }
        next.target = self.targets.contains(&next.location);
        Ok(vec![next])
    }
}

/// Joins two states at the same location and call stack by keeping the
/// values they agree on.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExplicitJoin;

impl MergeOperator<ExplicitState, ()> for ExplicitJoin {
    fn merge(
        &self,
        new: &ExplicitState,
        reached: &ExplicitState,
        _precision: &(),
    ) -> Result<ExplicitState, CpaError> {
        if new.location != reached.location || new.stack != reached.stack || new.target != reached.target {
            return Ok(reached.clone());
        }
        let mut joined = reached.clone();
        joined
            .values
            .retain(|name, value| new.values.get(name) == Some(value));
        Ok(joined)
    }
}

/// Projects explicit states onto the variables a block references.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExplicitReducer;

impl Reducer<ExplicitState, ()> for ExplicitReducer {
    fn reduce(
        &self,
        state: &ExplicitState,
        block: &Block,
        _call_node: CfaNode,
    ) -> Result<ExplicitState, ReducerError> {
        let mut reduced = state.clone();
        reduced.values.retain(|name, _| block.references(name));
        reduced.stack.clear();
        Ok(reduced)
    }

    fn expand(
        &self,
        root: &ExplicitState,
        block: &Block,
        reduced: &ExplicitState,
    ) -> Result<ExplicitState, ReducerError> {
        let mut values: BTreeMap<String, i64> = root
            .values
            .iter()
            .filter(|(name, _)| !block.references(name))
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        values.extend(reduced.values.iter().map(|(name, value)| (name.clone(), *value)));
        let mut stack = root.stack.clone();
        stack.extend(reduced.stack.iter().copied());
        Ok(ExplicitState {
            location: reduced.location,
            values,
            stack,
            target: reduced.target,
        })
    }

    fn reduce_precision(&self, _precision: &(), _block: &Block) -> Result<(), ReducerError> {
        Ok(())
    }

    fn expand_precision(&self, _root: &(), _block: &Block, _reduced: &()) -> Result<(), ReducerError> {
        Ok(())
    }
}

/// Builds a program together with the edge effects [`ExplicitTransfer`]
/// interprets.
#[derive(Default)]
pub struct ExplicitProgramBuilder {
    cfa: CfaBuilder,
    effects: FxHashMap<CfaEdge, Effect>,
    targets: BTreeSet<CfaNode>,
}

impl ExplicitProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(&mut self, name: &str) -> Result<FunctionInfo, CfaError> {
        self.cfa.function(name)
    }

    pub fn node(&mut self, function: &str) -> CfaNode {
        self.cfa.node(function)
    }

    /// A location whose states are targets.
    pub fn error_node(&mut self, function: &str) -> CfaNode {
        let node = self.cfa.node(function);
        self.targets.insert(node);
        node
    }

    pub fn blank(&mut self, from: CfaNode, to: CfaNode) -> CfaEdge {
        self.cfa.blank(from, to)
    }

    pub fn assign(&mut self, from: CfaNode, to: CfaNode, variable: &str, expr: Expr) -> CfaEdge {
        let mut variables = vec![variable];
        let description = match &expr {
            Expr::Const(value) => format!("{variable} = {value}"),
            Expr::Var(name) => {
                variables.push(name);
                format!("{variable} = {name}")
            }
            Expr::Add(name, offset) => {
                variables.push(name);
                format!("{variable} = {name} + {offset}")
            }
        };
        let edge = self.cfa.statement(from, to, &description, &variables);
        self.effects
            .insert(edge, Effect::Assign(variable.to_string(), expr));
        edge
    }

    pub fn havoc(&mut self, from: CfaNode, to: CfaNode, variable: &str) -> CfaEdge {
        let edge = self
            .cfa
            .statement(from, to, &format!("{variable} = *"), &[variable]);
        self.effects.insert(edge, Effect::Havoc(variable.to_string()));
        edge
    }

    pub fn assume(
        &mut self,
        from: CfaNode,
        to: CfaNode,
        variable: &str,
        cmp: Cmp,
        value: i64,
    ) -> CfaEdge {
        let description = format!("{variable} {cmp:?} {value}");
        let edge = self.cfa.assume(from, to, &description, &[variable]);
        self.effects.insert(
            edge,
            Effect::Assume {
                variable: variable.to_string(),
                cmp,
                value,
            },
        );
        edge
    }

    pub fn call(&mut self, call_site: CfaNode, return_site: CfaNode, callee: &str) -> &mut Self {
        self.cfa.call(call_site, return_site, callee, &[]);
        self
    }

    pub fn build(self, main: &str) -> Result<(Cfa, ExplicitTransfer), CfaError> {
        let cfa = self.cfa.build(main)?;
        Ok((
            cfa,
            ExplicitTransfer {
                effects: self.effects,
                targets: self.targets,
            },
        ))
    }
}

/// Explicit-value analysis with stop-sep, the explicit reducer, and either
/// separate or joining merge.
pub fn explicit_cpa(
    transfer: ExplicitTransfer,
    join: bool,
    precision_adjustment: Option<Box<dyn PrecisionAdjustment<ExplicitState, ()>>>,
) -> Cpa<ExplicitState, ()> {
    let merge = if join {
        Merge::join(ExplicitJoin)
    } else {
        Merge::from(MergeSep)
    };
    let cpa = Cpa::<ExplicitState, ()>::builder()
        .transfer(Box::new(transfer))
        .merge(merge)
        .stop(Box::new(StopSep))
        .maybe_precision_adjustment(precision_adjustment)
        .reducer(Box::new(ExplicitReducer))
        .build();
    match cpa {
        Ok(cpa) => cpa,
        Err(err) => panic!("explicit analysis is fully configured: {err}"),
    }
}
