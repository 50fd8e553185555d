use indexmap::IndexMap;
use petgraph::graph::DiGraph;
use smallvec::SmallVec;

use crate::{
    Cfa, CfaEdge, CfaError, CfaNode, EdgeInfo, EdgeKind, FunctionInfo, LoopStructure, NodeInfo,
    NodeKind, ReferencedVariable,
};

struct PendingCall {
    call_site: CfaNode,
    return_site: CfaNode,
    callee: String,
    arguments: SmallVec<[ReferencedVariable; 2]>,
}

/// Incremental construction of a [`Cfa`].
///
/// Calls are recorded and wired when [`CfaBuilder::build`] runs, so a caller
/// may be described before its callee.
#[derive(Default)]
pub struct CfaBuilder {
    graph: DiGraph<NodeInfo, EdgeInfo>,
    functions: IndexMap<String, FunctionInfo>,
    calls: Vec<PendingCall>,
}

impl CfaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a function, creating its entry and exit locations.
    pub fn function(&mut self, name: impl Into<String>) -> Result<FunctionInfo, CfaError> {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(CfaError::DuplicateFunction(name));
        }
        let entry = self.add_node(&name, NodeKind::FunctionEntry);
        let exit = self.add_node(&name, NodeKind::FunctionExit);
        let info = FunctionInfo { entry, exit };
        self.functions.insert(name, info);
        Ok(info)
    }

    /// Add a plain location inside `function`.
    pub fn node(&mut self, function: &str) -> CfaNode {
        self.add_node(function, NodeKind::Plain)
    }

    fn add_node(&mut self, function: &str, kind: NodeKind) -> CfaNode {
        CfaNode(self.graph.add_node(NodeInfo {
            function: function.to_string(),
            kind,
        }))
    }

    pub fn edge<V>(
        &mut self,
        from: CfaNode,
        to: CfaNode,
        kind: EdgeKind,
        description: &str,
        variables: impl IntoIterator<Item = V>,
    ) -> CfaEdge
    where
        V: Into<ReferencedVariable>,
    {
        let info = EdgeInfo {
            kind,
            description: description.to_string(),
            variables: variables.into_iter().map(Into::into).collect(),
        };
        CfaEdge(self.graph.add_edge(from.0, to.0, info))
    }

    pub fn blank(&mut self, from: CfaNode, to: CfaNode) -> CfaEdge {
        self.edge(from, to, EdgeKind::Blank, "", std::iter::empty::<ReferencedVariable>())
    }

    pub fn statement(
        &mut self,
        from: CfaNode,
        to: CfaNode,
        description: &str,
        variables: &[&str],
    ) -> CfaEdge {
        self.edge(from, to, EdgeKind::Statement, description, variables.iter().copied())
    }

    pub fn assume(
        &mut self,
        from: CfaNode,
        to: CfaNode,
        description: &str,
        variables: &[&str],
    ) -> CfaEdge {
        self.edge(from, to, EdgeKind::Assume, description, variables.iter().copied())
    }

    /// Record a call of `callee` at `call_site` that resumes at `return_site`.
    pub fn call(
        &mut self,
        call_site: CfaNode,
        return_site: CfaNode,
        callee: &str,
        arguments: &[&str],
    ) -> &mut Self {
        self.calls.push(PendingCall {
            call_site,
            return_site,
            callee: callee.to_string(),
            arguments: arguments.iter().copied().map(ReferencedVariable::new).collect(),
        });
        self
    }

    pub fn build(mut self, main: &str) -> Result<Cfa, CfaError> {
        if !self.functions.contains_key(main) {
            return Err(CfaError::MissingMainFunction(main.to_string()));
        }
        for node in self.graph.node_indices() {
            let function = &self.graph[node].function;
            if !self.functions.contains_key(function) {
                return Err(CfaError::UnknownNodeFunction {
                    node: CfaNode(node),
                    function: function.clone(),
                });
            }
        }

        for call in std::mem::take(&mut self.calls) {
            let Some(&callee) = self.functions.get(&call.callee) else {
                return Err(CfaError::UnknownCallee {
                    call_site: call.call_site,
                    callee: call.callee,
                });
            };
            let description = format!("{}()", call.callee);
            self.edge(
                call.call_site,
                callee.entry,
                EdgeKind::FunctionCall,
                &description,
                call.arguments,
            );
            self.edge(
                callee.exit,
                call.return_site,
                EdgeKind::FunctionReturn,
                &format!("return from {}", call.callee),
                std::iter::empty::<ReferencedVariable>(),
            );
            self.edge(
                call.call_site,
                call.return_site,
                EdgeKind::CallToReturn,
                &description,
                std::iter::empty::<ReferencedVariable>(),
            );
        }

        let mut cfa = Cfa {
            graph: self.graph,
            functions: self.functions,
            main: main.to_string(),
            loops: LoopStructure::default(),
        };
        cfa.loops = LoopStructure::compute(&cfa);
        Ok(cfa)
    }
}
