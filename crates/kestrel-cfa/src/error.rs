use crate::CfaNode;

#[derive(Debug, thiserror::Error)]
pub enum CfaError {
    #[error("main function '{0}' is not defined")]
    MissingMainFunction(String),
    #[error("function '{0}' is defined twice")]
    DuplicateFunction(String),
    #[error("node {node} belongs to undefined function '{function}'")]
    UnknownNodeFunction { node: CfaNode, function: String },
    #[error("call at {call_site} targets undefined function '{callee}'")]
    UnknownCallee { call_site: CfaNode, callee: String },
}
