use crate::core::ids::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("node {0} is not part of the heap")]
    Dangling(NodeId),

    #[error("node {0} was reserved but never filled")]
    Vacant(NodeId),

    #[error("no shallow cost known for type `{type_name}`")]
    Unpriced { type_name: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnumeratorError {
    #[error("expected a {expected} payload, found `{type_name}`")]
    ShapeMismatch {
        expected: &'static str,
        type_name: String,
    },

    #[error("{0}")]
    Custom(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimateError {
    #[error("size oracle failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("child enumeration failed on node {node}: {source}")]
    Enumerator {
        node: NodeId,
        #[source]
        source: EnumeratorError,
    },
}
