use thiserror::Error;

/// Broad category of a [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The builder was called with arguments that violate its contract
    Construction,
    /// A removed or deprecated operation was invoked
    UnsupportedOperation,
    /// The tree reached a state a method cannot handle
    StructuralInconsistency,
}

/// Errors raised while building or evaluating a query tree.
///
/// All errors are raised synchronously by the call that violates the
/// contract; none are recoverable runtime conditions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("a join (and/or) is required when adding a constraint to a non-empty list")]
    MissingJoin,

    #[error("directive '{directive}' binds argument '{argument}' to a variable but has no default")]
    MissingDirectiveDefault { directive: String, argument: String },

    #[error("querying a virtual field requires a map of field values or a builder, got {0}")]
    InvalidVirtualFieldValue(String),

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("include path must contain at least one virtual field")]
    EmptyPath,

    #[error("{0} has been removed, use {1} instead")]
    Deprecated(&'static str, &'static str),

    #[error("{operation} is not available on a {kind} node")]
    UnexpectedNodeKind {
        operation: &'static str,
        kind: &'static str,
    },

    #[error("node {0} is not attached to the tree")]
    DetachedNode(usize),

    #[error("constraint index {0} is out of range")]
    ConstraintOutOfRange(usize),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::MissingJoin
            | QueryError::MissingDirectiveDefault { .. }
            | QueryError::InvalidVirtualFieldValue(_)
            | QueryError::UnknownOperator(_)
            | QueryError::InvalidPattern { .. }
            | QueryError::EmptyPath
            | QueryError::ConstraintOutOfRange(_) => ErrorKind::Construction,
            QueryError::Deprecated(..) => ErrorKind::UnsupportedOperation,
            QueryError::UnexpectedNodeKind { .. } | QueryError::DetachedNode(_) => {
                ErrorKind::StructuralInconsistency
            }
        }
    }
}
