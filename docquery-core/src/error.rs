//! Error types and result types for query construction and dispatch.
//!
//! Build-phase calls fail synchronously with [`QueryError::Usage`],
//! [`QueryError::InvalidArgument`] or [`QueryError::Compatibility`]. The remaining
//! variants only surface from [`Query::exec`](crate::query::Query::exec) and friends.
//! Use [`QueryResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::specification::OperationKind;

/// Represents all possible errors raised while building or executing a query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// A path or geo dependent call was made without the state it depends on.
    #[error("{0}")]
    Usage(String),
    /// A call received a value whose shape matches none of its accepted forms.
    #[error("{0}")]
    InvalidArgument(String),
    /// The bound operation kind does not support an accumulated option.
    #[error("{option} cannot be used with {op}")]
    Compatibility {
        /// Name of the offending option, e.g. `limit` or `field selection and slice`.
        option: String,
        /// The operation kind that rejected it.
        op: OperationKind,
    },
    /// `exec` was called before any operation kind was declared.
    #[error("Missing query type: (find, etc)")]
    MissingOperation,
    /// `exec` was called on a query that has no collection bound.
    #[error("No collection has been bound to this query")]
    MissingCollection,
    /// The external collection reported a failure.
    #[error("Collection error: {0}")]
    Collection(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl QueryError {
    /// Usage error for an operator that needs a path it could not resolve.
    pub fn missing_path(method: &str) -> Self {
        QueryError::Usage(format!(
            "{method}() must be used after where() when called with these arguments"
        ))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        QueryError::InvalidArgument(message.into())
    }
}

/// A specialized `Result` type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

impl From<BsonError> for QueryError {
    fn from(err: BsonError) -> Self {
        QueryError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for QueryError {
    fn from(err: SerdeJsonError) -> Self {
        QueryError::Serialization(err.to_string())
    }
}
