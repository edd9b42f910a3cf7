//! Query compilation errors
//!
//! Every failure aborts the whole plan build. Each variant carries the
//! offending filter key so the embedding API can answer with a 4xx response.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Right-hand side does not match `!?OP(args)`
    #[error("invalid expression for '{key}': {expression}")]
    InvalidExpression { key: String, expression: String },

    /// Wrong arity or forbidden argument shape
    #[error("invalid argument for '{key}': {message}")]
    InvalidArgument { key: String, message: String },

    /// Parameter key is not a property, relation, metadata key or taxonomy
    #[error("property {key} does not exist")]
    UnknownField { key: String },

    /// The schema collaborator has no schema for this entity kind
    #[error("unknown entity kind: {kind}")]
    UnknownEntity { kind: String },
}

impl QueryError {
    pub fn invalid_expression(key: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::InvalidExpression {
            key: key.into(),
            expression: expression.into(),
        }
    }

    pub fn invalid_argument(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn unknown_field(key: impl Into<String>) -> Self {
        Self::UnknownField { key: key.into() }
    }

    pub fn unknown_entity(kind: impl Into<String>) -> Self {
        Self::UnknownEntity { kind: kind.into() }
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidExpression { .. } => "INVALID_EXPRESSION",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::UnknownField { .. } => "UNKNOWN_FIELD",
            Self::UnknownEntity { .. } => "UNKNOWN_ENTITY",
        }
    }

    /// Whether the caller is at fault (4xx) rather than the deployment
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::UnknownEntity { .. })
    }

    /// The filter key or entity kind the error is about
    pub fn key(&self) -> &str {
        match self {
            Self::InvalidExpression { key, .. }
            | Self::InvalidArgument { key, .. }
            | Self::UnknownField { key } => key,
            Self::UnknownEntity { kind } => kind,
        }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
