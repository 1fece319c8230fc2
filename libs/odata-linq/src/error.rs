//! Error taxonomy shared by the writer, the parser and the query pipeline.

/// Unified error type for translation in both directions.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed literal, unresolvable member path or unsupported projection.
    #[error("format error: {0}")]
    Format(String),

    /// An operation the target grammar cannot express.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A required input was missing or had the wrong shape.
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("invalid $filter: {0}")]
    InvalidFilter(String),

    #[error("invalid $orderby field: {0}")]
    InvalidOrderByField(String),

    #[error("invalid $top value")]
    InvalidLimit,

    /// The REST collaborator failed to produce a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be turned into typed items.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    /// True for every failure raised while reading query text.
    #[must_use]
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Self::Format(_) | Self::InvalidFilter(_) | Self::InvalidOrderByField(_) | Self::InvalidLimit
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
