//! Error types shared by the schema and question-answering pipeline.
//!
//! The host layers (`app`, `cli`, `config`) stay on `anyhow`; everything
//! below them reports an [`AssistError`] so callers can branch on the kind.

use std::fmt::Display;

/// Broad category of an [`AssistError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A dependency is missing: no model, no connection, no driver.
    Unavailable,
    /// Introspection or stream I/O failed.
    TransientIo,
    /// The model answered without a fenced SQL block.
    ParseMiss,
    /// The caller cancelled the request.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssistError {
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    TransientIo(String),

    #[error("{0}")]
    ParseMiss(String),

    #[error("Request cancelled")]
    Cancelled,
}

pub type AssistResult<T> = Result<T, AssistError>;

impl AssistError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssistError::Unavailable(_) => ErrorKind::Unavailable,
            AssistError::TransientIo(_) => ErrorKind::TransientIo,
            AssistError::ParseMiss(_) => ErrorKind::ParseMiss,
            AssistError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Wrap any displayable failure as transient I/O.
    pub fn io(err: impl Display) -> Self {
        AssistError::TransientIo(err.to_string())
    }

    /// Prefix the message with `context`, keeping the kind.
    ///
    /// Cancellation carries no message and is returned untouched.
    pub fn context(self, context: &str) -> Self {
        match self {
            AssistError::Unavailable(msg) => AssistError::Unavailable(format!("{}: {}", context, msg)),
            AssistError::TransientIo(msg) => AssistError::TransientIo(format!("{}: {}", context, msg)),
            AssistError::ParseMiss(msg) => AssistError::ParseMiss(format!("{}: {}", context, msg)),
            AssistError::Cancelled => AssistError::Cancelled,
        }
    }
}
