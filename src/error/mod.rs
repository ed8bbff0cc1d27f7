//! Error types.

use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// The error type returned by the memo, the factory, the explorer and the optimizer.
///
/// Internal errors signal a broken invariant of an optimization session (a corrupted memo,
/// an exhausted arena, a missing provider for the empty set of physical properties).
/// A session that returned such an error can not be continued and must be discarded.
#[derive(Debug)]
pub enum OptimizerError {
    /// A function has been called with an invalid argument.
    Argument(ArgumentError),
    /// One of the internal invariants of an optimization session has been violated.
    Internal(InternalError),
    /// An operator reached a component that does not handle it.
    NotImplemented(String),
    /// The described feature is not supported.
    Unsupported(String),
}

impl OptimizerError {
    /// Creates an [argument error](OptimizerError::Argument).
    pub fn argument<T>(message: T) -> OptimizerError
    where
        T: Into<String>,
    {
        OptimizerError::Argument(ArgumentError::new(message))
    }

    /// Creates an [internal error](OptimizerError::Internal).
    pub fn internal<T>(message: T) -> OptimizerError
    where
        T: Into<String>,
    {
        OptimizerError::Internal(InternalError::new(message, None))
    }

    /// Creates a [not implemented error](OptimizerError::NotImplemented).
    pub fn not_implemented<T>(message: T) -> OptimizerError
    where
        T: Into<String>,
    {
        OptimizerError::NotImplemented(message.into())
    }

    /// Returns `true` if this error is caused by a violated invariant.
    pub fn is_internal(&self) -> bool {
        matches!(self, OptimizerError::Internal(_))
    }

    /// Returns the backtrace captured when this error was created, if any.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            OptimizerError::Argument(err) => Some(&err.backtrace),
            OptimizerError::Internal(err) => Some(&err.backtrace),
            OptimizerError::NotImplemented(_) | OptimizerError::Unsupported(_) => None,
        }
    }
}

impl Display for OptimizerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizerError::Argument(err) => write!(f, "Argument error: {}", err),
            OptimizerError::Internal(err) => write!(f, "Internal error: {}", err),
            OptimizerError::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            OptimizerError::Unsupported(msg) => write!(f, "Not supported: {}", msg),
        }
    }
}

impl Error for OptimizerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OptimizerError::Internal(InternalError { cause: Some(error), .. }) => Some(error),
            _ => None,
        }
    }
}

impl From<ArgumentError> for OptimizerError {
    fn from(err: ArgumentError) -> Self {
        OptimizerError::Argument(err)
    }
}

impl From<InternalError> for OptimizerError {
    fn from(err: InternalError) -> Self {
        OptimizerError::Internal(err)
    }
}

/// Argument error. See [OptimizerError::Argument].
#[derive(Debug)]
pub struct ArgumentError {
    message: String,
    backtrace: Backtrace,
}

impl ArgumentError {
    /// Creates a new instance of an [ArgumentError]. This method captures a backtrace.
    pub fn new<T>(message: T) -> Self
    where
        T: Into<String>,
    {
        ArgumentError {
            message: message.into(),
            backtrace: Backtrace::new(),
        }
    }

    /// The message of this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ArgumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.message)
    }
}

/// Internal error. See [OptimizerError::Internal].
#[derive(Debug)]
pub struct InternalError {
    message: String,
    cause: Option<Box<OptimizerError>>,
    backtrace: Backtrace,
}

impl InternalError {
    /// Creates an instance of an [InternalError] with the given message and an optional cause.
    /// This method captures a backtrace.
    pub fn new<T>(message: T, cause: Option<OptimizerError>) -> Self
    where
        T: Into<String>,
    {
        InternalError {
            message: message.into(),
            cause: cause.map(Box::new),
            backtrace: Backtrace::new(),
        }
    }

    /// Wraps the given error into an internal error with the given message.
    pub fn with_cause<T>(message: T, cause: OptimizerError) -> Self
    where
        T: Into<String>,
    {
        InternalError::new(message, Some(cause))
    }

    /// The message of this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for InternalError {
    fn from(message: &str) -> Self {
        InternalError::new(message, None)
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        InternalError::new(message, None)
    }
}

impl Display for InternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(cause) = self.cause.as_ref() {
            write!(f, " caused by: {}", cause)?
        }
        Ok(())
    }
}
