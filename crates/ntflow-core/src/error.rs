//! Error types for ntflow

use thiserror::Error;

use crate::Shape;

/// Core ntflow errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NtError {
    // Container usage errors
    #[error("PV already open")]
    AlreadyOpen,

    #[error("PV not open")]
    NotOpen,

    #[error("PV closed")]
    Closed,

    // Recoverable write errors
    #[error("rejected by handler '{handler}': {reason}")]
    Rejected { handler: String, reason: String },

    #[error("type mismatch: PV is {expected}, write is {actual}")]
    TypeMismatch { expected: Shape, actual: Shape },

    // Construction errors
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("handler '{0}' already registered")]
    DuplicateHandler(String),

    #[error("unknown handler '{0}'")]
    UnknownHandler(String),

    #[error("PV '{0}' already registered")]
    DuplicatePv(String),

    #[error("unknown PV '{0}'")]
    UnknownPv(String),
}

/// Result type for ntflow operations
pub type NtResult<T> = Result<T, NtError>;
