use std::fmt;

use crate::value::ObjectId;

/// Coarse classification of a [`DecodeError`], for callers that only care
/// about which family of failure ended a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedStream,
    UnsupportedFeature,
    Overflow,
    UnknownConstructor,
    ArgumentShape,
    InvalidMemoKey,
}

/// Every way a decode can fail. All of them are terminal for the call.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Structurally invalid input
    #[error("malformed pickle at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
    /// Recognized opcode or protocol this decoder deliberately does not handle
    #[error("unsupported pickle feature at offset {offset}: {what}")]
    Unsupported { offset: usize, what: String },
    /// Integer literal outside the i64 range
    #[error("integer not representable as i64 at offset {offset}: {literal}")]
    Overflow { offset: usize, literal: String },
    #[error("unknown constructor {module}.{name}")]
    UnknownConstructor { module: String, name: String },
    #[error("bad arguments for {module}.{name}: {reason}")]
    ArgumentShape {
        module: String,
        name: String,
        reason: String,
    },
    #[error("invalid memo key {0}")]
    InvalidMemoKey(u64),
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::Malformed { .. } => ErrorKind::MalformedStream,
            DecodeError::Unsupported { .. } => ErrorKind::UnsupportedFeature,
            DecodeError::Overflow { .. } => ErrorKind::Overflow,
            DecodeError::UnknownConstructor { .. } => ErrorKind::UnknownConstructor,
            DecodeError::ArgumentShape { .. } => ErrorKind::ArgumentShape,
            DecodeError::InvalidMemoKey(_) => ErrorKind::InvalidMemoKey,
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.kind() == ErrorKind::MalformedStream
    }

    pub fn is_unsupported(&self) -> bool {
        self.kind() == ErrorKind::UnsupportedFeature
    }

    pub fn is_overflow(&self) -> bool {
        self.kind() == ErrorKind::Overflow
    }

    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        DecodeError::Malformed {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(offset: usize, what: impl Into<String>) -> Self {
        DecodeError::Unsupported {
            offset,
            what: what.into(),
        }
    }
}

/// Returned by constructor strategies when the argument tuple has the wrong
/// arity or element types. The decoder attaches the qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError(pub String);

impl ShapeError {
    pub fn new(reason: impl Into<String>) -> Self {
        ShapeError(reason.into())
    }
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ShapeError {}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("cannot encode: {0}")]
    Unsupported(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("object {0} is not in the heap")]
    DanglingObject(ObjectId),
}

/// Failure while exporting a decoded graph to JSON.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("JSON export: object {0} is not in the heap")]
    DanglingObject(ObjectId),
}
