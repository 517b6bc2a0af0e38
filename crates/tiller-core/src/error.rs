//! Error taxonomy
//!
//! Three layers of failure exist and are kept distinct:
//! - [`TargetFault`]: the target object itself raised, classified so callers
//!   can tell "business logic rejected this call" from "the management layer
//!   is broken".
//! - [`DispatchError`]: a registry lookup or type check failed, or a target
//!   fault was re-raised with its classification preserved.
//! - [`CompileError`]: a target could not be turned into a registry at all.
//!
//! Absence of metadata during resolution is never an error; an unmanaged
//! operation is simply excluded from the registry.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::types::ActionSignature;

/// Classification of a failure raised by the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultKind {
    /// The target's own logic rejected the call at runtime.
    Runtime,
    /// A declared, recoverable failure the target signals.
    Checked,
    /// Unexpected breakage; the call should not be retried.
    Fatal,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Runtime => write!(f, "runtime"),
            FaultKind::Checked => write!(f, "checked"),
            FaultKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// Failure returned by a target invoker closure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} fault from target: {message}")]
pub struct TargetFault {
    pub kind: FaultKind,
    pub message: String,
}

impl TargetFault {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Runtime,
            message: message.into(),
        }
    }

    pub fn checked(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Checked,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Fatal,
            message: message.into(),
        }
    }
}

/// Errors raised by registry dispatch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    /// No attribute with this name supports the requested access. A
    /// write-only attribute is not found for reads and vice versa.
    #[error("No attribute named '{0}'")]
    AttributeNotFound(String),

    /// No operation matches the requested action signature.
    #[error("No operation matching {0}")]
    OperationNotFound(ActionSignature),

    /// The supplied value's runtime type is not assignable to the
    /// attribute's declared type.
    #[error("Invalid value for attribute '{name}': expected {expected}, got {actual}")]
    InvalidValue {
        name: String,
        expected: String,
        actual: String,
    },

    /// The target raised during invocation; the fault classification is
    /// preserved through the wrapping.
    #[error("Invocation failed ({kind}): {message}")]
    Invocation { kind: FaultKind, message: String },
}

impl From<TargetFault> for DispatchError {
    fn from(fault: TargetFault) -> Self {
        DispatchError::Invocation {
            kind: fault.kind,
            message: fault.message,
        }
    }
}

/// Registry dispatch result.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised while compiling a target into a registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    /// The target handle names a type that was never registered.
    #[error("Unknown managed type '{0}'")]
    UnknownType(String),
}
