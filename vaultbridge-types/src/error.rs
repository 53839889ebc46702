//! Error values that cross the realm boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// JSON-safe representation of a fault raised inside a realm.
///
/// A fault that is not a structured error degenerates to an empty record,
/// so every field is optional on the wire. JSON cannot carry NaN: where
/// the source realm had nothing numeric for `line`/`column`, the wire
/// carries `null` and this type carries `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializedError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<f64>,
    /// Passed through unconverted when the fault carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
}

impl SerializedError {
    /// The empty record produced from a non-structured fault.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this is the degenerate empty record.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for SerializedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.name.as_deref().unwrap_or("Error"),
            self.message.as_deref().unwrap_or("")
        )
    }
}

/// A structured fault raised by a sandboxed handler.
///
/// This is the realm-local error type; it converts losslessly into
/// [`SerializedError`] for the wire and is reconstructed from one on the
/// receiving side (absent fields fall back to the defaults a bare error
/// object would have).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{name}: {message}")]
pub struct CallFault {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    pub line: Option<f64>,
    pub column: Option<f64>,
    pub code: Option<Value>,
}

impl CallFault {
    /// Creates a fault with a name and message.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
            line: None,
            column: None,
            code: None,
        }
    }

    /// The fault produced when a call names a function the registry does
    /// not know.
    #[must_use]
    pub fn reference_error(path: &str) -> Self {
        Self::new("ReferenceError", format!("{path} is not defined"))
    }

    /// Synthesizes a fault from bare location fields, for faults that
    /// arrive without a structured error object. The stack is formed as
    /// `filename:line:column`.
    #[must_use]
    pub fn from_location(message: impl Into<String>, filename: &str, line: f64, column: f64) -> Self {
        Self::new("Error", message)
            .with_stack(format!("{filename}:{line}:{column}"))
            .at(line, column)
    }

    /// Attaches a stack string.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attaches a source position.
    #[must_use]
    pub fn at(mut self, line: f64, column: f64) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Attaches an application-defined code.
    #[must_use]
    pub fn with_code(mut self, code: Value) -> Self {
        self.code = Some(code);
        self
    }
}

impl From<CallFault> for SerializedError {
    fn from(fault: CallFault) -> Self {
        Self {
            name: Some(fault.name),
            message: Some(fault.message),
            stack: fault.stack,
            line: fault.line,
            column: fault.column,
            code: fault.code,
        }
    }
}

impl From<SerializedError> for CallFault {
    fn from(err: SerializedError) -> Self {
        Self {
            name: err.name.unwrap_or_else(|| "Error".to_string()),
            message: err.message.unwrap_or_default(),
            stack: err.stack,
            line: err.line,
            column: err.column,
            code: err.code,
        }
    }
}

/// Reduced fault for storage operations: name and message only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{name}: {message}")]
pub struct StorageFault {
    pub name: String,
    pub message: String,
}

impl StorageFault {
    /// Creates a storage fault.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}
