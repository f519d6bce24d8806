// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for hkexec
//!
//! One error enum covers every failure the execution core can surface:
//! lifecycle faults, cancellation, binding misuse, malformed plans and
//! value-level problems.

use thiserror::Error;

/// Result type alias for hkexec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for plan construction and execution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Cursor lifecycle faults
    // =========================================================================
    /// A cursor was used outside of its valid lifecycle state
    #[error("{operator}: cannot {action} a cursor in state {state}")]
    CursorLifecycle {
        operator: String,
        action: &'static str,
        state: String,
    },

    /// The cursor does not support random repositioning
    #[error("{0} does not support jump")]
    JumpNotSupported(String),

    // =========================================================================
    // Cancellation
    // =========================================================================
    /// Query cancelled
    #[error("query cancelled")]
    QueryCancelled,

    /// Query exceeded its time budget
    #[error("query timed out after {elapsed_ms}ms (limit {limit_ms}ms)")]
    QueryTimeout { elapsed_ms: u64, limit_ms: u64 },

    // =========================================================================
    // Binding errors
    // =========================================================================
    /// A binding slot was read before anything was bound to it
    #[error("no binding at position {0}")]
    BindingNotSet(usize),

    /// A binding slot holds a different kind of binding than requested
    #[error("binding at position {position} is a {found}, expected a {expected}")]
    BindingTypeMismatch {
        position: usize,
        expected: &'static str,
        found: &'static str,
    },

    // =========================================================================
    // Plan construction errors
    // =========================================================================
    /// Structurally invalid operator tree (detected before any row is read)
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// Schema definition error
    #[error("schema error: {0}")]
    Schema(String),

    /// Row does not fit the row type it is declared with
    #[error("row has {got} fields, row type {row_type} expects {expected}")]
    RowArity {
        row_type: String,
        expected: usize,
        got: usize,
    },

    // =========================================================================
    // Value errors
    // =========================================================================
    /// Cannot compare NULL with non-NULL value
    #[error("cannot compare NULL with non-NULL value")]
    NullComparison,

    /// Cannot compare incompatible types
    #[error("cannot compare incompatible types")]
    IncomparableTypes,

    /// Type error
    #[error("type error: {0}")]
    Type(String),

    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Integer overflow in an arithmetic or aggregate computation
    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    /// Invalid argument for function
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Field index out of bounds
    #[error("field index {index} out of bounds (len={len})")]
    FieldOutOfBounds { index: usize, len: usize },

    // =========================================================================
    // Other errors
    // =========================================================================
    /// Storage collaborator failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal error for unexpected conditions
    #[error("{message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new CursorLifecycle fault
    pub fn lifecycle(
        operator: impl Into<String>,
        action: &'static str,
        state: impl std::fmt::Display,
    ) -> Self {
        Error::CursorLifecycle {
            operator: operator.into(),
            action,
            state: state.to_string(),
        }
    }

    /// Create a new InvalidPlan error
    pub fn invalid_plan(message: impl Into<String>) -> Self {
        Error::InvalidPlan(message.into())
    }

    /// Create a new Schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(message.into())
    }

    /// Create a new Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage(message.into())
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Create a new InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Check if this is a cursor misuse fault (a bug in plan assembly)
    pub fn is_lifecycle_fault(&self) -> bool {
        matches!(
            self,
            Error::CursorLifecycle { .. } | Error::JumpNotSupported(_)
        )
    }

    /// Check if this error aborts the whole execution because of
    /// cancellation or timeout
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::QueryCancelled | Error::QueryTimeout { .. })
    }

    /// Check if this error was raised while constructing a plan
    pub fn is_plan_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidPlan(_) | Error::Schema(_) | Error::RowArity { .. }
        )
    }

    /// Check if this is a binding misuse error
    pub fn is_binding_error(&self) -> bool {
        matches!(
            self,
            Error::BindingNotSet(_) | Error::BindingTypeMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::QueryCancelled.to_string(), "query cancelled");
        assert_eq!(
            Error::BindingNotSet(3).to_string(),
            "no binding at position 3"
        );
        assert_eq!(
            Error::invalid_plan("FULL join not supported").to_string(),
            "invalid plan: FULL join not supported"
        );
        assert_eq!(
            Error::NullComparison.to_string(),
            "cannot compare NULL with non-NULL value"
        );
    }

    #[test]
    fn test_structured_error_display() {
        let err = Error::lifecycle("Limit", "next", "Idle");
        assert_eq!(err.to_string(), "Limit: cannot next a cursor in state Idle");

        let err = Error::QueryTimeout {
            elapsed_ms: 120,
            limit_ms: 100,
        };
        assert_eq!(err.to_string(), "query timed out after 120ms (limit 100ms)");

        let err = Error::BindingTypeMismatch {
            position: 0,
            expected: "row",
            found: "value",
        };
        assert_eq!(
            err.to_string(),
            "binding at position 0 is a value, expected a row"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::lifecycle("x", "open", "Active").is_lifecycle_fault());
        assert!(Error::JumpNotSupported("Sort".into()).is_lifecycle_fault());
        assert!(!Error::QueryCancelled.is_lifecycle_fault());

        assert!(Error::QueryCancelled.is_cancellation());
        assert!(Error::QueryTimeout {
            elapsed_ms: 1,
            limit_ms: 1
        }
        .is_cancellation());

        assert!(Error::invalid_plan("x").is_plan_error());
        assert!(Error::schema("x").is_plan_error());
        assert!(!Error::DivisionByZero.is_plan_error());

        assert!(Error::BindingNotSet(1).is_binding_error());
        assert!(!Error::internal("x").is_binding_error());
    }
}
