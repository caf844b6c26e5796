//! Status codes returned across the service boundary

use thiserror::Error;

use crate::window_node::WindowId;

/// Errors returned by window graph operations.
///
/// A failed operation leaves every piece of state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WmError {
    /// Unknown window, parent or display, or a malformed rect
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Duplicate window id, client handle or registration
    #[error("repeated operation: {0}")]
    RepeatOperation(String),

    /// Blocked by a window flag or capability
    #[error("operation not permitted: {0}")]
    NotPermitted(String),

    /// The owning client is already gone and its windows were reaped
    #[error("client owning window {0:?} has died")]
    DeadClient(WindowId),
}

impl WmError {
    /// Short, stable name of the error kind (used in request responses)
    pub fn kind(&self) -> &'static str {
        match self {
            WmError::InvalidParam(_) => "invalid_param",
            WmError::RepeatOperation(_) => "repeat_operation",
            WmError::NotPermitted(_) => "not_permitted",
            WmError::DeadClient(_) => "dead_client",
        }
    }
}

pub type WmResult<T> = Result<T, WmError>;
