//! Error types for the capture engine

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Discriminant of every failure the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SurfaceUnavailable,
    ElementNotFound,
    ActionFailed,
    PlanningFailure,
    BudgetExceeded,
    ExecutionAborted,
}

impl ErrorKind {
    /// Fatal kinds end the run in the `Failed` phase.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::SurfaceUnavailable | ErrorKind::PlanningFailure | ErrorKind::ExecutionAborted
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SurfaceUnavailable => "SurfaceUnavailable",
            ErrorKind::ElementNotFound => "ElementNotFound",
            ErrorKind::ActionFailed => "ActionFailed",
            ErrorKind::PlanningFailure => "PlanningFailure",
            ErrorKind::BudgetExceeded => "BudgetExceeded",
            ErrorKind::ExecutionAborted => "ExecutionAborted",
        };
        f.write_str(name)
    }
}

/// Errors raised by a live surface implementation.
#[derive(Debug, Error, Clone)]
pub enum SurfaceError {
    /// The surface can no longer be reached (browser gone, tab closed).
    #[error("surface unavailable: {0}")]
    Unavailable(String),

    /// The targeted element was detached between resolution and interaction.
    #[error("element detached: {0}")]
    Detached(String),

    /// A navigation interrupted the interaction.
    #[error("navigation interrupted: {0}")]
    Interrupted(String),

    /// The interaction was rejected by the page (disabled control, bad option).
    #[error("interaction rejected: {0}")]
    Rejected(String),

    /// A screenshot was taken but could not be stored.
    #[error("screenshot storage failed: {0}")]
    Storage(String),
}

impl SurfaceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SurfaceError::Detached(_) | SurfaceError::Interrupted(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, SurfaceError::Unavailable(_))
    }
}

/// Structural errors that escape the action executor.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("planning failed: {0}")]
    Planning(String),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error("execution aborted: {0}")]
    Aborted(String),

    #[error("documentation output failed: {0}")]
    Output(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Planning(_) => ErrorKind::PlanningFailure,
            WorkflowError::Surface(_) => ErrorKind::SurfaceUnavailable,
            WorkflowError::Aborted(_) => ErrorKind::ExecutionAborted,
            WorkflowError::Output(_) | WorkflowError::Io(_) | WorkflowError::Json(_) => {
                ErrorKind::ExecutionAborted
            }
        }
    }
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors() {
        assert!(SurfaceError::Detached("x".into()).is_transient());
        assert!(SurfaceError::Interrupted("x".into()).is_transient());
        assert!(!SurfaceError::Rejected("x".into()).is_transient());
        assert!(!SurfaceError::Unavailable("x".into()).is_transient());
    }

    #[test]
    fn fatal_kinds() {
        assert!(ErrorKind::PlanningFailure.is_fatal());
        assert!(ErrorKind::ExecutionAborted.is_fatal());
        assert!(!ErrorKind::BudgetExceeded.is_fatal());
        assert!(!ErrorKind::ElementNotFound.is_fatal());
    }

    #[test]
    fn surface_errors_map_to_surface_unavailable() {
        let err: WorkflowError = SurfaceError::Unavailable("tab closed".into()).into();
        assert_eq!(err.kind(), ErrorKind::SurfaceUnavailable);
        assert_eq!(err.to_string(), "surface unavailable: tab closed");
    }
}
