//! Error types for the interaction engine.

use thiserror::Error;

use fanuc_adapters::AdapterError;
use fanuc_persistence::PersistenceError;

use crate::render::RenderError;

/// Errors surfaced by wizard, live and dispatch operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// User input was rejected; the wizard stays on the same step.
    #[error("{0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// A collaborator failed (storage, Kafka, control API).
    #[error("{op} failed: {reason}")]
    Unavailable { op: String, reason: String },

    /// The stored session cannot be interpreted.
    #[error("corrupt session: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl CoreError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    pub fn unavailable(op: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            op: op.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Names the operation on an `Unavailable` error.
    pub fn during(self, op: impl Into<String>) -> Self {
        match self {
            Self::Unavailable { reason, .. } => Self::Unavailable {
                op: op.into(),
                reason,
            },
            other => other,
        }
    }
}

impl From<PersistenceError> for CoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::unavailable("storage", other),
        }
    }
}

impl From<AdapterError> for CoreError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::NotFound(what) => Self::NotFound {
                kind: "remote resource".to_string(),
                id: what,
            },
            AdapterError::Unavailable(reason) | AdapterError::InvalidResponse(reason) => {
                Self::Unavailable {
                    op: "remote call".to_string(),
                    reason,
                }
            }
        }
    }
}

/// Attaches an operation name to errors converted into [`CoreError`].
pub trait ResultExt<T> {
    fn during(self, op: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<CoreError>> ResultExt<T> for std::result::Result<T, E> {
    fn during(self, op: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().during(op))
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, CoreError>;
