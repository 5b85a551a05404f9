//! Placement and resolution errors.

use std::time::Duration;

use thiserror::Error;

use crate::anchor::RegistryError;
use crate::positioning::PositioningState;

/// Outcome of a failed placement or resolution request.
///
/// Transient primitive failures are retried internally and only surface as
/// [`PlacementError::Timeout`] once attempts are exhausted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    /// Positioning is not `Ready`; nothing was registered.
    #[error("positioning accuracy insufficient (state: {state})")]
    InsufficientAccuracy { state: PositioningState },

    /// The platform rejected anchor creation.
    #[error("anchor creation failed: {0}")]
    CreationFailed(String),

    /// The platform rejected anchor resolution.
    #[error("anchor resolution failed: {0}")]
    ResolutionFailed(String),

    /// Every attempt failed transiently.
    #[error("gave up after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// Resolution did not complete within the wall-clock budget.
    #[error("resolution timed out after {elapsed:?}")]
    ResolutionTimeout { elapsed: Duration },

    /// The caller cancelled the request.
    #[error("cancelled")]
    Cancelled,

    /// Registry contract violation.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl PlacementError {
    /// Whether asking the user to try again later makes sense.
    ///
    /// Accuracy and timeouts are usually fixed by moving or waiting; a
    /// rejected request or a contract violation is not.
    pub fn is_retryable_later(&self) -> bool {
        matches!(
            self,
            Self::InsufficientAccuracy { .. } | Self::Timeout { .. } | Self::ResolutionTimeout { .. }
        )
    }
}

/// Error reported by an [`AnchorPrimitives`](super::AnchorPrimitives)
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PrimitiveError {
    pub message: String,
    pub is_retryable: bool,
}

impl PrimitiveError {
    /// A failure worth retrying (tracking hiccup, service busy).
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_retryable: true,
        }
    }

    /// A failure that aborts the request immediately.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_retryable: false,
        }
    }
}
