//! Registry contract errors.
//!
//! These indicate misuse by the caller, never an expected runtime condition,
//! but they are explicit values so tests can assert on them.

use thiserror::Error;

use super::types::{AnchorId, LifecycleState};

/// Errors returned by [`AnchorRegistry`](super::AnchorRegistry) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No anchor with this id is registered.
    #[error("anchor {0} not found")]
    NotFound(AnchorId),

    /// The operation is not valid for the anchor's current state.
    #[error("cannot {operation} anchor {id} in state {state}")]
    InvalidState {
        id: AnchorId,
        state: LifecycleState,
        operation: &'static str,
    },

    /// A required argument is missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
