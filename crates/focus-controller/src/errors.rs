//! Focus controller error types.
//!
//! Colibri errors are reported to the conference orchestration layer, which
//! decides whether a failure is fatal for the conference or only for one
//! participant. Nothing here retries.

use common::types::{EndpointId, MediaType};
use thiserror::Error;

/// Coarse failure classification of a [`ColibriError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The bridge did not answer in time, or the request never left.
    NetworkFailure,
    /// The bridge answered with an error or with something unusable.
    Protocol,
    /// The call was not valid in the controller's current state.
    IllegalState,
}

/// Colibri controller error type.
///
/// Maps to [`FailureKind`]:
/// - `NetworkFailure`, `Transport`: `NetworkFailure`
/// - `Protocol`: `Protocol`
/// - `IllegalState`, `MissingMediaType`: `IllegalState`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColibriError {
    /// No reply arrived before the request timeout.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The reply carried an error element or was not a conference description.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The operation is not allowed in the current state.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A channel descriptor lacks channels of a media type the operation needs.
    #[error("Cannot {operation}: no {media_type} channels")]
    MissingMediaType {
        operation: &'static str,
        media_type: MediaType,
    },

    /// The local send path refused the request.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ColibriError {
    /// Returns the failure classification for this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            ColibriError::NetworkFailure(_) | ColibriError::Transport(_) => {
                FailureKind::NetworkFailure
            }
            ColibriError::Protocol(_) => FailureKind::Protocol,
            ColibriError::IllegalState(_) | ColibriError::MissingMediaType { .. } => {
                FailureKind::IllegalState
            }
        }
    }

    /// Bounded label used for the `outcome` metric dimension.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self.kind() {
            FailureKind::NetworkFailure => "network_failure",
            FailureKind::Protocol => "protocol_error",
            FailureKind::IllegalState => "illegal_state",
        }
    }
}

/// Participant roster errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// A participant with this endpoint ID is already in the roster.
    #[error("Participant already exists: {0}")]
    ParticipantExists(EndpointId),

    /// No participant with this endpoint ID is in the roster.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(EndpointId),
}
