use std::time::Duration;

use crate::config::ReplicaId;

/// Failure of a single attempt against one replica.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// The replica could not be reached.
    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    /// The replica answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The response body could not be read.
    #[error("failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

impl AttemptError {
    /// The replica was unreachable.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// The replica was reached but its response was unusable.
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::Body { .. })
    }
}

/// Errors that can occur during a dispatch call.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    /// No replicas were given to the call.
    #[error("no replicas configured")]
    NoReplicas,

    /// Every issued attempt failed.
    ///
    /// Contains each replica and its individual error, in resolution order.
    #[error("all replicas failed: {0:?}")]
    AllFailed(Vec<(ReplicaId, AttemptError)>),

    /// The call exceeded its overall deadline.
    ///
    /// None of the replicas responded successfully within the time limit.
    #[error("dispatch timed out after {0:?}")]
    Timeout(Duration),
}
