//! Errors returned by the forwarding-metric engines.

use crate::{EdgeId, VertexId};

/// A result with the crate's [Error] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors which abort a single computation.
///
/// None of these terminate the host simulation; the caller decides whether to
/// skip, retry or abort the affected target.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("communication range must be greater than zero")]
    ZeroCommunicationRange,

    #[error("edge {edge:?} has a mean interarrival time of zero")]
    ZeroInterarrival { edge: EdgeId },

    #[error("linear system is singular (no pivot in column {column})")]
    SingularMatrix { column: usize },

    #[error("vertex {0:?} is not part of the road graph")]
    UnknownVertex(VertexId),

    #[error("edge {0:?} is not part of the road graph")]
    UnknownEdge(EdgeId),

    #[error("invalid trajectory: {0}")]
    InvalidTrajectory(String),

    #[error("EDD has not been computed for target {target:?}")]
    EddNotComputed { target: VertexId },
}
