//! PargridError: unified error type for pargrid public APIs
//!
//! This error type is used throughout the pargrid library to provide robust,
//! non-panicking error handling for all public APIs. Communication transport
//! failures are fatal to the process group and are surfaced here only so the
//! caller can abort cleanly; they are never retried.

use thiserror::Error;

/// Unified error type for pargrid operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PargridError {
    /// Mesh spacing must be strictly positive on every axis.
    #[error("mesh spacing must be positive on every axis, got {0:?}")]
    NonPositiveSpacing([f64; 3]),
    /// The global index domain has no cells on some axis.
    #[error("global domain is empty on axis {axis}")]
    EmptyDomain { axis: usize },
    /// A rank's owned extent is smaller than the requested ghost depth.
    #[error("ghost depth {nghost} exceeds owned extent {extent} on axis {axis} of rank {rank}")]
    GhostDepthExceedsExtent {
        rank: usize,
        axis: usize,
        nghost: usize,
        extent: usize,
    },
    /// More ranks than cells along the decomposed axes.
    #[error("cannot tile {cells} cells over {ranks} ranks on axis {axis}")]
    OverDecomposed {
        axis: usize,
        cells: usize,
        ranks: usize,
    },
    /// Invariant P1 violated: the dual of a recorded neighbor entry is
    /// missing or has mismatched extents. Indicates a layout bug; callers
    /// should abort the process group.
    #[error("asymmetric halo ranges between ranks {local} and {remote} ({context})")]
    AsymmetricRanges {
        local: usize,
        remote: usize,
        context: &'static str,
    },
    /// A receive completed with a payload size different from the
    /// precomputed range extents.
    #[error("halo payload from rank {peer}: expected {expected} bytes, got {got}")]
    PayloadSizeMismatch {
        peer: usize,
        expected: usize,
        got: usize,
    },
    /// The underlying transport failed; fatal to the process group.
    #[error("communication with rank {peer} failed: {reason}")]
    Comm { peer: usize, reason: String },
    /// Strided particle ID issuance would overflow `i64`.
    #[error("particle id space exhausted (next_id={next_id}, stride={stride}, requested={requested})")]
    IdOverflow {
        next_id: i64,
        stride: usize,
        requested: usize,
    },
    /// A particle count operation would overflow `usize`.
    #[error("particle count overflow (count={count}, requested={requested})")]
    CountOverflow { count: usize, requested: usize },
    /// An attribute handle does not belong to this particle base.
    #[error("attribute handle {0} is not registered")]
    UnknownAttribute(usize),
    /// An attribute handle was used with the wrong element type.
    #[error("attribute handle {0} has a different element type")]
    AttributeTypeMismatch(usize),
    /// Destroy bookkeeping disagrees with the container's logical size.
    #[error("destroy counts inconsistent: local={local}, destroyed={destroyed}, size={size}")]
    InvalidDestroyCounts {
        local: usize,
        destroyed: usize,
        size: usize,
    },
}
