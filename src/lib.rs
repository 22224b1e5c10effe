//! # pargrid
//!
//! pargrid is a modular Rust library for distributed structured-grid and
//! particle data management, designed for particle-in-cell and
//! finite-difference codes. It provides a domain-decomposed 3D grid field
//! with ghost layers, a face/edge/vertex halo exchange engine, and a
//! particle container with cloud-in-cell scatter/gather coupling,
//! supporting serial, rank-per-thread and MPI-based distributed workflows.
//!
//! ## Features
//! - Half-open interval and `NDIndex` algebra for index-space bookkeeping
//! - Uniform Cartesian mesh metadata shared immutably across consumers
//! - `FieldLayout` with precomputed face/edge/vertex neighbor tables and
//!   exact send/receive ranges per partner
//! - Pluggable communication backends (serial, thread mailbox, MPI) behind
//!   one `Communicator` trait with pooled buffers and tag families
//! - Fill and accumulate halo exchange over the precomputed tables
//! - Growable particle attributes with stable strided global IDs and
//!   cluster-wide reductions
//! - CIC (trilinear) scatter/gather between particles and fields
//!
//! ## Usage
//! Add `pargrid` as a dependency and enable features as needed:
//!
//! ```toml
//! [dependencies]
//! pargrid = "0.2"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! The `rayon` feature (on by default) runs field and particle kernels on
//! the global rayon pool; without it they run serially with identical
//! semantics.

pub mod comm;
pub mod config;
pub mod error;
pub mod field;
pub mod index;
pub mod kernel;
pub mod layout;
pub mod mesh;
pub mod particle;
pub mod solver;

/// A convenient prelude importing the most-used traits and types.
pub mod prelude {
    pub use crate::comm::{
        all_reduce, Communicator, HaloCommTags, NoComm, ReduceOp, ThreadComm, Wait,
    };
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::config::GridConfig;
    pub use crate::error::PargridError;
    pub use crate::field::{from_fn, BareField, Field, FieldExpr};
    pub use crate::index::{Interval, NDIndex};
    pub use crate::layout::FieldLayout;
    pub use crate::mesh::{UniformCartesian, Vec3};
    pub use crate::particle::{gather, scatter, ParticleAttrib, ParticleBase};
    pub use crate::solver::FdtdSolver;
}
