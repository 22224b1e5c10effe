//! Communication façade: tagged non-blocking byte transport, tag families,
//! pooled buffers and cluster-wide reductions.
//!
//! Everything that crosses rank boundaries goes through the [`Communicator`]
//! trait. Backends: [`NoComm`] for serial runs, [`ThreadComm`] for
//! rank-per-thread execution (tests and single-host runs), and `MpiComm`
//! behind the `mpi-support` feature.

pub mod buffer;
pub mod communicator;
pub mod reduce;
pub mod tags;
pub mod wire;

pub use buffer::{recv_intent, send_intent, BufferPool, HaloPhase};
pub use communicator::{Communicator, NoComm, ThreadComm, Wait};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use reduce::{all_reduce, ReduceElem, ReduceOp};
pub use tags::{CommTag, HaloCommTags, TagAllocator};
