//! Domain decomposition: rank tiling and neighbor tables.
//!
//! A [`FieldLayout`] assigns every rank a disjoint sub-box of the global
//! index domain and precomputes, for the owning rank, the face, edge and
//! vertex communication partners together with the exact send/receive
//! sub-ranges the halo engine packs. All of that happens once at
//! construction; halo exchanges only read the tables.

pub mod field_layout;
pub mod neighbors;

pub use field_layout::FieldLayout;
pub use neighbors::{NeighborEntry, NeighborTable, PackRange};
