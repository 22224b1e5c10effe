//! Index algebra: half-open intervals and their Cartesian products.
//!
//! These are the pure value types everything else is built on. A rank's
//! owned region, a halo slab, a pack range and the global domain are all
//! `NDIndex<3>` values; the layout derives communication ranges purely by
//! `grow`/`intersect` on them.

pub mod interval;
pub mod ndindex;

pub use interval::Interval;
pub use ndindex::NDIndex;
