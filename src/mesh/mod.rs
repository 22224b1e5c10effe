//! Uniform Cartesian mesh metadata and the `Vec3` value type.

pub mod uniform;
pub mod vector;

pub use uniform::UniformCartesian;
pub use vector::Vec3;
