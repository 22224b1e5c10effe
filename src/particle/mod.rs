//! Particle containers and grid interpolation.

pub mod attrib;
pub mod base;
pub mod interpolate;

pub use attrib::{ParticleAttrib, ParticleAttribBase, ParticleScalar};
pub use base::{AttribHandle, ParticleBase};
pub use interpolate::{gather, scatter};
