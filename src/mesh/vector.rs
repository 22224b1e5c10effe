//! `Vec3`: a Pod-safe 3-component `f64` vector.
//!
//! Positions and mesh metadata use this type; it crosses the communicator
//! as raw bytes, so its layout is pinned to `[f64; 3]`.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// A 3-component `f64` vector with component-wise arithmetic.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3(pub [f64; 3]);

// Layout is exactly [f64; 3]; no padding.
unsafe impl Zeroable for Vec3 {}
unsafe impl Pod for Vec3 {}

impl Vec3 {
    /// All components equal to `v`.
    #[inline]
    pub const fn splat(v: f64) -> Self {
        Self([v; 3])
    }

    /// Build from components.
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self([x, y, z])
    }

    /// Component-wise product.
    #[inline]
    pub fn component_mul(&self, rhs: &Self) -> Self {
        Self([
            self.0[0] * rhs.0[0],
            self.0[1] * rhs.0[1],
            self.0[2] * rhs.0[2],
        ])
    }

    /// Component-wise reciprocal.
    #[inline]
    pub fn recip(&self) -> Self {
        Self([1.0 / self.0[0], 1.0 / self.0[1], 1.0 / self.0[2]])
    }

    /// Component-wise floor, as integer indices.
    #[inline]
    pub fn floor_index(&self) -> [i64; 3] {
        [
            self.0[0].floor() as i64,
            self.0[1].floor() as i64,
            self.0[2].floor() as i64,
        ]
    }
}

impl std::ops::Index<usize> for Vec3 {
    type Output = f64;
    #[inline]
    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

impl std::ops::IndexMut<usize> for Vec3 {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.0[i]
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;
    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3([
            self.0[0] + rhs.0[0],
            self.0[1] + rhs.0[1],
            self.0[2] + rhs.0[2],
        ])
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;
    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3([
            self.0[0] - rhs.0[0],
            self.0[1] - rhs.0[1],
            self.0[2] - rhs.0[2],
        ])
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, s: f64) -> Vec3 {
        Vec3([self.0[0] * s, self.0[1] * s, self.0[2] * s])
    }
}

impl std::ops::AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Vec3) {
        for d in 0..3 {
            self.0[d] += rhs.0[d];
        }
    }
}
