//! Uniform Cartesian mesh: origin, spacing, cell counts.

use serde::{Deserialize, Serialize};

use super::vector::Vec3;
use crate::error::PargridError;

/// A uniform Cartesian mesh over a 3D cell-indexed domain.
///
/// Immutable after construction; shared by reference among fields and
/// particle containers. Only pure coordinate maps live here; the index
/// partitioning is the layout's job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UniformCartesian {
    origin: Vec3,
    spacing: Vec3,
    cells: [usize; 3],
}

impl UniformCartesian {
    /// Create a mesh; rejects non-positive spacing.
    pub fn new(origin: Vec3, spacing: Vec3, cells: [usize; 3]) -> Result<Self, PargridError> {
        if spacing.0.iter().any(|&h| h <= 0.0) {
            return Err(PargridError::NonPositiveSpacing(spacing.0));
        }
        Ok(Self {
            origin,
            spacing,
            cells,
        })
    }

    /// World coordinate of the center of cell `index`.
    ///
    /// `cell_center(i) = origin + spacing * (i + 0.5)`.
    #[inline]
    pub fn cell_center(&self, index: [i64; 3]) -> Vec3 {
        let mut c = self.origin;
        for d in 0..3 {
            c[d] += self.spacing[d] * (index[d] as f64 + 0.5);
        }
        c
    }

    /// Fractional cell coordinate of a world position.
    ///
    /// `world_to_cell(x) = (x - origin) / spacing`.
    #[inline]
    pub fn world_to_cell(&self, x: Vec3) -> Vec3 {
        (x - self.origin).component_mul(&self.spacing.recip())
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn spacing(&self) -> Vec3 {
        self.spacing
    }

    #[inline]
    pub fn cells(&self) -> [usize; 3] {
        self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonpositive_spacing() {
        let err = UniformCartesian::new(Vec3::splat(0.0), Vec3::new(1.0, 0.0, 1.0), [4, 4, 4]);
        assert!(matches!(err, Err(PargridError::NonPositiveSpacing(_))));
    }

    #[test]
    fn cell_center_offsets_by_half() {
        let m =
            UniformCartesian::new(Vec3::new(1.0, 0.0, 0.0), Vec3::splat(0.5), [8, 8, 8]).unwrap();
        assert_eq!(m.cell_center([0, 0, 0]), Vec3::new(1.25, 0.25, 0.25));
        assert_eq!(m.cell_center([2, 0, 0])[0], 2.25);
    }

    #[test]
    fn world_to_cell_inverts_cell_center() {
        let m =
            UniformCartesian::new(Vec3::new(-1.0, 2.0, 0.0), Vec3::splat(0.25), [16, 16, 16])
                .unwrap();
        let x = m.cell_center([3, 5, 7]);
        let c = m.world_to_cell(x);
        assert_eq!(c.floor_index(), [3, 5, 7]);
    }
}
