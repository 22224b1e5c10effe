//! `Field`: a `BareField` bound to mesh metadata.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::comm::HaloCommTags;
use crate::layout::FieldLayout;
use crate::mesh::UniformCartesian;

use super::bare_field::BareField;
use super::GridScalar;

/// A grid field with mesh metadata: everything a stencil or interpolation
/// consumer needs in one handle.
///
/// Derefs to [`BareField`] for the view, halo and assignment surface, and
/// adds the shared mesh for coordinate maps.
#[derive(Clone, Debug)]
pub struct Field<T> {
    bare: BareField<T>,
    mesh: Arc<UniformCartesian>,
}

impl<T: GridScalar> Field<T> {
    /// Allocate a zero-initialized field bound to `mesh` and `layout`.
    pub fn new(mesh: Arc<UniformCartesian>, layout: Arc<FieldLayout>) -> Self {
        Self {
            bare: BareField::new(layout),
            mesh,
        }
    }

    /// Allocate with caller-chosen halo tag families.
    pub fn with_tags(
        mesh: Arc<UniformCartesian>,
        layout: Arc<FieldLayout>,
        tags: HaloCommTags,
    ) -> Self {
        Self {
            bare: BareField::with_tags(layout, tags),
            mesh,
        }
    }

    /// Mesh metadata shared with the other consumers of this layout.
    #[inline]
    pub fn mesh(&self) -> &UniformCartesian {
        &self.mesh
    }
}

impl<T> Deref for Field<T> {
    type Target = BareField<T>;
    #[inline]
    fn deref(&self) -> &BareField<T> {
        &self.bare
    }
}

impl<T> DerefMut for Field<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut BareField<T> {
        &mut self.bare
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Interval, NDIndex};
    use crate::mesh::Vec3;

    #[test]
    fn field_exposes_mesh_and_bare_surface() {
        let mesh = Arc::new(
            UniformCartesian::new(Vec3::splat(0.0), Vec3::splat(1.0), [4, 4, 4]).unwrap(),
        );
        let global = NDIndex::new([Interval::new(0, 4); 3]);
        let layout = Arc::new(FieldLayout::with_rank(0, 1, global, 1).unwrap());
        let mut f = Field::<f64>::new(mesh, layout);

        f.assign(2.0);
        assert_eq!(f.nghost(), 1);
        assert_eq!(f.mesh().spacing(), Vec3::splat(1.0));
        assert_eq!(*f.view().at(1, 1, 1), 2.0);
    }
}
