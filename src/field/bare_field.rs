//! `BareField`: a layout-bound padded 3D array with halo operations.

use std::sync::Arc;

use crate::comm::{all_reduce, Communicator, HaloCommTags, ReduceElem, ReduceOp};
use crate::error::PargridError;
use crate::kernel::{parallel_for_box, parallel_reduce, SharedSlice};
use crate::layout::FieldLayout;

use super::expr::FieldExpr;
use super::halo::HaloCells;
use super::view::View3;
use super::GridScalar;

/// An owning container of a 3D array with ghost padding, bound to a layout.
///
/// The total extent per axis is `local_extent + 2*nghost`. Cells with all
/// indices in `[nghost, nghost + local_extent)` are owned; all others are
/// halo. Construction zeroes everything, halos included. Assignment (scalar
/// or expression) touches owned cells only, leaving halo state stale until
/// the next [`fill_halo`](Self::fill_halo).
#[derive(Clone, Debug)]
pub struct BareField<T> {
    layout: Arc<FieldLayout>,
    view: View3<T>,
    halo: HaloCells<T>,
}

impl<T: GridScalar> BareField<T> {
    /// Allocate a zero-initialized field on `layout` with the default halo
    /// tag families.
    pub fn new(layout: Arc<FieldLayout>) -> Self {
        Self::with_tags(layout, HaloCommTags::default())
    }

    /// Allocate with caller-chosen halo tag families, for fields that must
    /// exchange concurrently with others.
    pub fn with_tags(layout: Arc<FieldLayout>, tags: HaloCommTags) -> Self {
        let view = View3::new(layout.padded_extents());
        Self {
            layout,
            view,
            halo: HaloCells::with_tags(tags),
        }
    }

    /// Full padded view, halos included.
    #[inline]
    pub fn view(&self) -> &View3<T> {
        &self.view
    }

    /// Mutable padded view.
    #[inline]
    pub fn view_mut(&mut self) -> &mut View3<T> {
        &mut self.view
    }

    #[inline]
    pub fn layout(&self) -> &Arc<FieldLayout> {
        &self.layout
    }

    /// Ghost layer depth per side of each axis.
    #[inline]
    pub fn nghost(&self) -> usize {
        self.layout.nghost()
    }

    /// Half-open owned box in local-view coordinates.
    #[inline]
    pub fn owned_box(&self) -> ([usize; 3], [usize; 3]) {
        let g = self.nghost();
        let e = self.layout.local_extents();
        ([g, g, g], [g + e[0], g + e[1], g + e[2]])
    }

    /// Overwrite halo cells from the remote owners' interiors.
    pub fn fill_halo<C: Communicator>(&mut self, comm: &C) -> Result<(), PargridError> {
        let Self {
            layout, view, halo, ..
        } = self;
        halo.fill(view, layout, comm)
    }

    /// Add halo contents into the remote owners' interiors.
    pub fn accumulate_halo<C: Communicator>(&mut self, comm: &C) -> Result<(), PargridError>
    where
        T: std::ops::AddAssign,
    {
        let Self {
            layout, view, halo, ..
        } = self;
        halo.accumulate(view, layout, comm)
    }

    /// Evaluate `expr` at every owned cell; halos are not touched.
    pub fn assign<E: FieldExpr<T>>(&mut self, expr: E) {
        let (lo, hi) = self.owned_box();
        let ext = self.view.extents();
        let box_ext = [hi[0] - lo[0], hi[1] - lo[1], hi[2] - lo[2]];
        let shared = SharedSlice::new(self.view.as_mut_slice());
        parallel_for_box(box_ext, |i, j, k| {
            let (vi, vj, vk) = (lo[0] + i, lo[1] + j, lo[2] + k);
            let off = vi + ext[0] * (vj + ext[1] * vk);
            // Each owned cell is written exactly once.
            unsafe { shared.write(off, expr.eval(vi, vj, vk)) };
        });
    }

    /// Parallel reduction over owned cells followed by a cluster-wide
    /// all-reduce with the matching operator.
    pub fn reduce<C: Communicator>(
        &self,
        comm: &C,
        op: ReduceOp,
    ) -> Result<T, PargridError>
    where
        T: ReduceElem,
    {
        let (lo, hi) = self.owned_box();
        let ext = self.view.extents();
        let box_ext = [hi[0] - lo[0], hi[1] - lo[1], hi[2] - lo[2]];
        let n = box_ext[0] * box_ext[1] * box_ext[2];
        let slice = self.view.as_slice();
        let local = parallel_reduce(
            n,
            T::identity(op),
            |l| {
                let i = lo[0] + l % box_ext[0];
                let j = lo[1] + (l / box_ext[0]) % box_ext[1];
                let k = lo[2] + l / (box_ext[0] * box_ext[1]);
                slice[i + ext[0] * (j + ext[1] * k)]
            },
            |a, b| crate::comm::reduce::combine(op, a, b),
        );
        all_reduce(comm, local, op)
    }

    /// Cluster-wide sum over owned cells.
    pub fn sum<C: Communicator>(&self, comm: &C) -> Result<T, PargridError>
    where
        T: ReduceElem,
    {
        self.reduce(comm, ReduceOp::Sum)
    }
}
