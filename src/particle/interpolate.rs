//! Cloud-in-cell coupling between particles and grid fields.
//!
//! Scatter deposits per-particle values onto the 2x2x2 cell cube around
//! each particle with trilinear weights and then accumulates halo
//! contributions back to their owners. Gather refreshes the halos first
//! and then reads the same weighted cube. The layout's ghost depth must
//! contain every particle's excursion; positions mapping outside the
//! owned-plus-ghost region are not defended here.

use crate::comm::Communicator;
use crate::error::PargridError;
use crate::field::{Field, GridScalar};
use crate::kernel::{parallel_for, AtomicAdd, SharedSlice};
use crate::mesh::Vec3;

use super::attrib::ParticleAttrib;

/// Per-particle CIC geometry: local-view cell `(i, j, k)` and the low/high
/// weights per axis.
#[inline]
fn cic_weights(
    pos: Vec3,
    origin: Vec3,
    invdx: Vec3,
    lfirst: [i64; 3],
    nghost: i64,
) -> ([usize; 3], Vec3, Vec3) {
    let l = (pos - origin).component_mul(&invdx) + Vec3::splat(0.5);
    let index = l.floor_index();
    let whi = Vec3::new(
        l[0] - index[0] as f64,
        l[1] - index[1] as f64,
        l[2] - index[2] as f64,
    );
    let wlo = Vec3::splat(1.0) - whi;
    let cell = [
        (index[0] - lfirst[0] + nghost) as usize,
        (index[1] - lfirst[1] + nghost) as usize,
        (index[2] - lfirst[2] + nghost) as usize,
    ];
    (cell, wlo, whi)
}

/// Deposit `attrib` onto `field` at `positions` (CIC), then accumulate the
/// halo so depositions into ghost cells migrate to their owners and sum.
pub fn scatter<T, C>(
    attrib: &ParticleAttrib<T>,
    field: &mut Field<T>,
    positions: &ParticleAttrib<Vec3>,
    comm: &C,
) -> Result<(), PargridError>
where
    T: GridScalar + AtomicAdd + std::ops::AddAssign + std::ops::Mul<f64, Output = T>,
    C: Communicator,
{
    debug_assert_eq!(attrib.size(), positions.size());

    let origin = field.mesh().origin();
    let invdx = field.mesh().spacing().recip();
    let nghost = field.nghost() as i64;
    let lfirst = field.layout().local_domain().firsts();
    let ext = field.view().extents();

    {
        let q = attrib.as_slice();
        let pos = positions.as_slice();
        let view = SharedSlice::new(field.view_mut().as_mut_slice());
        let off = move |i: usize, j: usize, k: usize| i + ext[0] * (j + ext[1] * k);

        parallel_for(q.len(), |p| {
            let ([i, j, k], wlo, whi) = cic_weights(pos[p], origin, invdx, lfirst, nghost);
            let val = q[p];

            view.add(off(i - 1, j - 1, k - 1), val * (wlo[0] * wlo[1] * wlo[2]));
            view.add(off(i - 1, j - 1, k), val * (wlo[0] * wlo[1] * whi[2]));
            view.add(off(i - 1, j, k - 1), val * (wlo[0] * whi[1] * wlo[2]));
            view.add(off(i - 1, j, k), val * (wlo[0] * whi[1] * whi[2]));
            view.add(off(i, j - 1, k - 1), val * (whi[0] * wlo[1] * wlo[2]));
            view.add(off(i, j - 1, k), val * (whi[0] * wlo[1] * whi[2]));
            view.add(off(i, j, k - 1), val * (whi[0] * whi[1] * wlo[2]));
            view.add(off(i, j, k), val * (whi[0] * whi[1] * whi[2]));
        });
    }

    field.accumulate_halo(comm)
}

/// Refresh `field`'s halos, then interpolate it onto `attrib` at
/// `positions` (trilinear read of the CIC cube).
pub fn gather<T, C>(
    attrib: &mut ParticleAttrib<T>,
    field: &mut Field<T>,
    positions: &ParticleAttrib<Vec3>,
    comm: &C,
) -> Result<(), PargridError>
where
    T: GridScalar + std::ops::AddAssign + std::ops::Mul<f64, Output = T>,
    C: Communicator,
{
    debug_assert_eq!(attrib.size(), positions.size());

    field.fill_halo(comm)?;

    let origin = field.mesh().origin();
    let invdx = field.mesh().spacing().recip();
    let nghost = field.nghost() as i64;
    let lfirst = field.layout().local_domain().firsts();

    let view = field.view();
    let pos = positions.as_slice();
    let dst = SharedSlice::new(attrib.as_mut_slice());

    parallel_for(pos.len(), |p| {
        let ([i, j, k], wlo, whi) = cic_weights(pos[p], origin, invdx, lfirst, nghost);

        let mut val = T::default();
        val += *view.at(i - 1, j - 1, k - 1) * (wlo[0] * wlo[1] * wlo[2]);
        val += *view.at(i - 1, j - 1, k) * (wlo[0] * wlo[1] * whi[2]);
        val += *view.at(i - 1, j, k - 1) * (wlo[0] * whi[1] * wlo[2]);
        val += *view.at(i - 1, j, k) * (wlo[0] * whi[1] * whi[2]);
        val += *view.at(i, j - 1, k - 1) * (whi[0] * wlo[1] * wlo[2]);
        val += *view.at(i, j - 1, k) * (whi[0] * wlo[1] * whi[2]);
        val += *view.at(i, j, k - 1) * (whi[0] * whi[1] * wlo[2]);
        val += *view.at(i, j, k) * (whi[0] * whi[1] * whi[2]);
        // Each particle writes only its own slot.
        unsafe { dst.write(p, val) };
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::comm::NoComm;
    use crate::field::from_fn;
    use crate::index::{Interval, NDIndex};
    use crate::layout::FieldLayout;
    use crate::mesh::UniformCartesian;
    use crate::particle::ParticleBase;

    fn unit_setup(n: i64) -> (Arc<UniformCartesian>, Arc<FieldLayout>) {
        let mesh = Arc::new(
            UniformCartesian::new(Vec3::splat(0.0), Vec3::splat(1.0), [n as usize; 3]).unwrap(),
        );
        let global = NDIndex::new([Interval::new(0, n); 3]);
        let layout = Arc::new(FieldLayout::with_rank(0, 1, global, 1).unwrap());
        (mesh, layout)
    }

    #[test]
    fn scatter_deposits_eighths_at_cell_corner() {
        // One particle at (1, 1, 1) on a unit mesh sits exactly on the
        // corner shared by cells {0,1}^3 (cell i spans [i, i+1)), so each
        // of the eight cells receives one eighth of the charge.
        let (mesh, layout) = unit_setup(4);
        let comm = NoComm::default();
        let mut rho = Field::<f64>::new(mesh, layout);

        let mut p = ParticleBase::with_rank(0, 1);
        p.create(1).unwrap();
        p.positions_mut().set(0, Vec3::splat(1.0));
        let mut q = ParticleAttrib::<f64>::new();
        q.create(1).unwrap();
        q.assign(1.0);

        scatter(&q, &mut rho, p.positions(), &comm).unwrap();

        let g = rho.nghost();
        let mut total = 0.0;
        for k in 0..4 {
            for j in 0..4 {
                for i in 0..4 {
                    let v = *rho.view().at(i + g, j + g, k + g);
                    if i < 2 && j < 2 && k < 2 {
                        assert!((v - 0.125).abs() < 1e-12, "cell ({i},{j},{k}) = {v}");
                    } else {
                        assert_eq!(v, 0.0);
                    }
                    total += v;
                }
            }
        }
        assert!((total - 1.0).abs() < 1e-12, "deposition conserves charge");
    }

    #[test]
    fn gather_at_grid_node_reads_field_exactly() {
        // phi(i,j,k) = i + 2j + 3k on owned cells; a particle on the
        // corner shared by cells 1 and 2 averages the eight surrounding
        // cell values.
        let (mesh, layout) = unit_setup(4);
        let comm = NoComm::default();
        let mut phi = Field::<f64>::new(mesh, layout);
        let g = phi.nghost();
        phi.assign(from_fn(move |i, j, k| {
            ((i - g) + 2 * (j - g) + 3 * (k - g)) as f64
        }));

        let mut p = ParticleBase::with_rank(0, 1);
        p.create(1).unwrap();
        p.positions_mut().set(0, Vec3::splat(2.0));
        let mut sampled = ParticleAttrib::<f64>::new();
        sampled.create(1).unwrap();

        gather(&mut sampled, &mut phi, p.positions(), &comm).unwrap();

        // Cube cells {1,2}^3, phi averages to phi(1.5, 1.5, 1.5) = 9.
        assert!((sampled.get(0) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn scatter_then_gather_at_cell_center() {
        // A particle at a cell center has weights (1,...) on its own cell:
        // scatter puts everything in one cell, gather reads it back.
        let (mesh, layout) = unit_setup(4);
        let comm = NoComm::default();
        let mut rho = Field::<f64>::new(mesh, layout);

        let mut p = ParticleBase::with_rank(0, 1);
        p.create(1).unwrap();
        p.positions_mut().set(0, Vec3::new(2.5, 1.5, 0.5));
        let mut q = ParticleAttrib::<f64>::new();
        q.create(1).unwrap();
        q.assign(3.0);

        scatter(&q, &mut rho, p.positions(), &comm).unwrap();
        let g = rho.nghost();
        assert!((rho.view().at(2 + g, 1 + g, g) - 3.0).abs() < 1e-12);

        let mut back = ParticleAttrib::<f64>::new();
        back.create(1).unwrap();
        gather(&mut back, &mut rho, p.positions(), &comm).unwrap();
        assert!((back.get(0) - 3.0).abs() < 1e-12);
    }
}
