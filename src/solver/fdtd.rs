//! Finite-differences time-domain update of a scalar potential.
//!
//! This solver exists to exercise the grid data model the way a real
//! consumer does: it keeps three time levels of a potential, refreshes
//! halos before every stencil pass, evaluates the update over owned cells
//! through the expression seam and samples a derived vector field. The
//! stencil arithmetic itself is the routine second-order wave update with
//! the charge density as source (c = 1); global boundary cells are pinned
//! to zero.

use std::sync::Arc;

use crate::comm::Communicator;
use crate::error::PargridError;
use crate::field::{from_fn, Field};
use crate::layout::FieldLayout;
use crate::mesh::{UniformCartesian, Vec3};

/// Three-level scalar-potential FDTD solver.
pub struct FdtdSolver {
    phi_nm1: Field<f64>,
    phi_n: Field<f64>,
    phi_np1: Field<f64>,
    rho: Field<f64>,
    dt: f64,
}

impl FdtdSolver {
    /// Allocate the time levels and the source field on a shared mesh and
    /// layout. All fields start zeroed.
    pub fn new(
        mesh: Arc<UniformCartesian>,
        layout: Arc<FieldLayout>,
        dt: f64,
    ) -> Self {
        Self {
            phi_nm1: Field::new(Arc::clone(&mesh), Arc::clone(&layout)),
            phi_n: Field::new(Arc::clone(&mesh), Arc::clone(&layout)),
            phi_np1: Field::new(Arc::clone(&mesh), Arc::clone(&layout)),
            rho: Field::new(mesh, layout),
            dt,
        }
    }

    /// Charge density source; deposition writes here each timestep.
    pub fn rho_mut(&mut self) -> &mut Field<f64> {
        &mut self.rho
    }

    /// Potential at the current time level.
    pub fn potential(&self) -> &Field<f64> {
        &self.phi_n
    }

    pub fn potential_mut(&mut self) -> &mut Field<f64> {
        &mut self.phi_n
    }

    /// Advance the potential one timestep.
    pub fn step<C: Communicator>(&mut self, comm: &C) -> Result<(), PargridError> {
        self.phi_n.fill_halo(comm)?;

        let h = self.phi_n.mesh().spacing();
        let dt = self.dt;
        let a1 = 2.0 * (1.0 - (dt / h[0]).powi(2) - (dt / h[1]).powi(2) - (dt / h[2]).powi(2));
        let a2 = (dt / h[0]).powi(2);
        let a4 = (dt / h[1]).powi(2);
        let a6 = (dt / h[2]).powi(2);
        let a8 = dt * dt;

        let layout = Arc::clone(self.phi_n.layout());
        let g = layout.nghost() as i64;
        let lfirst = layout.local_domain().firsts();
        let nr = layout.global_domain().extents();

        let vn = self.phi_n.view();
        let vm = self.phi_nm1.view();
        let vr = self.rho.view();

        let update = from_fn(move |i, j, k| {
            let ig = i as i64 + lfirst[0] - g;
            let jg = j as i64 + lfirst[1] - g;
            let kg = k as i64 + lfirst[2] - g;
            let interior = ig > 0
                && jg > 0
                && kg > 0
                && ig < nr[0] as i64 - 1
                && jg < nr[1] as i64 - 1
                && kg < nr[2] as i64 - 1;
            if !interior {
                return 0.0;
            }
            -vm.at(i, j, k)
                + a1 * vn.at(i, j, k)
                + a2 * (vn.at(i + 1, j, k) + vn.at(i - 1, j, k))
                + a4 * (vn.at(i, j + 1, k) + vn.at(i, j - 1, k))
                + a6 * (vn.at(i, j, k + 1) + vn.at(i, j, k - 1))
                + a8 * vr.at(i, j, k)
        });
        self.phi_np1.assign(update);

        // Rotate time levels: n-1 <- n <- n+1.
        std::mem::swap(&mut self.phi_nm1, &mut self.phi_n);
        std::mem::swap(&mut self.phi_n, &mut self.phi_np1);
        Ok(())
    }

    /// Central-difference gradient of the potential: `E = -grad(phi)`.
    pub fn evaluate_e_field<C: Communicator>(
        &mut self,
        e: &mut Field<Vec3>,
        comm: &C,
    ) -> Result<(), PargridError> {
        self.phi_n.fill_halo(comm)?;
        let h = self.phi_n.mesh().spacing();
        let inv2 = Vec3::new(0.5 / h[0], 0.5 / h[1], 0.5 / h[2]);
        let v = self.phi_n.view();
        e.assign(from_fn(move |i, j, k| {
            Vec3::new(
                -(v.at(i + 1, j, k) - v.at(i - 1, j, k)) * inv2[0],
                -(v.at(i, j + 1, k) - v.at(i, j - 1, k)) * inv2[1],
                -(v.at(i, j, k + 1) - v.at(i, j, k - 1)) * inv2[2],
            )
        }));
        Ok(())
    }
}
