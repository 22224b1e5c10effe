//! Grid configuration: the serializable description of a simulation domain.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::comm::Communicator;
use crate::error::PargridError;
use crate::index::{Interval, NDIndex};
use crate::layout::FieldLayout;
use crate::mesh::{UniformCartesian, Vec3};

/// Domain description as read from a config file.
///
/// Validation happens in [`build`](Self::build): non-positive spacing, empty
/// domains and over-decomposition surface as [`PargridError`] values at
/// construction, never later.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridConfig {
    /// Global cell counts per axis.
    pub cells: [usize; 3],
    /// World coordinate of the low corner of cell (0,0,0).
    pub origin: [f64; 3],
    /// Cell size per axis; must be positive.
    pub spacing: [f64; 3],
    /// Ghost layer depth on every side of every axis.
    #[serde(default = "default_nghost")]
    pub nghost: usize,
}

fn default_nghost() -> usize {
    1
}

impl GridConfig {
    /// Validate and build the shared mesh and this rank's layout.
    pub fn build<C: Communicator>(
        &self,
        comm: &C,
    ) -> Result<(Arc<UniformCartesian>, Arc<FieldLayout>), PargridError> {
        let mesh = UniformCartesian::new(
            Vec3(self.origin),
            Vec3(self.spacing),
            self.cells,
        )?;
        let global = NDIndex::new([
            Interval::with_length(self.cells[0] as i64),
            Interval::with_length(self.cells[1] as i64),
            Interval::with_length(self.cells[2] as i64),
        ]);
        let layout = FieldLayout::new(comm, global, self.nghost)?;
        Ok((Arc::new(mesh), Arc::new(layout)))
    }
}
