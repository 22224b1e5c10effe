//! `FieldLayout`: tiling of the global index domain plus precomputed
//! neighbor tables.

use tracing::info;

use super::neighbors::{NeighborEntry, NeighborTable, PackRange};
use crate::comm::Communicator;
use crate::error::PargridError;
use crate::index::NDIndex;

/// Assignment of the global 3D index domain to ranks, with the owning
/// rank's face/edge/vertex communication tables.
///
/// Immutable after construction and safely shared by many fields. The
/// tiling is a balanced 3D process grid: the rank count is factorized and
/// factors are assigned greedily to the axes with the most cells per block;
/// remainder cells go to the low block indices along each axis.
#[derive(Clone, Debug)]
pub struct FieldLayout {
    rank: usize,
    size: usize,
    nghost: usize,
    global: NDIndex<3>,
    locals: Vec<NDIndex<3>>,
    faces: NeighborTable,
    edges: NeighborTable,
    vertices: [Option<NeighborEntry>; 8],
}

impl FieldLayout {
    /// Decompose `global` over the communicator's ranks with `nghost`
    /// ghost layers.
    pub fn new<C: Communicator>(
        comm: &C,
        global: NDIndex<3>,
        nghost: usize,
    ) -> Result<Self, PargridError> {
        Self::with_rank(comm.rank(), comm.size(), global, nghost)
    }

    /// Decompose for an explicit `(rank, size)` pair. Every rank computes
    /// the same tiling, so the tables of any two ranks agree on their
    /// shared regions.
    pub fn with_rank(
        rank: usize,
        size: usize,
        global: NDIndex<3>,
        nghost: usize,
    ) -> Result<Self, PargridError> {
        let extents = global.extents();
        for (axis, &n) in extents.iter().enumerate() {
            if n == 0 {
                return Err(PargridError::EmptyDomain { axis });
            }
        }

        let grid = process_grid(size, extents);
        for (axis, (&g, &n)) in grid.iter().zip(extents.iter()).enumerate() {
            if g > n {
                return Err(PargridError::OverDecomposed {
                    axis,
                    cells: n,
                    ranks: g,
                });
            }
        }

        let locals = tile(&global, grid, size);
        for (r, dom) in locals.iter().enumerate() {
            for (axis, &e) in dom.extents().iter().enumerate() {
                if nghost > e {
                    return Err(PargridError::GhostDepthExceedsExtent {
                        rank: r,
                        axis,
                        nghost,
                        extent: e,
                    });
                }
            }
        }

        let (faces, edges, vertices) = neighbor_tables(rank, &locals, nghost);

        let layout = Self {
            rank,
            size,
            nghost,
            global,
            locals,
            faces,
            edges,
            vertices,
        };

        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        layout.validate_symmetry()?;

        info!(
            rank,
            size,
            grid = ?grid,
            owned = %layout.locals[rank],
            nghost,
            "field layout constructed"
        );
        Ok(layout)
    }

    /// The full index space.
    #[inline]
    pub fn global_domain(&self) -> &NDIndex<3> {
        &self.global
    }

    /// The owning rank's index space.
    #[inline]
    pub fn local_domain(&self) -> &NDIndex<3> {
        &self.locals[self.rank]
    }

    /// Owned index spaces of every rank, pairwise disjoint with union equal
    /// to the global domain.
    #[inline]
    pub fn local_domains(&self) -> &[NDIndex<3>] {
        &self.locals
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Ghost layer depth on every side of every axis.
    #[inline]
    pub fn nghost(&self) -> usize {
        self.nghost
    }

    /// Owned extents of the local rank.
    #[inline]
    pub fn local_extents(&self) -> [usize; 3] {
        self.local_domain().extents()
    }

    /// Local extents including the ghost padding (`+2*nghost` per axis).
    #[inline]
    pub fn padded_extents(&self) -> [usize; 3] {
        let e = self.local_extents();
        let g = 2 * self.nghost;
        [e[0] + g, e[1] + g, e[2] + g]
    }

    /// Face partner table: 6 slots ordered `-x, +x, -y, +y, -z, +z`.
    #[inline]
    pub fn face_neighbors(&self) -> &NeighborTable {
        &self.faces
    }

    /// Edge partner table: 12 slots, 4 per edge-parallel axis.
    #[inline]
    pub fn edge_neighbors(&self) -> &NeighborTable {
        &self.edges
    }

    /// Vertex partners: 8 corners, `None` marks a physical boundary.
    #[inline]
    pub fn vertex_neighbors(&self) -> &[Option<NeighborEntry>; 8] {
        &self.vertices
    }

    /// Verify invariant P1: every recorded entry has a dual on the partner
    /// rank with swapped roles and matching extents.
    #[cfg(any(debug_assertions, feature = "check-invariants"))]
    fn validate_symmetry(&self) -> Result<(), PargridError> {
        let all: Vec<&NeighborEntry> = self
            .faces
            .entries()
            .iter()
            .chain(self.edges.entries())
            .chain(self.vertices.iter().flatten())
            .collect();
        for entry in all {
            let (pf, pe, pv) = neighbor_tables(entry.rank, &self.locals, self.nghost);
            let dual = pf
                .entries()
                .iter()
                .chain(pe.entries())
                .chain(pv.iter().flatten())
                .find(|e| e.rank == self.rank)
                .copied();
            let Some(dual) = dual else {
                return Err(PargridError::AsymmetricRanges {
                    local: self.rank,
                    remote: entry.rank,
                    context: "dual entry missing",
                });
            };
            if dual.send.extents() != entry.recv.extents()
                || dual.recv.extents() != entry.send.extents()
            {
                return Err(PargridError::AsymmetricRanges {
                    local: self.rank,
                    remote: entry.rank,
                    context: "extent mismatch",
                });
            }
        }
        Ok(())
    }
}

/// Balanced process grid for `size` ranks over the given cell extents.
fn process_grid(size: usize, extents: [usize; 3]) -> [usize; 3] {
    let mut grid = [1usize; 3];
    for f in prime_factors_descending(size) {
        let mut best = 0;
        let mut best_ratio = 0.0f64;
        for d in 0..3 {
            let ratio = extents[d] as f64 / grid[d] as f64;
            if ratio > best_ratio {
                best_ratio = ratio;
                best = d;
            }
        }
        grid[best] *= f;
    }
    grid
}

fn prime_factors_descending(mut n: usize) -> Vec<usize> {
    let mut factors = Vec::new();
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            factors.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        factors.push(n);
    }
    factors.sort_unstable_by(|a, b| b.cmp(a));
    factors
}

/// Split `global` into `size` blocks on the `grid` process grid. Rank order
/// is x-fastest: `rank = ix + grid_x * (iy + grid_y * iz)`.
fn tile(global: &NDIndex<3>, grid: [usize; 3], size: usize) -> Vec<NDIndex<3>> {
    use crate::index::Interval;

    let mut axis_blocks: [Vec<Interval>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for d in 0..3 {
        let n = global[d].len();
        let g = grid[d];
        let base = n / g;
        let rest = n % g;
        let mut start = global[d].first();
        for b in 0..g {
            let len = base + usize::from(b < rest);
            axis_blocks[d].push(Interval::new(start, start + len as i64));
            start += len as i64;
        }
    }

    let mut locals = Vec::with_capacity(size);
    for r in 0..size {
        let ix = r % grid[0];
        let iy = (r / grid[0]) % grid[1];
        let iz = r / (grid[0] * grid[1]);
        locals.push(NDIndex::new([
            axis_blocks[0][ix],
            axis_blocks[1][iy],
            axis_blocks[2][iz],
        ]));
    }
    locals
}

/// Enumerate the communication partners of `me` and their pack ranges.
///
/// For a partner rank R: `send = owned ∩ grow(R.owned, nghost)` and
/// `recv = grow(owned, nghost) ∩ R.owned`, both shifted into the padded
/// local view. The relative offset sign pattern classifies the partner as
/// face (one non-zero axis), edge (two) or vertex (three).
#[allow(clippy::type_complexity)]
fn neighbor_tables(
    me: usize,
    locals: &[NDIndex<3>],
    nghost: usize,
) -> (NeighborTable, NeighborTable, [Option<NeighborEntry>; 8]) {
    let mut face_slots: Vec<Vec<NeighborEntry>> = vec![Vec::new(); 6];
    let mut edge_slots: Vec<Vec<NeighborEntry>> = vec![Vec::new(); 12];
    let mut vertices: [Option<NeighborEntry>; 8] = [None; 8];

    let mine = &locals[me];
    let grown = mine.grow(nghost as i64);

    if nghost > 0 {
        for (r, dom) in locals.iter().enumerate() {
            if r == me || !grown.touches(dom) {
                continue;
            }

            let mut rel = [0i32; 3];
            for d in 0..3 {
                if dom[d].last() <= mine[d].first() {
                    rel[d] = -1;
                } else if dom[d].first() >= mine[d].last() {
                    rel[d] = 1;
                }
            }

            let send = mine.intersect(&dom.grow(nghost as i64));
            let recv = grown.intersect(dom);
            debug_assert!(!send.is_empty() && !recv.is_empty());
            let entry = NeighborEntry {
                rank: r,
                send: PackRange::from_global(&send, mine, nghost),
                recv: PackRange::from_global(&recv, mine, nghost),
            };

            match rel.iter().filter(|&&s| s != 0).count() {
                1 => face_slots[face_slot(rel)].push(entry),
                2 => edge_slots[edge_slot(rel)].push(entry),
                3 => {
                    let v = vertex_slot(rel);
                    debug_assert!(vertices[v].is_none(), "two ranks on one corner");
                    vertices[v] = Some(entry);
                }
                // Disjoint owned domains cannot overlap on every axis.
                _ => unreachable!("partner with zero offset"),
            }
        }
    }

    (
        NeighborTable::from_slots(face_slots),
        NeighborTable::from_slots(edge_slots),
        vertices,
    )
}

/// Face slot for a one-axis offset: `2*axis` for the low side, `2*axis + 1`
/// for the high side.
fn face_slot(rel: [i32; 3]) -> usize {
    let d = (0..3).find(|&d| rel[d] != 0).expect("face offset");
    2 * d + usize::from(rel[d] > 0)
}

/// Edge slot for a two-axis offset: 4 sign combinations per edge-parallel
/// axis, signs taken in ascending axis order.
fn edge_slot(rel: [i32; 3]) -> usize {
    let c = (0..3).find(|&d| rel[d] == 0).expect("edge axis");
    let (a, b) = match c {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    4 * c + usize::from(rel[a] > 0) + 2 * usize::from(rel[b] > 0)
}

/// Vertex slot for a three-axis offset: sign bits in axis order.
fn vertex_slot(rel: [i32; 3]) -> usize {
    usize::from(rel[0] > 0) | (usize::from(rel[1] > 0) << 1) | (usize::from(rel[2] > 0) << 2)
}
