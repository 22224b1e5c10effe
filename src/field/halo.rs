//! The ghost / halo cells of a grid field.
//!
//! Two complementary exchange modes over the layout's precomputed tables:
//!
//! - **fill** (`InternalToHalo`, combine by assign): overwrite halo cells
//!   with the remote owners' interior values.
//! - **accumulate** (`HaloToInternal`, combine by plus-assign): send halo
//!   contents outward and add them into the remote owners' interiors.
//!
//! Each operation runs three phases in order, faces then edges then
//! vertices, each with a fresh tag from its own family. Within a phase all
//! sends are posted, then every receive is completed and unpacked, then the
//! pending sends are waited. Physical-boundary slots are skipped in both
//! directions.

use tracing::debug;

use crate::comm::buffer::{recv_intent, send_intent, HaloPhase};
use crate::comm::wire;
use crate::comm::{Communicator, HaloCommTags, Wait};
use crate::error::PargridError;
use crate::kernel::{parallel_for_box, SharedSlice};
use crate::layout::{FieldLayout, NeighborEntry, PackRange};

use super::view::View3;
use super::GridScalar;

/// Which side of the owned/halo boundary a send reads from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SendOrder {
    InternalToHalo,
    HaloToInternal,
}

/// Combine rule applied when unpacking a received payload.
pub trait CombineOp<T>: Send + Sync {
    fn apply(local: &mut T, incoming: T);
}

/// Overwrite-local combine, used by fill.
pub struct Assign;

impl<T> CombineOp<T> for Assign {
    #[inline]
    fn apply(local: &mut T, incoming: T) {
        *local = incoming;
    }
}

/// Additive combine, used by accumulate.
pub struct PlusAssign;

impl<T: std::ops::AddAssign> CombineOp<T> for PlusAssign {
    #[inline]
    fn apply(local: &mut T, incoming: T) {
        *local += incoming;
    }
}

/// Rank-local linear pack/unpack scratch, reallocated on demand to the
/// largest region seen so far.
#[derive(Clone, Debug, Default)]
pub struct FieldBufferData<T> {
    buffer: Vec<T>,
}

impl<T: Copy + Default> FieldBufferData<T> {
    /// Grow to hold at least `n` elements; never shrinks.
    fn ensure(&mut self, n: usize) {
        if self.buffer.len() < n {
            self.buffer.resize(n, T::default());
        }
    }
}

/// Halo exchange engine for one field.
///
/// Holds the pack scratch and the field's tag families. Distinct fields
/// exchanging concurrently must use distinct [`HaloCommTags`] bases.
#[derive(Clone, Debug, Default)]
pub struct HaloCells<T> {
    fd: FieldBufferData<T>,
    tags: HaloCommTags,
}

impl<T: GridScalar> HaloCells<T> {
    /// Engine with the default halo tag families.
    pub fn new() -> Self {
        Self::with_tags(HaloCommTags::default())
    }

    /// Engine with caller-chosen tag families.
    pub fn with_tags(tags: HaloCommTags) -> Self {
        Self {
            fd: FieldBufferData::default(),
            tags,
        }
    }

    /// Overwrite halo cells with the remote owners' interior values.
    pub fn fill<C: Communicator>(
        &mut self,
        view: &mut View3<T>,
        layout: &FieldLayout,
        comm: &C,
    ) -> Result<(), PargridError> {
        self.exchange::<Assign, C>(view, layout, comm, SendOrder::InternalToHalo)
    }

    /// Send halo contents outward and add them into the remote owners'
    /// interiors. Halo cells keep their last values until the next fill.
    pub fn accumulate<C: Communicator>(
        &mut self,
        view: &mut View3<T>,
        layout: &FieldLayout,
        comm: &C,
    ) -> Result<(), PargridError>
    where
        T: std::ops::AddAssign,
    {
        self.exchange::<PlusAssign, C>(view, layout, comm, SendOrder::HaloToInternal)
    }

    fn exchange<Op: CombineOp<T>, C: Communicator>(
        &mut self,
        view: &mut View3<T>,
        layout: &FieldLayout,
        comm: &C,
        order: SendOrder,
    ) -> Result<(), PargridError> {
        for phase in [HaloPhase::Face, HaloPhase::Edge, HaloPhase::Vertex] {
            self.exchange_phase::<Op, C>(phase, view, layout, comm, order)?;
        }
        Ok(())
    }

    /// One phase: post all sends, complete and unpack all receives, then
    /// wait out the pending sends.
    fn exchange_phase<Op: CombineOp<T>, C: Communicator>(
        &mut self,
        phase: HaloPhase,
        view: &mut View3<T>,
        layout: &FieldLayout,
        comm: &C,
        order: SendOrder,
    ) -> Result<(), PargridError> {
        let entries = phase_entries(layout, phase);
        let base = match phase {
            HaloPhase::Face => self.tags.face,
            HaloPhase::Edge => self.tags.edge,
            HaloPhase::Vertex => self.tags.vertex,
        };
        let tag = comm.next_tag(base.as_u16(), self.tags.cycle);
        if entries.is_empty() {
            return Ok(());
        }
        debug!(?phase, ?order, tag, partners = entries.len(), "halo exchange phase");

        let elem = std::mem::size_of::<T>();
        let mut pending = Vec::with_capacity(entries.len());

        for &(slot, idx, ref e) in &entries {
            let range = match order {
                SendOrder::InternalToHalo => e.send,
                SendOrder::HaloToInternal => e.recv,
            };
            let nsends = range.size();
            self.fd.ensure(nsends);
            pack(&range, view, &mut self.fd.buffer[..nsends]);

            let intent = send_intent(phase, slot, idx);
            let bytes = nsends * elem;
            let mut buf = comm.buffers().checkout(intent, bytes);
            buf[..bytes].copy_from_slice(wire::cast_slice(&self.fd.buffer[..nsends]));
            pending.push(comm.isend(e.rank, tag, &buf[..bytes]));
            comm.buffers().checkin(intent, buf);
        }

        for &(slot, idx, ref e) in &entries {
            let range = match order {
                SendOrder::InternalToHalo => e.recv,
                SendOrder::HaloToInternal => e.send,
            };
            let nrecvs = range.size();
            let bytes = nrecvs * elem;

            let intent = recv_intent(phase, slot, idx);
            let mut buf = comm.buffers().checkout(intent, bytes);
            let h = comm.irecv(e.rank, tag, &mut buf[..bytes]);
            let raw = h.wait().ok_or_else(|| PargridError::Comm {
                peer: e.rank,
                reason: "halo receive returned no data".into(),
            })?;
            if raw.len() != bytes {
                return Err(PargridError::PayloadSizeMismatch {
                    peer: e.rank,
                    expected: bytes,
                    got: raw.len(),
                });
            }
            buf[..bytes].copy_from_slice(&raw);
            unpack::<Op, T>(&range, view, wire::cast_slice_from(&buf[..bytes]));
            comm.buffers().checkin(intent, buf);
        }

        for s in pending {
            let _ = s.wait();
        }
        Ok(())
    }
}

/// Flatten one phase's neighbor entries as (slot, partner-index, entry).
fn phase_entries(layout: &FieldLayout, phase: HaloPhase) -> Vec<(usize, usize, NeighborEntry)> {
    let mut out = Vec::new();
    match phase {
        HaloPhase::Face | HaloPhase::Edge => {
            let table = if phase == HaloPhase::Face {
                layout.face_neighbors()
            } else {
                layout.edge_neighbors()
            };
            for slot in 0..table.slots() {
                for (idx, e) in table.slot(slot).iter().enumerate() {
                    out.push((slot, idx, *e));
                }
            }
        }
        HaloPhase::Vertex => {
            for (slot, e) in layout.vertex_neighbors().iter().enumerate() {
                // None marks a physical boundary corner.
                if let Some(e) = e {
                    out.push((slot, 0, *e));
                }
            }
        }
    }
    out
}

/// Linearize the sub-view `[lo, hi)` into `out`, row-major with x fastest.
fn pack<T: GridScalar>(range: &PackRange, view: &View3<T>, out: &mut [T]) {
    let e = range.extents();
    debug_assert_eq!(out.len(), range.size());
    let lo = range.lo;
    let shared = SharedSlice::new(out);
    parallel_for_box(e, |i, j, k| {
        let l = i + j * e[0] + k * e[0] * e[1];
        let v = *view.at(lo[0] + i, lo[1] + j, lo[2] + k);
        unsafe { shared.write(l, v) };
    });
}

/// Combine `data` into the sub-view `[lo, hi)` under `Op`.
fn unpack<Op: CombineOp<T>, T: GridScalar>(range: &PackRange, view: &mut View3<T>, data: &[T]) {
    let e = range.extents();
    debug_assert_eq!(data.len(), range.size());
    let lo = range.lo;
    let ext = view.extents();
    let shared = SharedSlice::new(view.as_mut_slice());
    parallel_for_box(e, |i, j, k| {
        let l = i + j * e[0] + k * e[0] * e[1];
        let off = (lo[0] + i) + ext[0] * ((lo[1] + j) + ext[1] * (lo[2] + k));
        // Distinct (i, j, k) map to distinct offsets.
        Op::apply(unsafe { shared.get_mut(off) }, data[l]);
    });
}
