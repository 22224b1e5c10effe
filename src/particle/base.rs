//! `ParticleBase`: the attribute container with stable global IDs.

use std::marker::PhantomData;

use tracing::debug;

use crate::comm::{all_reduce, Communicator, ReduceOp};
use crate::error::PargridError;
use crate::kernel::{parallel_for, SharedSlice};
use crate::mesh::Vec3;

use super::attrib::{ParticleAttrib, ParticleAttribBase, ParticleScalar};

/// Typed handle to an attribute registered with [`ParticleBase`].
pub struct AttribHandle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for AttribHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for AttribHandle<T> {}

/// Growable particle container.
///
/// Owns an ordered list of attributes; the first two are always `R`
/// (position) and `ID`. All attributes share one logical particle count.
/// Rank `r` of an `n`-rank cluster issues IDs `r, r+n, r+2n, …`, which stay
/// unique across the cluster without any communication.
pub struct ParticleBase {
    attributes: Vec<Box<dyn ParticleAttribBase>>,
    local_num: usize,
    next_id: i64,
    num_nodes: usize,
    rank: usize,
}

const R_INDEX: usize = 0;
const ID_INDEX: usize = 1;

impl ParticleBase {
    /// Empty container bound to the communicator's rank and size.
    pub fn new<C: Communicator>(comm: &C) -> Self {
        Self::with_rank(comm.rank(), comm.size())
    }

    /// Empty container for an explicit `(rank, size)` pair.
    pub fn with_rank(rank: usize, size: usize) -> Self {
        Self {
            attributes: vec![
                Box::new(ParticleAttrib::<Vec3>::new()),
                Box::new(ParticleAttrib::<i64>::new()),
            ],
            local_num: 0,
            next_id: rank as i64,
            num_nodes: size,
            rank,
        }
    }

    /// Logical particle count on this rank.
    #[inline]
    pub fn local_num(&self) -> usize {
        self.local_num
    }

    /// Number of registered attributes, `R` and `ID` included.
    #[inline]
    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    /// Cluster-wide particle count.
    pub fn global_num<C: Communicator>(&self, comm: &C) -> Result<u64, PargridError> {
        all_reduce(comm, self.local_num as u64, ReduceOp::Sum)
    }

    /// The position attribute.
    pub fn positions(&self) -> &ParticleAttrib<Vec3> {
        self.attributes[R_INDEX]
            .as_any()
            .downcast_ref()
            .expect("R attribute has fixed type")
    }

    pub fn positions_mut(&mut self) -> &mut ParticleAttrib<Vec3> {
        self.attributes[R_INDEX]
            .as_any_mut()
            .downcast_mut()
            .expect("R attribute has fixed type")
    }

    /// The ID attribute.
    pub fn ids(&self) -> &ParticleAttrib<i64> {
        self.attributes[ID_INDEX]
            .as_any()
            .downcast_ref()
            .expect("ID attribute has fixed type")
    }

    fn ids_mut(&mut self) -> &mut ParticleAttrib<i64> {
        self.attributes[ID_INDEX]
            .as_any_mut()
            .downcast_mut()
            .expect("ID attribute has fixed type")
    }

    /// Register a user attribute, growing it to the current particle count.
    pub fn add_attribute<T: ParticleScalar>(
        &mut self,
        mut attrib: ParticleAttrib<T>,
    ) -> Result<AttribHandle<T>, PargridError> {
        debug_assert!(attrib.size() <= self.local_num);
        if attrib.size() < self.local_num {
            attrib.create(self.local_num - attrib.size())?;
        }
        self.attributes.push(Box::new(attrib));
        Ok(AttribHandle {
            index: self.attributes.len() - 1,
            _marker: PhantomData,
        })
    }

    /// Typed access to a registered attribute.
    pub fn attrib<T: ParticleScalar>(
        &self,
        handle: AttribHandle<T>,
    ) -> Result<&ParticleAttrib<T>, PargridError> {
        self.attributes
            .get(handle.index)
            .ok_or(PargridError::UnknownAttribute(handle.index))?
            .as_any()
            .downcast_ref()
            .ok_or(PargridError::AttributeTypeMismatch(handle.index))
    }

    /// Typed mutable access to a registered attribute.
    pub fn attrib_mut<T: ParticleScalar>(
        &mut self,
        handle: AttribHandle<T>,
    ) -> Result<&mut ParticleAttrib<T>, PargridError> {
        self.attributes
            .get_mut(handle.index)
            .ok_or(PargridError::UnknownAttribute(handle.index))?
            .as_any_mut()
            .downcast_mut()
            .ok_or(PargridError::AttributeTypeMismatch(handle.index))
    }

    /// Create `n_local` particles, growing every attribute and assigning
    /// new IDs with the cluster stride.
    pub fn create(&mut self, n_local: usize) -> Result<(), PargridError> {
        if n_local == 0 {
            return Ok(());
        }
        let stride = self.num_nodes as i64;
        let last_slot = (self.local_num + n_local - 1) as i64;
        // Highest ID issued by this call; fails before any attribute grows.
        self.next_id
            .checked_add(last_slot.checked_mul(stride).ok_or(
                PargridError::IdOverflow {
                    next_id: self.next_id,
                    stride: self.num_nodes,
                    requested: n_local,
                },
            )?)
            .ok_or(PargridError::IdOverflow {
                next_id: self.next_id,
                stride: self.num_nodes,
                requested: n_local,
            })?;

        for attrib in &mut self.attributes {
            attrib.create(n_local)?;
        }

        let base = self.local_num;
        let next_id = self.next_id;
        let ids = self.ids_mut();
        let slots = SharedSlice::new(&mut ids.as_mut_slice()[base..base + n_local]);
        parallel_for(n_local, |i| {
            let slot = (base + i) as i64;
            unsafe { slots.write(i, next_id + stride * slot) };
        });

        self.next_id += stride * n_local as i64;
        self.local_num += n_local;
        debug!(n_local, local_num = self.local_num, "created particles");
        Ok(())
    }

    /// Create one particle with exactly the given ID, regardless of the
    /// strided scheme.
    pub fn create_with_id(&mut self, id: i64) -> Result<(), PargridError> {
        let saved = (self.next_id, self.num_nodes);
        self.next_id = id;
        self.num_nodes = 0;
        let result = self.create(1);
        self.next_id = saved.0;
        self.num_nodes = saved.1;
        result
    }

    /// Create `n_total` particles across the cluster, as evenly as
    /// possible with the remainder spread over the lowest ranks.
    pub fn global_create(&mut self, n_total: usize) -> Result<(), PargridError> {
        let mut n_local = n_total / self.num_nodes;
        if self.rank < n_total % self.num_nodes {
            n_local += 1;
        }
        self.create(n_local)
    }

    /// Destroy the particles flagged in `invalid`, compacting every
    /// attribute. `invalid` covers exactly the current local count.
    pub fn destroy(&mut self, invalid: &[bool]) -> Result<(), PargridError> {
        if invalid.len() != self.local_num {
            return Err(PargridError::InvalidDestroyCounts {
                local: self.local_num,
                destroyed: 0,
                size: invalid.len(),
            });
        }
        let destroy_n = invalid.iter().filter(|&&x| x).count();
        if destroy_n == 0 {
            return Ok(());
        }
        let local_n = self.local_num - destroy_n;

        // Exclusive prefix sum over the valid entries gives the compacted
        // slot of each survivor.
        let mut new_index = vec![0usize; self.local_num];
        let mut next = 0usize;
        for (i, &dead) in invalid.iter().enumerate() {
            new_index[i] = next;
            if !dead {
                next += 1;
            }
        }

        for attrib in &mut self.attributes {
            attrib.destroy(invalid, &new_index, local_n, destroy_n)?;
        }
        self.local_num = local_n;
        debug!(destroy_n, local_num = self.local_num, "destroyed particles");
        Ok(())
    }

    /// Pack the entries selected by `hash` from every attribute into the
    /// matching attribute of `dst` (a staging container for migration).
    pub fn pack_all(&self, dst: &mut ParticleBase, hash: &[usize]) -> Result<(), PargridError> {
        debug_assert_eq!(self.attributes.len(), dst.attributes.len());
        for (src, dst) in self.attributes.iter().zip(&mut dst.attributes) {
            src.pack_into(dst.as_mut(), hash)?;
        }
        Ok(())
    }

    /// Append `nrecvs` staged entries from every attribute of `src` and
    /// advance the particle count.
    pub fn unpack_all(&mut self, src: &ParticleBase, nrecvs: usize) -> Result<(), PargridError> {
        debug_assert_eq!(self.attributes.len(), src.attributes.len());
        for (dst, src) in self.attributes.iter_mut().zip(&src.attributes) {
            dst.unpack_from(src.as_ref(), nrecvs)?;
        }
        self.local_num += nrecvs;
        debug!(nrecvs, local_num = self.local_num, "unpacked particles");
        Ok(())
    }
}
