//! `ParticleAttrib`: one per-particle data element.
//!
//! An attribute is a grow-only linear array of `T` with a logical length
//! shared by every attribute of the same particle base. Creation grows with
//! 2x reallocation; destruction compacts valid entries through a scratch
//! array; pack/unpack are the transport primitives for migration between
//! ranks.

use std::any::Any;

use crate::comm::{all_reduce, Communicator, ReduceElem, ReduceOp};
use crate::error::PargridError;
use crate::kernel::{parallel_for, parallel_reduce, SharedSlice};

/// Element types storable in a particle attribute.
pub trait ParticleScalar: Copy + Default + Send + Sync + 'static {}
impl<T: Copy + Default + Send + Sync + 'static> ParticleScalar for T {}

/// A single particle attribute of element type `T`.
///
/// `size()` is the logical particle count; the backing storage only grows.
/// New entries created by [`create`](Self::create) are uninitialized except
/// for the ID attribute, which the particle base fills.
#[derive(Clone, Debug, Default)]
pub struct ParticleAttrib<T> {
    data: Vec<T>,
    count: usize,
    temp: Vec<T>,
}

impl<T: ParticleScalar> ParticleAttrib<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            count: 0,
            temp: Vec::new(),
        }
    }

    /// Logical particle count.
    #[inline]
    pub fn size(&self) -> usize {
        self.count
    }

    /// Allocated capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Entries `[0, size)`.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.count]
    }

    /// Mutable entries `[0, size)`.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data[..self.count]
    }

    #[inline]
    pub fn get(&self, i: usize) -> T {
        self.data[i]
    }

    #[inline]
    pub fn set(&mut self, i: usize, v: T) {
        self.data[i] = v;
    }

    /// Grow the logical size by `n`, reallocating to at least
    /// `2*(size + n)` when the capacity is insufficient.
    pub fn create(&mut self, n: usize) -> Result<(), PargridError> {
        let new_count = self
            .count
            .checked_add(n)
            .ok_or(PargridError::CountOverflow {
                count: self.count,
                requested: n,
            })?;
        if self.data.len() < new_count {
            self.data.resize(new_count * 2, T::default());
        }
        self.count = new_count;
        Ok(())
    }

    /// Compact the valid entries.
    ///
    /// Entry `i` with `!invalid[i]` moves to position `new_index[i]` in a
    /// scratch array, which is then copied back; afterwards the logical
    /// size is `local_n`. `invalid` and `new_index` cover
    /// `local_n + destroy_n` entries and `new_index` must be injective on
    /// the valid ones.
    pub fn destroy(
        &mut self,
        invalid: &[bool],
        new_index: &[usize],
        local_n: usize,
        destroy_n: usize,
    ) -> Result<(), PargridError> {
        let total = local_n + destroy_n;
        if total > self.count || invalid.len() < total || new_index.len() < total {
            return Err(PargridError::InvalidDestroyCounts {
                local: local_n,
                destroyed: destroy_n,
                size: self.count,
            });
        }
        if self.temp.len() < local_n {
            self.temp.resize(local_n, T::default());
        }

        let data = &self.data;
        let scratch = SharedSlice::new(&mut self.temp);
        parallel_for(total, |i| {
            if !invalid[i] {
                unsafe { scratch.write(new_index[i], data[i]) };
            }
        });

        let temp = &self.temp;
        let dst = SharedSlice::new(&mut self.data);
        parallel_for(local_n, |i| unsafe { dst.write(i, temp[i]) });

        self.count = local_n;
        Ok(())
    }

    /// Alternative compaction: swap each `delete_index[i]` with
    /// `keep_index[i]`, then drop `destroy_n` entries off the end.
    ///
    /// The two index lists must be pairwise disjoint.
    pub fn sort(
        &mut self,
        delete_index: &[usize],
        keep_index: &[usize],
        max_delete: usize,
        destroy_n: usize,
    ) -> Result<(), PargridError> {
        if destroy_n > self.count || max_delete > delete_index.len() || max_delete > keep_index.len()
        {
            return Err(PargridError::InvalidDestroyCounts {
                local: self.count,
                destroyed: destroy_n,
                size: self.count,
            });
        }
        let shared = SharedSlice::new(&mut self.data);
        parallel_for(max_delete, |i| {
            let (d, k) = (delete_index[i], keep_index[i]);
            unsafe {
                let tmp = shared.read(d);
                shared.write(d, shared.read(k));
                shared.write(k, tmp);
            }
        });
        self.count -= destroy_n;
        Ok(())
    }

    /// Gather entries indexed by `hash` into a contiguous prefix of `dst`.
    ///
    /// `dst`'s storage grows as needed; its logical size is managed by the
    /// caller (the migration driver).
    pub fn pack(&self, dst: &mut ParticleAttrib<T>, hash: &[usize]) {
        if dst.data.len() < hash.len() {
            dst.data.resize(hash.len(), T::default());
        }
        let src = &self.data;
        let out = SharedSlice::new(&mut dst.data);
        parallel_for(hash.len(), |i| unsafe { out.write(i, src[hash[i]]) });
    }

    /// Append the first `nrecvs` entries of `src`, growing to at least
    /// `2*(size + nrecvs)` when needed.
    pub fn unpack(&mut self, src: &ParticleAttrib<T>, nrecvs: usize) -> Result<(), PargridError> {
        let new_count = self
            .count
            .checked_add(nrecvs)
            .ok_or(PargridError::CountOverflow {
                count: self.count,
                requested: nrecvs,
            })?;
        if self.data.len() < new_count {
            self.data.resize(new_count * 2, T::default());
        }
        let base = self.count;
        let incoming = &src.data;
        let out = SharedSlice::new(&mut self.data);
        parallel_for(nrecvs, |i| unsafe { out.write(base + i, incoming[i]) });
        self.count = new_count;
        Ok(())
    }

    /// Set every entry in `[0, size)` to `v`.
    pub fn assign(&mut self, v: T) {
        let shared = SharedSlice::new(&mut self.data[..self.count]);
        parallel_for(self.count, |i| unsafe { shared.write(i, v) });
    }

    /// Evaluate `f` per particle over `[0, size)`.
    pub fn assign_fn<F>(&mut self, f: F)
    where
        F: Fn(usize) -> T + Send + Sync,
    {
        let shared = SharedSlice::new(&mut self.data[..self.count]);
        parallel_for(self.count, |i| unsafe { shared.write(i, f(i)) });
    }

    fn reduce<C: Communicator>(&self, comm: &C, op: ReduceOp) -> Result<T, PargridError>
    where
        T: ReduceElem,
    {
        let slice = &self.data[..self.count];
        let local = parallel_reduce(
            self.count,
            T::identity(op),
            |i| slice[i],
            |a, b| crate::comm::reduce::combine(op, a, b),
        );
        all_reduce(comm, local, op)
    }
}

impl<T: ParticleScalar + ReduceElem> ParticleAttrib<T> {
    /// Cluster-wide sum over all particles.
    pub fn sum<C: Communicator>(&self, comm: &C) -> Result<T, PargridError> {
        self.reduce(comm, ReduceOp::Sum)
    }

    /// Cluster-wide minimum over all particles.
    pub fn min<C: Communicator>(&self, comm: &C) -> Result<T, PargridError> {
        self.reduce(comm, ReduceOp::Min)
    }

    /// Cluster-wide maximum over all particles.
    pub fn max<C: Communicator>(&self, comm: &C) -> Result<T, PargridError> {
        self.reduce(comm, ReduceOp::Max)
    }

    /// Cluster-wide product over all particles.
    pub fn prod<C: Communicator>(&self, comm: &C) -> Result<T, PargridError> {
        self.reduce(comm, ReduceOp::Prod)
    }
}

/// Object-safe attribute surface used by the particle base to drive every
/// attribute uniformly.
pub trait ParticleAttribBase: Send {
    fn size(&self) -> usize;
    fn create(&mut self, n: usize) -> Result<(), PargridError>;
    fn destroy(
        &mut self,
        invalid: &[bool],
        new_index: &[usize],
        local_n: usize,
        destroy_n: usize,
    ) -> Result<(), PargridError>;
    fn sort(
        &mut self,
        delete_index: &[usize],
        keep_index: &[usize],
        max_delete: usize,
        destroy_n: usize,
    ) -> Result<(), PargridError>;
    /// Pack into another attribute of the same element type.
    fn pack_into(
        &self,
        dst: &mut dyn ParticleAttribBase,
        hash: &[usize],
    ) -> Result<(), PargridError>;
    /// Append from another attribute of the same element type.
    fn unpack_from(
        &mut self,
        src: &dyn ParticleAttribBase,
        nrecvs: usize,
    ) -> Result<(), PargridError>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: ParticleScalar> ParticleAttribBase for ParticleAttrib<T> {
    fn size(&self) -> usize {
        self.size()
    }

    fn create(&mut self, n: usize) -> Result<(), PargridError> {
        ParticleAttrib::create(self, n)
    }

    fn destroy(
        &mut self,
        invalid: &[bool],
        new_index: &[usize],
        local_n: usize,
        destroy_n: usize,
    ) -> Result<(), PargridError> {
        ParticleAttrib::destroy(self, invalid, new_index, local_n, destroy_n)
    }

    fn sort(
        &mut self,
        delete_index: &[usize],
        keep_index: &[usize],
        max_delete: usize,
        destroy_n: usize,
    ) -> Result<(), PargridError> {
        ParticleAttrib::sort(self, delete_index, keep_index, max_delete, destroy_n)
    }

    fn pack_into(
        &self,
        dst: &mut dyn ParticleAttribBase,
        hash: &[usize],
    ) -> Result<(), PargridError> {
        let dst = dst
            .as_any_mut()
            .downcast_mut::<ParticleAttrib<T>>()
            .ok_or(PargridError::AttributeTypeMismatch(0))?;
        self.pack(dst, hash);
        Ok(())
    }

    fn unpack_from(
        &mut self,
        src: &dyn ParticleAttribBase,
        nrecvs: usize,
    ) -> Result<(), PargridError> {
        let src = src
            .as_any()
            .downcast_ref::<ParticleAttrib<T>>()
            .ok_or(PargridError::AttributeTypeMismatch(0))?;
        self.unpack(src, nrecvs)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::NoComm;

    #[test]
    fn create_grows_with_double_reallocation() {
        let mut a = ParticleAttrib::<f64>::new();
        a.create(3).unwrap();
        assert_eq!(a.size(), 3);
        assert_eq!(a.capacity(), 6);
        a.create(2).unwrap();
        assert_eq!(a.size(), 5);
        assert_eq!(a.capacity(), 6, "no reallocation while capacity lasts");
        a.create(4).unwrap();
        assert_eq!(a.size(), 9);
        assert_eq!(a.capacity(), 18);
    }

    #[test]
    fn destroy_compacts_valid_entries() {
        let mut a = ParticleAttrib::<i64>::new();
        a.create(5).unwrap();
        for i in 0..5 {
            a.set(i, 10 + i as i64);
        }
        // Kill entries 1 and 3.
        let invalid = [false, true, false, true, false];
        let new_index = [0, 0, 1, 0, 2];
        a.destroy(&invalid, &new_index, 3, 2).unwrap();
        assert_eq!(a.size(), 3);
        assert_eq!(a.as_slice(), &[10, 12, 14]);
    }

    #[test]
    fn destroy_rejects_inconsistent_counts() {
        let mut a = ParticleAttrib::<i64>::new();
        a.create(2).unwrap();
        let err = a.destroy(&[false, true], &[0, 0], 3, 2);
        assert!(matches!(err, Err(PargridError::InvalidDestroyCounts { .. })));
    }

    #[test]
    fn sort_swaps_then_shrinks() {
        let mut a = ParticleAttrib::<i64>::new();
        a.create(4).unwrap();
        for i in 0..4 {
            a.set(i, i as i64);
        }
        // Swap dead entry 0 with live tail entry 3, then drop one.
        a.sort(&[0], &[3], 1, 1).unwrap();
        assert_eq!(a.size(), 3);
        assert_eq!(a.as_slice(), &[3, 1, 2]);
    }

    #[test]
    fn pack_unpack_appends_selected_entries() {
        let mut src = ParticleAttrib::<f64>::new();
        src.create(4).unwrap();
        for i in 0..4 {
            src.set(i, i as f64);
        }
        let mut staged = ParticleAttrib::<f64>::new();
        src.pack(&mut staged, &[3, 1]);

        let mut dst = ParticleAttrib::<f64>::new();
        dst.create(1).unwrap();
        dst.set(0, 9.0);
        dst.unpack(&staged, 2).unwrap();
        assert_eq!(dst.size(), 3);
        assert_eq!(dst.as_slice(), &[9.0, 3.0, 1.0]);
    }

    #[test]
    fn dyn_pack_checks_element_type() {
        let mut a = ParticleAttrib::<f64>::new();
        a.create(1).unwrap();
        let mut b = ParticleAttrib::<i64>::new();
        let err = ParticleAttribBase::pack_into(&a, &mut b, &[0]);
        assert!(matches!(err, Err(PargridError::AttributeTypeMismatch(_))));
    }

    #[test]
    fn assign_covers_logical_range_only() {
        let mut a = ParticleAttrib::<f64>::new();
        a.create(2).unwrap();
        a.assign(5.0);
        assert_eq!(a.as_slice(), &[5.0, 5.0]);
        // Capacity beyond the logical size stays untouched.
        assert_eq!(a.capacity(), 4);
        assert_eq!(a.data[2], 0.0);
    }

    #[test]
    fn reductions_over_local_particles() {
        let comm = NoComm::default();
        let mut a = ParticleAttrib::<f64>::new();
        a.create(4).unwrap();
        a.assign_fn(|i| (i + 1) as f64);
        assert_eq!(a.sum(&comm).unwrap(), 10.0);
        assert_eq!(a.min(&comm).unwrap(), 1.0);
        assert_eq!(a.max(&comm).unwrap(), 4.0);
        assert_eq!(a.prod(&comm).unwrap(), 24.0);
    }
}
