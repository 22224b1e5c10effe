//! Cluster-wide reductions built from the point-to-point primitives.
//!
//! Rather than requiring a native collective from every backend, the
//! all-reduce gathers partial values to rank 0, combines them with the
//! requested associative operator and broadcasts the result. Payloads are a
//! single `Pod` element; callers draw the tag from the reduction family via
//! [`Communicator::next_tag`].

use bytemuck::Pod;

use super::communicator::{Communicator, Wait};
use super::tags::{REDUCE_TAG, REDUCE_TAG_CYCLE};
use super::wire::{cast_slice, cast_slice_from};
use crate::error::PargridError;

/// Associative operator applied by [`all_reduce`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
    Prod,
}

/// Scalars that can travel through the reduction.
pub trait ReduceElem: Pod + Copy + PartialOrd + Send {
    /// Identity of `Sum`.
    fn zero() -> Self;
    /// Identity of `Prod`.
    fn one() -> Self;
    /// Identity of the given operator; `Min`/`Max` use the type's extreme
    /// values so empty local ranges reduce correctly.
    fn identity(op: ReduceOp) -> Self;
    fn add(a: Self, b: Self) -> Self;
    fn mul(a: Self, b: Self) -> Self;
}

macro_rules! impl_reduce_elem {
    ($($t:ty => ($min_id:expr, $max_id:expr)),* $(,)?) => {$(
        impl ReduceElem for $t {
            #[inline]
            fn zero() -> Self { 0 as $t }
            #[inline]
            fn one() -> Self { 1 as $t }
            #[inline]
            fn identity(op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => 0 as $t,
                    ReduceOp::Prod => 1 as $t,
                    ReduceOp::Min => $min_id,
                    ReduceOp::Max => $max_id,
                }
            }
            #[inline]
            fn add(a: Self, b: Self) -> Self { a + b }
            #[inline]
            fn mul(a: Self, b: Self) -> Self { a * b }
        }
    )*};
}

impl_reduce_elem!(
    f32 => (f32::INFINITY, f32::NEG_INFINITY),
    f64 => (f64::INFINITY, f64::NEG_INFINITY),
    i32 => (i32::MAX, i32::MIN),
    i64 => (i64::MAX, i64::MIN),
    u32 => (u32::MAX, u32::MIN),
    u64 => (u64::MAX, u64::MIN),
);

/// Combine two values under `op`.
#[inline]
pub fn combine<T: ReduceElem>(op: ReduceOp, a: T, b: T) -> T {
    match op {
        ReduceOp::Sum => T::add(a, b),
        ReduceOp::Prod => T::mul(a, b),
        ReduceOp::Min => {
            if b < a {
                b
            } else {
                a
            }
        }
        ReduceOp::Max => {
            if b > a {
                b
            } else {
                a
            }
        }
    }
}

/// Reduce `value` across all ranks; every rank returns the same result.
///
/// All ranks must call this collectively with the same `op`. The tag is
/// drawn from the reduction family, so interleaved reductions on the same
/// communicator stay matched as long as call order agrees across ranks.
pub fn all_reduce<T, C>(comm: &C, value: T, op: ReduceOp) -> Result<T, PargridError>
where
    T: ReduceElem,
    C: Communicator,
{
    let size = comm.size();
    if size == 1 {
        return Ok(value);
    }
    let tag = comm.next_tag(REDUCE_TAG, REDUCE_TAG_CYCLE);
    let bytes = std::mem::size_of::<T>();

    if comm.rank() == 0 {
        let mut acc = value;
        for peer in 1..size {
            let mut buf = vec![0u8; bytes];
            let h = comm.irecv(peer, tag, &mut buf);
            let raw = h.wait().ok_or_else(|| PargridError::Comm {
                peer,
                reason: "reduction receive returned no data".into(),
            })?;
            if raw.len() != bytes {
                return Err(PargridError::PayloadSizeMismatch {
                    peer,
                    expected: bytes,
                    got: raw.len(),
                });
            }
            let part: &[T] = cast_slice_from(&raw);
            acc = combine(op, acc, part[0]);
        }
        let out = [acc];
        let mut pending = Vec::with_capacity(size - 1);
        for peer in 1..size {
            pending.push(comm.isend(peer, tag, cast_slice(&out)));
        }
        for s in pending {
            let _ = s.wait();
        }
        Ok(acc)
    } else {
        let part = [value];
        let s = comm.isend(0, tag, cast_slice(&part));
        let mut buf = vec![0u8; bytes];
        let h = comm.irecv(0, tag, &mut buf);
        let raw = h.wait().ok_or_else(|| PargridError::Comm {
            peer: 0,
            reason: "reduction broadcast returned no data".into(),
        })?;
        let _ = s.wait();
        if raw.len() != bytes {
            return Err(PargridError::PayloadSizeMismatch {
                peer: 0,
                expected: bytes,
                got: raw.len(),
            });
        }
        let result: &[T] = cast_slice_from(&raw);
        Ok(result[0])
    }
}
