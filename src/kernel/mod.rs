//! Intra-rank data-parallel kernel dispatch.
//!
//! Field and particle kernels iterate a rectangular 3D box or a 1D particle
//! range with unspecified order. Kernels must be race-free: either every
//! iteration writes a disjoint output (stencil update, gather, pack) or
//! writes go through [`AtomicAdd`] (scatter). Dispatch joins before
//! returning, so a kernel call is also its own fence.
//!
//! With the `rayon` feature (default) iterations run on the global rayon
//! pool; without it they run serially with identical semantics.

use std::marker::PhantomData;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Parallel-for over `0..n`.
pub fn parallel_for<F>(n: usize, f: F)
where
    F: Fn(usize) + Send + Sync,
{
    #[cfg(feature = "rayon")]
    (0..n).into_par_iter().for_each(f);
    #[cfg(not(feature = "rayon"))]
    (0..n).for_each(f);
}

/// Parallel-for over a 3D box `[0,ex) x [0,ey) x [0,ez)`.
///
/// The flattened iteration index is `l = i + j*ex + k*ex*ey`, matching the
/// halo wire format.
pub fn parallel_for_box<F>(extents: [usize; 3], f: F)
where
    F: Fn(usize, usize, usize) + Send + Sync,
{
    let [ex, ey, ez] = extents;
    parallel_for(ex * ey * ez, move |l| {
        let i = l % ex;
        let j = (l / ex) % ey;
        let k = l / (ex * ey);
        f(i, j, k)
    });
}

/// Parallel map-reduce over `0..n` with an associative `fold`.
pub fn parallel_reduce<T, M, F>(n: usize, identity: T, map: M, fold: F) -> T
where
    T: Copy + Send + Sync,
    M: Fn(usize) -> T + Send + Sync,
    F: Fn(T, T) -> T + Send + Sync,
{
    #[cfg(feature = "rayon")]
    {
        (0..n)
            .into_par_iter()
            .map(map)
            .reduce(|| identity, &fold)
    }
    #[cfg(not(feature = "rayon"))]
    {
        (0..n).map(map).fold(identity, fold)
    }
}

/// Element types supporting an atomic in-place add.
///
/// Floats go through a compare-exchange loop on their bit representation;
/// integers use the native fetch-add. `Vec3` adds each component
/// atomically (sufficient for concurrent deposition, where only the sums
/// matter).
pub trait AtomicAdd: Copy {
    /// Atomically `*ptr += v`.
    ///
    /// # Safety
    /// `ptr` must be valid, properly aligned for `Self`, and not accessed
    /// non-atomically by any concurrent iteration.
    unsafe fn atomic_add(ptr: *mut Self, v: Self);
}

macro_rules! impl_atomic_add_float {
    ($float:ty, $atomic:ty, $bits:ty) => {
        impl AtomicAdd for $float {
            #[inline]
            unsafe fn atomic_add(ptr: *mut Self, v: Self) {
                use std::sync::atomic::Ordering::Relaxed;
                let a = unsafe { &*(ptr as *const $atomic) };
                let mut cur: $bits = a.load(Relaxed);
                loop {
                    let new = <$float>::from_bits(cur) + v;
                    match a.compare_exchange_weak(cur, new.to_bits(), Relaxed, Relaxed) {
                        Ok(_) => return,
                        Err(seen) => cur = seen,
                    }
                }
            }
        }
    };
}

impl_atomic_add_float!(f32, std::sync::atomic::AtomicU32, u32);
impl_atomic_add_float!(f64, std::sync::atomic::AtomicU64, u64);

macro_rules! impl_atomic_add_int {
    ($int:ty, $atomic:ty) => {
        impl AtomicAdd for $int {
            #[inline]
            unsafe fn atomic_add(ptr: *mut Self, v: Self) {
                use std::sync::atomic::Ordering::Relaxed;
                let a = unsafe { &*(ptr as *const $atomic) };
                a.fetch_add(v, Relaxed);
            }
        }
    };
}

impl_atomic_add_int!(i32, std::sync::atomic::AtomicI32);
impl_atomic_add_int!(i64, std::sync::atomic::AtomicI64);
impl_atomic_add_int!(u32, std::sync::atomic::AtomicU32);
impl_atomic_add_int!(u64, std::sync::atomic::AtomicU64);

impl AtomicAdd for crate::mesh::Vec3 {
    #[inline]
    unsafe fn atomic_add(ptr: *mut Self, v: Self) {
        let base = ptr as *mut f64;
        for d in 0..3 {
            unsafe { f64::atomic_add(base.add(d), v[d]) };
        }
    }
}

/// Unsynchronized shared view of a slice for data-parallel kernels.
///
/// Wraps a raw pointer so a kernel closure can write the slice from many
/// iterations at once. Soundness is the kernel's contract: disjoint writes
/// or [`AtomicAdd`] only.
pub struct SharedSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

unsafe impl<T: Send> Send for SharedSlice<'_, T> {}
unsafe impl<T: Send> Sync for SharedSlice<'_, T> {}

impl<'a, T> SharedSlice<'a, T> {
    /// Borrow `slice` for the duration of a kernel.
    #[inline]
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read element `i`.
    ///
    /// # Safety
    /// No concurrent iteration may write `i` non-atomically.
    #[inline]
    pub unsafe fn read(&self, i: usize) -> T
    where
        T: Copy,
    {
        debug_assert!(i < self.len);
        unsafe { *self.ptr.add(i) }
    }

    /// Write element `i`.
    ///
    /// # Safety
    /// Each index must be written by at most one iteration, with no
    /// concurrent reads of it.
    #[inline]
    pub unsafe fn write(&self, i: usize, v: T) {
        debug_assert!(i < self.len);
        unsafe { *self.ptr.add(i) = v };
    }

    /// Mutable reference to element `i`.
    ///
    /// # Safety
    /// Same disjointness contract as [`write`](Self::write).
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, i: usize) -> &mut T {
        debug_assert!(i < self.len);
        unsafe { &mut *self.ptr.add(i) }
    }

    /// Atomically add `v` to element `i`; safe under any interleaving.
    #[inline]
    pub fn add(&self, i: usize, v: T)
    where
        T: AtomicAdd,
    {
        debug_assert!(i < self.len);
        unsafe { T::atomic_add(self.ptr.add(i), v) };
    }
}
