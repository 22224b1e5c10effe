//! Communication abstraction for rank-per-thread and inter-process (MPI)
//! message passing.
//!
//! Wire conventions: payloads are contiguous `bytemuck::Pod` arrays with no
//! header; matching send/receive pairs agree on length through the layout's
//! precomputed ranges. Receivers never truncate: the halo engine sizes its
//! pooled buffers from the ranges before posting the receive and treats any
//! length mismatch as fatal.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};

use super::buffer::BufferPool;
use super::tags::TagAllocator;

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Non-blocking communication interface (minimal by design).
///
/// Implementors provide asynchronous send/receive over raw bytes, rank and
/// size queries, a per-rank monotone tag allocator and the rank-local
/// buffer pool. There is no hidden global state beyond the handle itself.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Rank of this process (0..size-1).
    fn rank(&self) -> usize;
    /// Total number of ranks.
    fn size(&self) -> usize;

    /// Next tag in the `(base, cycle)` family; monotone per rank.
    fn next_tag(&self, base: u16, cycle: u16) -> u16;

    /// Rank-local pooled communication buffers.
    fn buffers(&self) -> &BufferPool;

    /// Synchronization barrier (default: no-op for serial comms).
    fn barrier(&self) {}
}

/// Compile-time no-op comm for pure serial runs and unit tests.
#[derive(Debug, Default)]
pub struct NoComm {
    tags: TagAllocator,
    pool: BufferPool,
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}

    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn next_tag(&self, base: u16, cycle: u16) -> u16 {
        self.tags.next(base, cycle)
    }

    fn buffers(&self) -> &BufferPool {
        &self.pool
    }
}

// --- ThreadComm: rank-per-thread within one process ---

type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Slot {
    q: VecDeque<Vec<u8>>,
}

/// Shared mailbox of one thread universe.
///
/// Owned by the universe rather than a process-global static so that
/// concurrently running universes (e.g. parallel tests) cannot cross-talk.
#[derive(Default)]
struct Mailbox {
    map: Mutex<HashMap<Key, Arc<(Mutex<Slot>, Condvar)>>>,
}

impl Mailbox {
    fn entry(&self, key: Key) -> Arc<(Mutex<Slot>, Condvar)> {
        let mut g = self.map.lock().expect("mailbox poisoned");
        g.entry(key).or_default().clone()
    }
}

pub struct LocalSendHandle;

impl Wait for LocalSendHandle {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

pub struct LocalRecvHandle {
    cell: Arc<(Mutex<Slot>, Condvar)>,
}

impl Wait for LocalRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let (lock, cv) = &*self.cell;
        let mut slot = lock.lock().expect("mailbox slot poisoned");
        while slot.q.is_empty() {
            slot = cv.wait(slot).expect("mailbox condvar poisoned");
        }
        Some(slot.q.pop_front().expect("queue non-empty"))
    }
}

/// Rank-per-thread communicator over an in-process mailbox.
///
/// [`ThreadComm::universe`] creates one instance per rank; each instance is
/// moved into its rank's thread. Sends are buffered and complete
/// immediately; receives block in [`Wait::wait`] until the matching message
/// arrives. Messages with the same `(src, dst, tag)` key are delivered in
/// FIFO order.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
    tags: TagAllocator,
    pool: BufferPool,
    barrier: Arc<std::sync::Barrier>,
}

impl ThreadComm {
    /// Create a universe of `size` connected rank communicators.
    pub fn universe(size: usize) -> Vec<ThreadComm> {
        let mailbox = Arc::new(Mailbox::default());
        let barrier = Arc::new(std::sync::Barrier::new(size));
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
                tags: TagAllocator::default(),
                pool: BufferPool::default(),
                barrier: Arc::clone(&barrier),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    type SendHandle = LocalSendHandle;
    type RecvHandle = LocalRecvHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let entry = self.mailbox.entry((self.rank, peer, tag));
        let (lock, cv) = &*entry;
        {
            let mut slot = lock.lock().expect("mailbox slot poisoned");
            slot.q.push_back(buf.to_vec());
        }
        cv.notify_all();
        LocalSendHandle
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {
        LocalRecvHandle {
            cell: self.mailbox.entry((peer, self.rank, tag)),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn next_tag(&self, base: u16, cycle: u16) -> u16 {
        self.tags.next(base, cycle)
    }

    fn buffers(&self) -> &BufferPool {
        &self.pool
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}

// --- MPI backend ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use core::ptr::NonNull;
    use mpi::collective::CommunicatorCollectives;
    use mpi::environment::Universe;
    use mpi::point_to_point::{Destination, Source};
    use mpi::request::{Request, StaticScope};
    use mpi::topology::{Communicator as _, SimpleCommunicator};
    use tracing::warn;

    /// Heap staging for one in-flight payload.
    ///
    /// rsmpi's `StaticScope` requests want `'static` slices, so every
    /// payload is copied onto the heap and leaked while its request is in
    /// flight, then reclaimed on completion. The intent-keyed pool in
    /// front of this backend amortizes the extra copy, and the halo
    /// engine's phase discipline guarantees a handle is waited before the
    /// same intent goes out again.
    struct Staged {
        raw: NonNull<[u8]>,
    }

    impl Staged {
        fn copied_from(bytes: &[u8]) -> Self {
            Self::own(bytes.to_vec())
        }

        fn zeroed(len: usize) -> Self {
            Self::own(vec![0u8; len])
        }

        fn own(bytes: Vec<u8>) -> Self {
            let raw = Box::into_raw(bytes.into_boxed_slice());
            // Box::into_raw never returns null.
            Self {
                raw: unsafe { NonNull::new_unchecked(raw) },
            }
        }

        /// Slice handed to a send request.
        ///
        /// # Safety
        /// Valid only until this `Staged` is reclaimed or dropped; the
        /// caller must keep the staging alive for the request's lifetime.
        unsafe fn lease(&self) -> &'static [u8] {
            unsafe { &*self.raw.as_ptr() }
        }

        /// Mutable lease for a receive request; same contract as
        /// [`lease`](Self::lease), plus exclusive access until the
        /// request completes.
        #[allow(clippy::mut_from_ref)]
        unsafe fn lease_mut(&self) -> &'static mut [u8] {
            unsafe { &mut *self.raw.as_ptr() }
        }

        /// Take the bytes back once the request has completed.
        fn reclaim(self) -> Vec<u8> {
            let raw = self.raw.as_ptr();
            std::mem::forget(self);
            Vec::from(unsafe { Box::from_raw(raw) })
        }
    }

    impl Drop for Staged {
        fn drop(&mut self) {
            unsafe { drop(Box::from_raw(self.raw.as_ptr())) };
        }
    }

    /// A posted request paired with the staging that backs it.
    struct Inflight {
        req: Request<'static, [u8], StaticScope>,
        staged: Staged,
    }

    impl Inflight {
        /// Block until the transfer finishes, then release the staging.
        fn complete(self) -> Vec<u8> {
            let _ = self.req.wait();
            self.staged.reclaim()
        }
    }

    /// Communicator over an MPI world.
    ///
    /// One instance per process, created at cluster begin; rank and size
    /// are frozen at initialization. Transport failures abort the process
    /// group (the core's failure model), so nothing is retried here.
    pub struct MpiComm {
        _universe: Universe,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
        tags: TagAllocator,
        pool: BufferPool,
    }

    // The world handle is only touched through `&self` on the exchange
    // path; kernel threads never see it (every kernel fences before a
    // send is issued).
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl Default for MpiComm {
        fn default() -> Self {
            let universe = mpi::initialize().expect("MPI environment initialization failed");
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                _universe: universe,
                world,
                rank,
                size,
                tags: TagAllocator::default(),
                pool: BufferPool::default(),
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
            let staged = Staged::copied_from(buf);
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, unsafe { staged.lease() }, tag as i32);
            MpiSendHandle {
                inflight: Some(Inflight { req, staged }),
            }
        }

        fn irecv(&self, peer: usize, tag: u16, template: &mut [u8]) -> Self::RecvHandle {
            let len = template.len();
            let staged = Staged::zeroed(len);
            let req = self.world.process_at_rank(peer as i32).immediate_receive_into_with_tag(
                StaticScope,
                unsafe { staged.lease_mut() },
                tag as i32,
            );
            MpiRecvHandle {
                inflight: Some(Inflight { req, staged }),
                len,
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }
        fn next_tag(&self, base: u16, cycle: u16) -> u16 {
            self.tags.next(base, cycle)
        }
        fn buffers(&self) -> &BufferPool {
            &self.pool
        }
        fn barrier(&self) {
            self.world.barrier();
        }
    }

    pub struct MpiSendHandle {
        inflight: Option<Inflight>,
    }

    impl Wait for MpiSendHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(x) = self.inflight.take() {
                let _ = x.complete();
            }
            None
        }
    }

    impl Drop for MpiSendHandle {
        fn drop(&mut self) {
            if let Some(x) = self.inflight.take() {
                // A send abandoned before the phase's wait_all is a halo
                // discipline bug; finish it so the staging stays valid.
                warn!("MPI send handle dropped before wait; completing");
                let _ = x.complete();
            }
        }
    }

    pub struct MpiRecvHandle {
        inflight: Option<Inflight>,
        len: usize,
    }

    impl Wait for MpiRecvHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            let x = self.inflight.take()?;
            let mut bytes = x.complete();
            bytes.truncate(self.len);
            Some(bytes)
        }
    }

    impl Drop for MpiRecvHandle {
        fn drop(&mut self) {
            if let Some(x) = self.inflight.take() {
                warn!("MPI receive handle dropped unread; draining");
                let _ = x.complete();
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
