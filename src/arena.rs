//! Per-worker job arena: a fixed-size bump allocator.
//!
//! Only the owning worker calls [`Arena::allocate`]; any thread may resolve
//! an already-published handle back to a `&Job` via [`Arena::get`], because
//! arena storage is allocated once at startup and never reallocated or
//! moved, and job fields other than `unfinished` are write-once-before-publish.

use crate::job::Job;
use crate::POOL_SIZE;
use std::cell::UnsafeCell;

pub struct Arena {
    records: Box<[UnsafeCell<Job>]>,
    next: UnsafeCell<usize>,
}

// SAFETY: `records` is only ever mutated (via `&mut Job`) by the owning
// worker thread through `allocate`; other threads only take `&Job`, which
// is sound once the corresponding handle has been published (see module
// docs). `next` is likewise only touched by the owner.
unsafe impl Sync for Arena {}

impl Arena {
    pub fn new() -> Self {
        let mut records = Vec::with_capacity(POOL_SIZE);
        records.resize_with(POOL_SIZE, || UnsafeCell::new(Job::default()));

        Self {
            records: records.into_boxed_slice(),
            next: UnsafeCell::new(0),
        }
    }

    /// Allocates the next slot and returns its index plus a mutable
    /// reference for the caller to initialize. Called only by the owning
    /// worker.
    ///
    /// # Panics
    /// Panics if the arena is exhausted (`POOL_SIZE` jobs already allocated
    /// since the last `reset`) — arena overflow is a programming error.
    #[allow(clippy::mut_from_ref)]
    pub fn allocate(&self) -> (usize, &mut Job) {
        // SAFETY: only the owning worker calls `allocate`, so this is the
        // only thread ever writing `next`.
        let next = unsafe { &mut *self.next.get() };
        assert!(
            *next < POOL_SIZE,
            "job arena exhausted: more than {} jobs allocated in this phase",
            POOL_SIZE
        );

        let index = *next;
        *next += 1;

        // SAFETY: `index` was just reserved and is owned exclusively by us
        // until we hand its handle to another thread.
        let job = unsafe { &mut *self.records[index].get() };
        (index, job)
    }

    /// Resolves an arena index to a shared reference. Safe from any thread
    /// once the corresponding handle has been published.
    pub fn get(&self, index: usize) -> &Job {
        debug_assert!(index < POOL_SIZE);
        // SAFETY: see module/struct docs.
        unsafe { &*self.records[index].get() }
    }

    /// Resolves an arena index to a mutable reference. Callers must be the
    /// owning worker and must call this only before the job's handle has
    /// been published to another thread (e.g. during `submit`, after
    /// `allocate` and before the corresponding `deque.push`).
    #[allow(clippy::mut_from_ref)]
    pub fn get_mut(&self, index: usize) -> &mut Job {
        debug_assert!(index < POOL_SIZE);
        // SAFETY: see method docs; enforced by caller discipline, not the
        // type system, matching the rest of this bump allocator.
        unsafe { &mut *self.records[index].get() }
    }

    /// Zeroes the bump pointer. Job records themselves are left untouched
    /// (callers re-initialize on each `create`), matching the original
    /// implementation's `reset` contract.
    pub fn reset(&self) {
        // SAFETY: `reset` is only called from worker 0 with all deques
        // empty, i.e. no other thread can be concurrently allocating.
        unsafe {
            *self.next.get() = 0;
        }
    }

    pub fn len(&self) -> usize {
        // SAFETY: read-only snapshot; racy with concurrent allocation is
        // acceptable for diagnostics/tests, which only call this when quiesced.
        unsafe { *self.next.get() }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
