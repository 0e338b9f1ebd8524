//! Worker identity, the `get_job` steal policy, `execute`/`finish`, and the
//! run loop for spawned worker threads. Worker 0 never runs
//! [`WorkerThread::spawn`] — it runs the same `get_job`/`execute` step
//! directly inside [`crate::scheduler::JobSystem::wait`].

use crate::context::SharedContext;
use crate::handle::JobHandle;
use crate::thread_names;
use crate::trace::EventKind;
use crate::{log_info, MAX_WORKERS};
use rand::Rng;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The handle every job function receives. Binds a worker index to the
/// shared context so job functions can `create`/`create_child`/`submit`
/// more work from their own arena and deque.
pub struct WorkerContext {
    pub(crate) index: usize,
    pub(crate) shared: Arc<SharedContext>,
}

impl WorkerContext {
    pub(crate) fn new(index: usize, shared: Arc<SharedContext>) -> Self {
        Self { index, shared }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn slot(&self) -> &crate::context::WorkerSlot {
        &self.shared.workers[self.index]
    }
}

/// Tries to find a job for `worker` to run: first its own deque, then a
/// single random steal attempt against another worker. Never attempts more
/// than one steal per call, so callers (the worker loop, `wait`) remain
/// responsive to shutdown/completion checks.
pub fn get_job(worker: &WorkerContext) -> Option<JobHandle> {
    if let Some(job) = worker.slot().deque.pop() {
        return Some(job);
    }

    let n_workers = worker.shared.n_workers();
    if n_workers <= 1 {
        return None;
    }

    let victim = rand::thread_rng().gen_range(0..n_workers);
    if victim == worker.index {
        return None;
    }

    worker.shared.workers[victim].deque.steal()
}

/// Runs `job` to completion: optional `BEGIN` trace, the host function
/// itself, optional `END` trace, then `finish`.
pub fn execute(worker: &mut WorkerContext, job: JobHandle) {
    let (function_id, payload_ptr, payload_len) = {
        let record = worker.shared.workers[job.worker_index()]
            .arena
            .get(job.arena_index());
        (
            record.function_id,
            record.payload.as_ptr(),
            record.payload_len as usize,
        )
    };

    if let Some(trace) = &worker.slot().trace {
        trace.push(function_id, EventKind::Begin);
    }

    let entry = worker.shared.function(function_id);
    // SAFETY: the payload buffer lives inside the job record, which is not
    // freed or reallocated for the duration of this call (it is only ever
    // reset in bulk between phases, never individually).
    let payload = unsafe { std::slice::from_raw_parts(payload_ptr, payload_len) };
    (entry.func)(worker, job, payload);

    if let Some(trace) = &worker.shared.workers[worker.index].trace {
        trace.push(function_id, EventKind::End);
    }

    finish(&worker.shared, job);
}

/// Decrements `job.unfinished`; if it reaches zero, iterates up the parent
/// chain doing the same (bounding stack depth, unlike the spec's
/// recursive presentation — see design notes).
pub fn finish(shared: &SharedContext, job: JobHandle) {
    let mut current = job;
    loop {
        let record = shared.workers[current.worker_index()]
            .arena
            .get(current.arena_index());
        let previous = record.unfinished.fetch_sub(1, Ordering::SeqCst);

        if previous != 1 {
            return;
        }

        let parent = record.parent;
        if parent.is_none() {
            return;
        }
        current = parent;
    }
}

/// A spawned worker thread (workers 1..N-1). Worker 0 is the calling
/// thread and never gets one of these.
pub struct WorkerThread {
    thread: Option<JoinHandle<()>>,
}

impl WorkerThread {
    pub fn spawn(index: usize, shared: Arc<SharedContext>) -> Self {
        let thread = thread::Builder::new()
            .name(format!("Worker Thread {}", index))
            .spawn(move || run(index, shared))
            .expect("failed to spawn worker thread");

        Self {
            thread: Some(thread),
        }
    }

    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run(index: usize, shared: Arc<SharedContext>) {
    thread_names::set_thread_name(thread::current().id(), format!("Worker Thread {}", index));
    log_info!("worker {} started", index);

    let mut worker = WorkerContext::new(index, shared);

    loop {
        if worker.shared.shutdown.load(Ordering::SeqCst) {
            break;
        }

        match get_job(&worker) {
            Some(job) => execute(&mut worker, job),
            None => thread::yield_now(),
        }
    }

    log_info!("worker {} shutting down", index);
}

/// Allocates a root job (no parent) from `worker`'s own arena.
pub fn create(worker: &WorkerContext, function_id: u16) -> JobHandle {
    let (index, record) = worker.slot().arena.allocate();
    record.init_root(function_id);
    JobHandle::encode(worker.index, index)
}

/// Allocates a child job from `worker`'s own arena, incrementing `parent`'s
/// unfinished count first so the parent cannot finish before this child is
/// accounted for.
pub fn create_child(worker: &WorkerContext, parent: JobHandle, function_id: u16) -> JobHandle {
    debug_assert!(!parent.is_none());
    let parent_record = worker.shared.workers[parent.worker_index()]
        .arena
        .get(parent.arena_index());
    parent_record.unfinished.fetch_add(1, Ordering::SeqCst);

    let (index, record) = worker.slot().arena.allocate();
    record.init_child(function_id, parent);
    JobHandle::encode(worker.index, index)
}

/// Copies `data` into the job's inline payload and pushes it onto `worker`'s
/// own deque.
pub fn submit(worker: &WorkerContext, handle: JobHandle, data: &[u8]) {
    debug_assert_eq!(
        handle.worker_index(),
        worker.index,
        "a job may only be submitted by the worker that created it"
    );
    let record = worker.slot().arena.get_mut(handle.arena_index());
    record.set_payload(data);
    worker.slot().deque.push(handle);
}

pub(crate) fn assert_valid_worker_count(n_workers: usize) {
    assert!(
        (1..=MAX_WORKERS).contains(&n_workers),
        "worker count must be between 1 and {}, got {}",
        MAX_WORKERS,
        n_workers
    );
}
