//! The public scheduler API: `startup`, `shutdown`, `reset`, `create`,
//! `create_child`, `submit`, `wait`, `dump_trace`, and the `join`
//! convenience.

use crate::context::{FunctionEntry, JobFunction, SharedContext};
use crate::handle::JobHandle;
use crate::log_info;
use crate::thread_names;
use crate::trace::{build_trace_file, TraceEvent};
use crate::worker::{self, WorkerContext, WorkerThread};
use std::io::Write;
use std::mem::MaybeUninit;
use std::path::Path;
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Instant;

/// Configuration for [`JobSystem::startup`].
pub struct SchedulerConfig {
    pub n_workers: usize,
    pub tracing: bool,
}

impl SchedulerConfig {
    pub fn new(n_workers: usize) -> Self {
        Self {
            n_workers,
            tracing: false,
        }
    }

    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }
}

impl Default for SchedulerConfig {
    /// One worker per logical CPU, tracing off, capped at `MAX_WORKERS`.
    fn default() -> Self {
        let n_workers = num_cpus::get().clamp(1, crate::MAX_WORKERS);
        Self::new(n_workers)
    }
}

fn noop_root(_worker: &mut WorkerContext, _job: JobHandle, _payload: &[u8]) {}

fn run_boxed_closure(_worker: &mut WorkerContext, _job: JobHandle, payload: &[u8]) {
    let mut buf = [0u8; std::mem::size_of::<usize>()];
    buf.copy_from_slice(&payload[..std::mem::size_of::<usize>()]);
    let ptr = usize::from_ne_bytes(buf) as *mut Box<dyn FnOnce() + Send>;
    // SAFETY: `ptr` was produced by `JobSystem::submit_closure`, which
    // leaks exactly one `Box<Box<dyn FnOnce() + Send>>` per call; this is
    // the one place that reclaims and runs it.
    let boxed: Box<Box<dyn FnOnce() + Send>> = unsafe { Box::from_raw(ptr) };
    (*boxed)();
}

/// A running scheduler instance. Owns the calling thread's worker-0 context
/// plus the spawned worker threads; all of the public API other than the
/// free functions in [`crate::worker`] (used by job functions, which run on
/// arbitrary workers) is exposed here, from worker 0's point of view.
pub struct JobSystem {
    shared: Arc<SharedContext>,
    threads: Vec<WorkerThread>,
    worker0: WorkerContext,
    owner_thread: ThreadId,
    process_start: Instant,
    join_root_fn_id: u16,
    closure_runner_fn_id: u16,
}

impl JobSystem {
    /// Starts the scheduler: allocates all arenas/deques/trace rings,
    /// spawns workers `1..n_workers`, and returns worker 0's context bound
    /// into this handle. `functions` is the host's closed universe of job
    /// functions; two internal entries used by [`JobSystem::join`] are
    /// appended after it.
    pub fn startup(config: SchedulerConfig, functions: Vec<(JobFunction, &'static str)>) -> Self {
        worker::assert_valid_worker_count(config.n_workers);

        let join_root_fn_id = functions.len() as u16;
        let closure_runner_fn_id = join_root_fn_id + 1;

        let mut table: Vec<FunctionEntry> = functions
            .into_iter()
            .map(|(func, name)| FunctionEntry { func, name })
            .collect();
        table.push(FunctionEntry {
            func: noop_root,
            name: "<join-root>",
        });
        table.push(FunctionEntry {
            func: run_boxed_closure,
            name: "<closure>",
        });

        log_info!("starting job system with {} workers", config.n_workers);

        let shared = Arc::new(SharedContext::new(config.n_workers, config.tracing, table));

        let owner_thread = thread::current().id();
        thread_names::set_thread_name(owner_thread, "Worker Thread 0".to_string());

        let threads = (1..config.n_workers)
            .map(|i| WorkerThread::spawn(i, shared.clone()))
            .collect();

        let worker0 = WorkerContext::new(0, shared.clone());

        Self {
            shared,
            threads,
            worker0,
            owner_thread,
            process_start: Instant::now(),
            join_root_fn_id,
            closure_runner_fn_id,
        }
    }

    fn assert_owner_thread(&self) {
        assert_eq!(
            thread::current().id(),
            self.owner_thread,
            "this operation may only be called from worker 0 (the thread that called startup)"
        );
    }

    pub fn worker0(&self) -> &WorkerContext {
        &self.worker0
    }

    /// Creates a root job (no parent) bound to `function_id`.
    pub fn create(&self, function_id: u16) -> JobHandle {
        self.assert_owner_thread();
        worker::create(&self.worker0, function_id)
    }

    /// Creates a child job of `parent`, bound to `function_id`.
    pub fn create_child(&self, parent: JobHandle, function_id: u16) -> JobHandle {
        self.assert_owner_thread();
        worker::create_child(&self.worker0, parent, function_id)
    }

    /// Copies `data` into the job's payload and pushes it onto worker 0's
    /// deque.
    pub fn submit(&self, handle: JobHandle, data: &[u8]) {
        self.assert_owner_thread();
        worker::submit(&self.worker0, handle, data);
    }

    /// Blocks the calling thread (worker 0) until `handle` and every
    /// descendant has finished, participating in execution meanwhile.
    pub fn wait(&mut self, handle: JobHandle) {
        self.assert_owner_thread();
        loop {
            let record = self.shared.workers[handle.worker_index()]
                .arena
                .get(handle.arena_index());
            if record.is_finished() {
                return;
            }

            match worker::get_job(&self.worker0) {
                Some(job) => worker::execute(&mut self.worker0, job),
                None => thread::yield_now(),
            }
        }
    }

    /// Zeroes every arena's bump pointer, starting a new phase. Asserts
    /// that all deques are empty, i.e. the previous phase has fully
    /// drained (normally guaranteed by having just returned from `wait`
    /// on that phase's root).
    pub fn reset(&mut self) {
        self.assert_owner_thread();
        for (i, slot) in self.shared.workers.iter().enumerate() {
            assert!(
                slot.deque.is_empty(),
                "reset called with worker {}'s deque non-empty",
                i
            );
            slot.arena.reset();
            if let Some(trace) = &slot.trace {
                trace.reset();
            }
        }
    }

    /// Signals every spawned worker to exit its loop and joins them.
    /// Undefined behavior (well, at least an incomplete phase) if jobs are
    /// still in flight.
    pub fn shutdown(mut self) {
        self.assert_owner_thread();
        log_info!("shutting down job system");
        self.shared.shutdown.store(true, Ordering::SeqCst);
        for thread in self.threads.drain(..) {
            thread.join();
        }
    }

    /// Runs `f1` and `f2` as sibling jobs under a synthetic root and waits
    /// for both, returning their results. Pure sugar over
    /// `create`/`create_child`/`submit`/`wait` — not a new scheduling
    /// primitive.
    pub fn join<F1, F2, R1, R2>(&mut self, f1: F1, f2: F2) -> (R1, R2)
    where
        F1: FnOnce() -> R1 + Send,
        F2: FnOnce() -> R2 + Send,
        R1: Send,
        R2: Send,
    {
        let mut left_result: MaybeUninit<R1> = MaybeUninit::uninit();
        let mut right_result: MaybeUninit<R2> = MaybeUninit::uninit();

        let left_ptr: *mut MaybeUninit<R1> = &mut left_result;
        let right_ptr: *mut MaybeUninit<R2> = &mut right_result;

        // SAFETY: `wait` below does not return until both closures have
        // run (they are reachable only through jobs parented to `root`),
        // so these raw pointers do not outlive the stack frames they
        // point into.
        let left_box: Box<dyn FnOnce() + Send> = Box::new(move || unsafe {
            (*left_ptr).write(f1());
        });
        let right_box: Box<dyn FnOnce() + Send> = Box::new(move || unsafe {
            (*right_ptr).write(f2());
        });

        let root = self.create(self.join_root_fn_id);
        let left = self.create_child(root, self.closure_runner_fn_id);
        self.submit_closure(left, left_box);
        let right = self.create_child(root, self.closure_runner_fn_id);
        self.submit_closure(right, right_box);
        self.submit(root, &[]);
        self.wait(root);

        // SAFETY: both jobs ran to completion before `wait` returned.
        unsafe { (left_result.assume_init(), right_result.assume_init()) }
    }

    fn submit_closure(&self, handle: JobHandle, closure: Box<dyn FnOnce() + Send>) {
        let ptr: *mut Box<dyn FnOnce() + Send> = Box::into_raw(Box::new(closure));
        let bytes = (ptr as usize).to_ne_bytes();
        self.submit(handle, &bytes);
    }

    /// Serializes every worker's trace ring into a Chrome Trace-Event JSON
    /// file. Call only after the phase has quiesced (e.g. right after
    /// `wait` on the phase's root returns).
    pub fn dump_trace(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        self.assert_owner_thread();

        let rings: Vec<(usize, Vec<TraceEvent>)> = self
            .shared
            .workers
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.trace.as_ref().map(|t| (i, t.snapshot())))
            .collect();

        let names = self.shared.function_names();
        let file = build_trace_file(&rings, &names, self.process_start, process::id());

        let json = serde_json::to_string_pretty(&file)?;
        let mut out = std::fs::File::create(path)?;
        out.write_all(json.as_bytes())
    }
}
