//! A fixed-size, fork-join work-stealing job scheduler.
//!
//! A process decomposes CPU work into many small jobs and lets a small pool
//! of workers execute them in parallel. The host registers a closed
//! universe of job functions at [`scheduler::JobSystem::startup`], creates
//! job records (optionally as children of other jobs), submits them, and
//! blocks on a job until it and all its descendants have finished. The
//! blocking (main) thread participates in execution while it waits.
//!
//! See [`scheduler::JobSystem`] for the public entry point.

pub mod arena;
pub mod context;
pub mod deque;
pub mod handle;
pub mod job;
pub mod logging;
pub mod scheduler;
pub mod thread_names;
pub mod trace;
pub mod worker;

/// Job records per worker arena, reset at the start of every phase.
pub const POOL_SIZE: usize = 4096;
/// Job-handle slots per worker deque.
pub const QUEUE_SIZE: usize = 4096;
/// Inline payload capacity, in bytes, of a single job record.
pub const DATA_SIZE: usize = 20;
/// Upper bound on worker count; fixed by the 16-bit handle's 4-bit worker
/// index field.
pub const MAX_WORKERS: usize = 16;

pub use context::JobFunction;
pub use handle::JobHandle;
pub use scheduler::{JobSystem, SchedulerConfig};
pub use worker::WorkerContext;
