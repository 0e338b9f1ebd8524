//! The shared context: the array of per-worker resources and the
//! host-supplied job-function lookup table. Read-only after `startup`
//! except for each slot's own arena/deque/trace ring, which are touched
//! per the ownership rules described in their own modules.

use crate::arena::Arena;
use crate::deque::Deque;
use crate::trace::TraceRing;
use crate::worker::WorkerContext;
use std::sync::atomic::AtomicBool;

/// One job function registered by the host: a function pointer plus its
/// display name (used only for tracing).
#[derive(Copy, Clone)]
pub struct FunctionEntry {
    pub func: JobFunction,
    pub name: &'static str,
}

/// The ABI every job function implements: the executing worker's context,
/// the handle of the job being run, and a view of its inline payload.
pub type JobFunction = fn(&mut WorkerContext, crate::handle::JobHandle, &[u8]);

/// Per-worker resources shared across the whole scheduler: the worker's own
/// arena and deque (mutated per the rules in `arena`/`deque`), and its
/// optional trace ring.
pub struct WorkerSlot {
    pub arena: Arena,
    pub deque: Deque,
    pub trace: Option<TraceRing>,
}

impl WorkerSlot {
    fn new(tracing_enabled: bool) -> Self {
        Self {
            arena: Arena::new(),
            deque: Deque::new(),
            trace: tracing_enabled.then(TraceRing::new),
        }
    }
}

pub struct SharedContext {
    pub workers: Vec<WorkerSlot>,
    pub functions: Vec<FunctionEntry>,
    pub shutdown: AtomicBool,
}

impl SharedContext {
    pub fn new(n_workers: usize, tracing_enabled: bool, functions: Vec<FunctionEntry>) -> Self {
        let workers = (0..n_workers)
            .map(|_| WorkerSlot::new(tracing_enabled))
            .collect();

        Self {
            workers,
            functions,
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn n_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn function(&self, function_id: u16) -> FunctionEntry {
        self.functions[function_id as usize]
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name).collect()
    }
}
