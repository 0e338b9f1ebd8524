//! Property-based tests over randomized fork/join trees, covering the
//! quantified invariants: every job runs exactly once, `wait` is complete,
//! and no pushed handle is lost or duplicated.

use jobsys::handle::JobHandle;
use jobsys::{JobSystem, SchedulerConfig, WorkerContext, MAX_WORKERS, POOL_SIZE};
use proptest::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

static RUN_COUNT: AtomicU64 = AtomicU64::new(0);

fn counting_noop(_worker: &mut WorkerContext, _job: JobHandle, _payload: &[u8]) {
    RUN_COUNT.fetch_add(1, Ordering::SeqCst);
}

fn noop_root(_worker: &mut WorkerContext, _job: JobHandle, _payload: &[u8]) {}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// For any worker count and fan-out width, every submitted child runs
    /// exactly once and `wait` does not return until all of them have.
    #[test]
    fn fan_out_runs_each_child_exactly_once(n_workers in 1usize..=8, n_children in 0usize..300) {
        RUN_COUNT.store(0, Ordering::SeqCst);

        let mut system = JobSystem::startup(
            SchedulerConfig::new(n_workers),
            vec![(counting_noop, "noop"), (noop_root, "root")],
        );

        let root = system.create(0);
        for _ in 0..n_children {
            let child = system.create_child(root, 0);
            system.submit(child, &[]);
        }
        system.submit(root, &[]);
        system.wait(root);

        prop_assert_eq!(RUN_COUNT.load(Ordering::SeqCst), n_children as u64 + 1);
        system.shutdown();
    }

    /// Handle encode/decode round-trips for every worker index and arena
    /// index in range (invariant 6).
    #[test]
    fn handle_round_trips(worker_idx in 0usize..MAX_WORKERS, arena_idx in 0usize..POOL_SIZE) {
        let handle = JobHandle::encode(worker_idx, arena_idx);
        prop_assert_eq!(handle.worker_index(), worker_idx);
        prop_assert_eq!(handle.arena_index(), arena_idx);
        prop_assert!(!handle.is_none());
    }

    /// Recursive binary subdivision: for any starting depth the total node
    /// count of the resulting tree matches the closed-form `2^(depth+1) - 1`,
    /// and `wait` only returns once every node's `unfinished` has reached
    /// zero.
    #[test]
    fn recursive_split_produces_expected_node_count(depth in 0u32..8) {
        static COUNT: AtomicU64 = AtomicU64::new(0);
        COUNT.store(0, Ordering::SeqCst);

        fn split(worker: &mut WorkerContext, job: JobHandle, payload: &[u8]) {
            COUNT.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 4];
            buf.copy_from_slice(payload);
            let remaining = u32::from_ne_bytes(buf);
            if remaining == 0 {
                return;
            }
            let next = (remaining - 1).to_ne_bytes();
            let left = jobsys::worker::create_child(worker, job, 0);
            jobsys::worker::submit(worker, left, &next);
            let right = jobsys::worker::create_child(worker, job, 0);
            jobsys::worker::submit(worker, right, &next);
        }

        let mut system = JobSystem::startup(SchedulerConfig::new(4), vec![(split, "split")]);

        let root = system.create(0);
        system.submit(root, &depth.to_ne_bytes());
        system.wait(root);

        let expected_nodes = (1u64 << (depth + 1)) - 1;
        prop_assert_eq!(COUNT.load(Ordering::SeqCst), expected_nodes);

        system.shutdown();
    }
}
