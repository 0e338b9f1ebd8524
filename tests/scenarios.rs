//! End-to-end scenarios S1-S6 from the design documentation, run against a
//! real multi-threaded `JobSystem`.

use jobsys::{JobHandle, JobSystem, SchedulerConfig, WorkerContext};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const FN_NOOP: u16 = 0;
const FN_ROOT: u16 = 1;
const FN_SPIN: u16 = 2;

fn root_fn(_worker: &mut WorkerContext, _job: JobHandle, _payload: &[u8]) {}

static S1_COUNT: AtomicU64 = AtomicU64::new(0);
fn s1_noop(_worker: &mut WorkerContext, _job: JobHandle, _payload: &[u8]) {
    S1_COUNT.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn s1_fan_out() {
    S1_COUNT.store(0, Ordering::SeqCst);
    let mut system =
        JobSystem::startup(SchedulerConfig::new(4), vec![(s1_noop, "noop"), (root_fn, "root")]);

    let root = system.create(FN_NOOP);
    for _ in 0..128 {
        let child = system.create_child(root, FN_NOOP);
        system.submit(child, &[]);
    }
    system.submit(root, &[]);
    system.wait(root);

    assert_eq!(S1_COUNT.load(Ordering::SeqCst), 129);
    system.shutdown();
}

static S2_COUNT: AtomicU64 = AtomicU64::new(0);
const S2_SPLIT_PAYLOAD_LEN: usize = std::mem::size_of::<u32>();

fn s2_split(worker: &mut WorkerContext, job: JobHandle, payload: &[u8]) {
    S2_COUNT.fetch_add(1, Ordering::SeqCst);

    let mut buf = [0u8; S2_SPLIT_PAYLOAD_LEN];
    buf.copy_from_slice(payload);
    let n = u32::from_ne_bytes(buf);

    if n <= 1 {
        return;
    }

    let half = n / 2;
    let left = jobsys::worker::create_child(worker, job, FN_SPIN);
    jobsys::worker::submit(worker, left, &half.to_ne_bytes());
    let right = jobsys::worker::create_child(worker, job, FN_SPIN);
    jobsys::worker::submit(worker, right, &half.to_ne_bytes());
}

#[test]
fn s2_recursive_subdivision() {
    S2_COUNT.store(0, Ordering::SeqCst);
    let mut system = JobSystem::startup(
        SchedulerConfig::new(4),
        vec![(s1_noop, "noop"), (root_fn, "root"), (s2_split, "split")],
    );

    let root = system.create(FN_SPIN);
    system.submit(root, &64u32.to_ne_bytes());
    system.wait(root);

    assert_eq!(S2_COUNT.load(Ordering::SeqCst), 127);
    system.shutdown();
}

static S3_COUNT: AtomicU64 = AtomicU64::new(0);
fn s3_noop(_worker: &mut WorkerContext, _job: JobHandle, _payload: &[u8]) {
    S3_COUNT.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn s3_main_thread_participation() {
    S3_COUNT.store(0, Ordering::SeqCst);
    let mut system =
        JobSystem::startup(SchedulerConfig::new(1), vec![(s3_noop, "noop"), (root_fn, "root")]);

    let root = system.create(FN_ROOT);
    for _ in 0..1000 {
        let child = system.create_child(root, FN_NOOP);
        system.submit(child, &[]);
    }
    system.submit(root, &[]);
    system.wait(root);

    assert_eq!(S3_COUNT.load(Ordering::SeqCst), 1000);
    system.shutdown();
}

static S4_PER_WORKER: [AtomicU64; 4] = [
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
];

fn s4_spin(worker: &mut WorkerContext, _job: JobHandle, _payload: &[u8]) {
    S4_PER_WORKER[worker.index()].fetch_add(1, Ordering::SeqCst);
    let start = std::time::Instant::now();
    while start.elapsed() < std::time::Duration::from_micros(100) {
        std::hint::spin_loop();
    }
}

#[test]
fn s4_steal_distributes_work() {
    for c in &S4_PER_WORKER {
        c.store(0, Ordering::SeqCst);
    }
    let mut system =
        JobSystem::startup(SchedulerConfig::new(4), vec![(s4_spin, "spin"), (root_fn, "root")]);

    let root = system.create(0);
    for _ in 0..1024 {
        let child = system.create_child(root, 0);
        system.submit(child, &[]);
    }
    system.submit(root, &[]);
    system.wait(root);

    let counts: Vec<u64> = S4_PER_WORKER.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    let total: u64 = counts.iter().sum();
    assert_eq!(total, 1025);

    let min = *counts.iter().min().unwrap();
    let max = *counts.iter().max().unwrap();
    assert!(min > 0, "every worker should execute at least one job: {:?}", counts);
    assert!(
        max as f64 / min as f64 < 10.0,
        "imbalance ratio too high: {:?}",
        counts
    );

    system.shutdown();
}

static S5_COUNT: AtomicUsize = AtomicUsize::new(0);
fn s5_noop(_worker: &mut WorkerContext, _job: JobHandle, _payload: &[u8]) {
    S5_COUNT.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn s5_reset_between_phases() {
    let mut system =
        JobSystem::startup(SchedulerConfig::new(4), vec![(s5_noop, "noop"), (root_fn, "root")]);

    for _ in 0..2 {
        S5_COUNT.store(0, Ordering::SeqCst);
        let root = system.create(0);
        for _ in 0..128 {
            let child = system.create_child(root, 0);
            system.submit(child, &[]);
        }
        system.submit(root, &[]);
        system.wait(root);
        assert_eq!(S5_COUNT.load(Ordering::SeqCst), 129);
        system.reset();
    }

    system.shutdown();
}

#[test]
fn s6_trace_output_well_formed() {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("jobsys-s6-{:?}.json", std::thread::current().id()));

    let mut system = JobSystem::startup(
        SchedulerConfig::new(4).with_tracing(true),
        vec![(s1_noop, "noop"), (root_fn, "root")],
    );

    let root = system.create(FN_ROOT);
    for _ in 0..128 {
        let child = system.create_child(root, FN_NOOP);
        system.submit(child, &[]);
    }
    system.submit(root, &[]);
    system.wait(root);

    system.dump_trace(&path).expect("trace file should be writable");

    let contents = std::fs::read_to_string(&path).expect("trace file should exist");
    let parsed: serde_json::Value =
        serde_json::from_str(&contents).expect("trace file should be valid JSON");

    let events = parsed["traceEvents"].as_array().expect("traceEvents should be an array");
    let begins = events.iter().filter(|e| e["ph"] == "B").count();
    let ends = events.iter().filter(|e| e["ph"] == "E").count();
    assert_eq!(begins, 129);
    assert_eq!(ends, 129);

    let _ = std::fs::remove_file(&path);
    system.shutdown();
}
