//! Runs the fan-out scenario from the command line: one root job with
//! `--children` leaf jobs under it, optionally writing a Chrome Trace-Event
//! file of the run.

use clap::Parser;
use jobsys::{JobHandle, JobSystem, SchedulerConfig, WorkerContext};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Parser)]
#[command(about = "Fans a root job out into N leaf jobs and waits for them")]
struct Args {
    /// Worker threads (including the calling thread).
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// Number of leaf jobs to fan out under the root.
    #[arg(short, long, default_value_t = 128)]
    children: usize,

    /// Optional path to write a Chrome Trace-Event JSON file to.
    #[arg(short, long)]
    trace: Option<String>,
}

static LEAF_COUNT: AtomicU64 = AtomicU64::new(0);

const FN_NOOP: u16 = 0;
const FN_ROOT: u16 = 1;

fn noop(_worker: &mut WorkerContext, _job: JobHandle, _payload: &[u8]) {
    LEAF_COUNT.fetch_add(1, Ordering::SeqCst);
}

fn root(_worker: &mut WorkerContext, _job: JobHandle, _payload: &[u8]) {}

fn main() {
    jobsys::logging::register_sink(jobsys::logging::StdoutSink::new());

    let args = Args::parse();

    let config = SchedulerConfig::new(args.workers).with_tracing(args.trace.is_some());
    let mut system = JobSystem::startup(config, vec![(noop, "noop"), (root, "root")]);

    let job_root = system.create(FN_ROOT);
    for _ in 0..args.children {
        let child = system.create_child(job_root, FN_NOOP);
        system.submit(child, &[]);
    }
    system.submit(job_root, &[]);
    system.wait(job_root);

    println!(
        "ran {} leaf jobs across {} workers",
        LEAF_COUNT.load(Ordering::SeqCst),
        args.workers
    );

    if let Some(path) = &args.trace {
        system
            .dump_trace(path)
            .unwrap_or_else(|e| eprintln!("failed to write trace file {}: {}", path, e));
    }

    system.shutdown();
}
