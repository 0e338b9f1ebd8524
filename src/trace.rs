//! The optional per-worker tracing ring buffer, and Chrome Trace-Event JSON
//! serialization of its contents.

use serde::Serialize;
use std::cell::UnsafeCell;
use std::time::Instant;

pub const TRACE_RING_SIZE: usize = 1024;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EventKind {
    Begin,
    End,
}

#[derive(Copy, Clone, Debug)]
pub struct TraceEvent {
    pub timestamp: Instant,
    pub function_id: u16,
    pub kind: EventKind,
}

/// A fixed-capacity ring buffer, written only by its owning worker. No
/// synchronization: `execute` on that worker is the sole writer, and
/// `dump_trace` only reads after the phase has quiesced.
pub struct TraceRing {
    events: UnsafeCell<[Option<TraceEvent>; TRACE_RING_SIZE]>,
    count: UnsafeCell<u64>,
}

// SAFETY: single-writer (the owning worker), reader only reads post-quiescence
// from worker 0 as required by `dump_trace`'s contract.
unsafe impl Sync for TraceRing {}

impl TraceRing {
    pub fn new() -> Self {
        Self {
            events: UnsafeCell::new([None; TRACE_RING_SIZE]),
            count: UnsafeCell::new(0),
        }
    }

    pub fn push(&self, function_id: u16, kind: EventKind) {
        // SAFETY: only the owning worker ever calls `push`.
        unsafe {
            let count = &mut *self.count.get();
            let slot = (*count as usize) % TRACE_RING_SIZE;
            (*self.events.get())[slot] = Some(TraceEvent {
                timestamp: Instant::now(),
                function_id,
                kind,
            });
            *count += 1;
        }
    }

    /// Returns the events currently retained (`min(count, SIZE)` of them),
    /// oldest first. Called only from worker 0 after quiescence.
    pub fn snapshot(&self) -> Vec<TraceEvent> {
        // SAFETY: caller guarantees no concurrent writer (phase quiesced).
        unsafe {
            let count = *self.count.get();
            let events = &*self.events.get();
            if count >= TRACE_RING_SIZE as u64 {
                // Ring has wrapped: oldest surviving event is at `count % SIZE`.
                let start = (count as usize) % TRACE_RING_SIZE;
                let mut out = Vec::with_capacity(TRACE_RING_SIZE);
                for i in 0..TRACE_RING_SIZE {
                    let slot = (start + i) % TRACE_RING_SIZE;
                    out.push(events[slot].expect("ring slot should be initialized"));
                }
                out
            } else {
                events[..count as usize]
                    .iter()
                    .map(|e| e.expect("ring slot should be initialized"))
                    .collect()
            }
        }
    }

    pub fn reset(&self) {
        unsafe {
            *self.count.get() = 0;
        }
    }
}

impl Default for TraceRing {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct ChromeTraceEvent {
    pub pid: u32,
    pub tid: usize,
    pub ts: u64,
    pub ph: &'static str,
    pub cat: &'static str,
    pub name: String,
}

#[derive(Serialize)]
pub struct ChromeTraceFile {
    #[serde(rename = "traceEvents")]
    pub trace_events: Vec<ChromeTraceEvent>,
}

/// Builds the Chrome Trace-Event document for a set of per-worker rings.
/// Ordering is `worker_idx` then per-worker event index, as specified;
/// consumers merge-sort by `ts` themselves if they need a global order.
pub fn build_trace_file(
    rings: &[(usize, Vec<TraceEvent>)],
    function_names: &[&str],
    process_start: Instant,
    pid: u32,
) -> ChromeTraceFile {
    let mut trace_events = Vec::new();

    for (worker_idx, events) in rings {
        for event in events {
            let ts = event
                .timestamp
                .saturating_duration_since(process_start)
                .as_micros() as u64;
            let ph = match event.kind {
                EventKind::Begin => "B",
                EventKind::End => "E",
            };
            let name = function_names
                .get(event.function_id as usize)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("fn#{}", event.function_id));

            trace_events.push(ChromeTraceEvent {
                pid,
                tid: *worker_idx,
                ts,
                ph,
                cat: "blink",
                name,
            });
        }
    }

    ChromeTraceFile { trace_events }
}
