//! The work-stealing deque: a fixed-size circular buffer of job handles.
//!
//! Baseline implementation per the spec: a single mutex guards `top`,
//! `bottom`, and the slot array. The owning worker pushes/pops at the
//! bottom; any other worker may steal from the top. A lock-free
//! (Chase-Lev-style) deque is a permitted drop-in replacement with the
//! same external contract, but is not implemented here.

use crate::handle::JobHandle;
use crate::QUEUE_SIZE;
use parking_lot::Mutex;

const MASK: u32 = (QUEUE_SIZE - 1) as u32;

struct Inner {
    slots: [JobHandle; QUEUE_SIZE],
    top: u32,
    bottom: u32,
}

pub struct Deque {
    inner: Mutex<Inner>,
}

impl Deque {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: [JobHandle::NONE; QUEUE_SIZE],
                top: 0,
                bottom: 0,
            }),
        }
    }

    /// Pushes a handle at the bottom. Called only by the owning worker.
    pub fn push(&self, job: JobHandle) {
        let mut inner = self.inner.lock();
        let count = inner.bottom.wrapping_sub(inner.top) as i64;
        assert!(
            count < QUEUE_SIZE as i64,
            "work-stealing deque overflow: more than {} jobs in flight on one worker",
            QUEUE_SIZE
        );

        let slot = (inner.bottom & MASK) as usize;
        inner.slots[slot] = job;
        inner.bottom = inner.bottom.wrapping_add(1);
    }

    /// Pops a handle from the bottom. Called only by the owning worker.
    pub fn pop(&self) -> Option<JobHandle> {
        let mut inner = self.inner.lock();
        let count = inner.bottom.wrapping_sub(inner.top) as i32;
        if count <= 0 {
            return None;
        }

        inner.bottom = inner.bottom.wrapping_sub(1);
        let slot = (inner.bottom & MASK) as usize;
        Some(inner.slots[slot])
    }

    /// Steals a handle from the top. Called by any non-owning worker.
    pub fn steal(&self) -> Option<JobHandle> {
        let mut inner = self.inner.lock();
        let count = inner.bottom.wrapping_sub(inner.top) as i32;
        if count <= 0 {
            return None;
        }

        let slot = (inner.top & MASK) as usize;
        let job = inner.slots[slot];
        inner.top = inner.top.wrapping_add(1);
        Some(job)
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock();
        inner.bottom.wrapping_sub(inner.top) == 0
    }
}

impl Default for Deque {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_deque_pops_and_steals_nothing() {
        let deque = Deque::new();
        assert_eq!(deque.pop(), None);
        assert_eq!(deque.steal(), None);
        assert!(deque.is_empty());
    }

    #[test]
    fn push_then_pop_is_lifo() {
        let deque = Deque::new();
        deque.push(JobHandle::encode(0, 1));
        deque.push(JobHandle::encode(0, 2));
        assert_eq!(deque.pop(), Some(JobHandle::encode(0, 2)));
        assert_eq!(deque.pop(), Some(JobHandle::encode(0, 1)));
        assert_eq!(deque.pop(), None);
    }

    #[test]
    fn steal_takes_from_the_top() {
        let deque = Deque::new();
        deque.push(JobHandle::encode(0, 1));
        deque.push(JobHandle::encode(0, 2));
        assert_eq!(deque.steal(), Some(JobHandle::encode(0, 1)));
        assert_eq!(deque.pop(), Some(JobHandle::encode(0, 2)));
        assert_eq!(deque.steal(), None);
    }

    #[test]
    fn no_pushed_handle_is_lost_or_duplicated_under_concurrency() {
        use std::collections::HashSet;
        use std::sync::Arc;
        use std::thread;

        let deque = Arc::new(Deque::new());
        const N: usize = QUEUE_SIZE / 2;
        for i in 0..N {
            deque.push(JobHandle::encode(0, i));
        }

        let stolen = Arc::new(Mutex::new(Vec::new()));
        let mut thieves = Vec::new();
        for _ in 0..4 {
            let deque = deque.clone();
            let stolen = stolen.clone();
            thieves.push(thread::spawn(move || loop {
                match deque.steal() {
                    Some(job) => stolen.lock().push(job),
                    None => break,
                }
            }));
        }

        let mut popped = Vec::new();
        while let Some(job) = deque.pop() {
            popped.push(job);
        }

        for t in thieves {
            t.join().unwrap();
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for job in popped.into_iter().chain(stolen.lock().drain(..)) {
            assert!(seen.insert(job), "handle {:?} observed twice", job);
            total += 1;
        }
        assert_eq!(total, N);
    }
}
