//! The job record itself: a function id, a parent handle, an atomic
//! unfinished-descendant count, and an inline payload buffer.

use crate::handle::JobHandle;
use crate::DATA_SIZE;
use std::sync::atomic::{AtomicI32, Ordering};

/// A job record, sized to fit in one cache line.
///
/// Only `unfinished` is ever mutated after the job has been handed to
/// another thread (via push/steal); `function_id`, `parent`, and `payload`
/// are written once by the creating worker before the handle is published,
/// and read-only afterwards.
#[repr(align(64))]
pub struct Job {
    pub unfinished: AtomicI32,
    pub function_id: u16,
    pub parent: JobHandle,
    pub payload_len: u8,
    pub payload: [u8; DATA_SIZE],
}

impl Default for Job {
    fn default() -> Self {
        Self {
            unfinished: AtomicI32::new(0),
            function_id: 0,
            parent: JobHandle::NONE,
            payload_len: 0,
            payload: [0; DATA_SIZE],
        }
    }
}

impl Job {
    /// Initializes a freshly allocated record as a root job (no parent).
    pub fn init_root(&mut self, function_id: u16) {
        self.function_id = function_id;
        self.parent = JobHandle::NONE;
        self.payload_len = 0;
        self.payload = [0; DATA_SIZE];
        self.unfinished.store(1, Ordering::SeqCst);
    }

    /// Initializes a freshly allocated record as a child of `parent`.
    pub fn init_child(&mut self, function_id: u16, parent: JobHandle) {
        self.function_id = function_id;
        self.parent = parent;
        self.payload_len = 0;
        self.payload = [0; DATA_SIZE];
        self.unfinished.store(1, Ordering::SeqCst);
    }

    pub fn set_payload(&mut self, data: &[u8]) {
        assert!(
            data.len() <= DATA_SIZE,
            "payload of {} bytes exceeds DATA_SIZE ({})",
            data.len(),
            DATA_SIZE
        );
        self.payload[..data.len()].copy_from_slice(data);
        self.payload_len = data.len() as u8;
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_len as usize]
    }

    pub fn is_finished(&self) -> bool {
        self.unfinished.load(Ordering::SeqCst) <= 0
    }
}
