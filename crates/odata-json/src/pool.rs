//! Explicit buffer arena for the tokenizer's character window.
//!
//! A pool is an optimization hook, not a correctness requirement: the reader
//! rents one buffer for its lifetime and gives it back exactly once when
//! dropped. Without a pool the window simply allocates.

use std::sync::{Arc, Mutex};

/// An arena the reader can rent its internal character buffer from.
pub trait BufferPool {
    /// Returns a buffer with at least `min_capacity` capacity. The buffer's
    /// length is irrelevant; the reader clears it before use.
    fn rent(&self, min_capacity: usize) -> Vec<char>;

    /// Returns ownership of a previously rented buffer to the pool.
    fn give_back(&self, buffer: Vec<char>);
}

/// A trivial pool that keeps returned buffers on a free list.
#[derive(Debug, Default)]
pub struct SharedBufferPool {
    free: Mutex<Vec<Vec<char>>>,
}

impl SharedBufferPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl BufferPool for SharedBufferPool {
    fn rent(&self, min_capacity: usize) -> Vec<char> {
        let mut free = self.free.lock().expect("pool lock");
        match free.pop() {
            Some(mut buf) => {
                buf.clear();
                if buf.capacity() < min_capacity {
                    buf.reserve(min_capacity - buf.capacity());
                }
                buf
            }
            None => Vec::with_capacity(min_capacity),
        }
    }

    fn give_back(&self, buffer: Vec<char>) {
        self.free.lock().expect("pool lock").push(buffer);
    }
}
