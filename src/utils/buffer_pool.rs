//! # Buffer Lease Pool
//!
//! Pool of short-lived byte buffers used by the codec, the host loop and the
//! channel for encoding requests and responses.
//!
//! A [`BufferLease`] is an RAII guard: the buffer returns to the pool when the
//! lease is dropped, on every exit path including unwinding. A lease cannot be
//! used after release because releasing consumes it.
//!
//! ## Debug Poisoning
//! In debug builds a released buffer is filled with [`POISON_BYTE`] and kept in
//! that state while idle, so stale views into pooled memory show up as
//! `0xDD` runs instead of plausible data. The pool also tracks outstanding
//! leases and asserts against release underflow.
//!
//! ## Usage
//! ```rust,no_run
//! use duplex_rpc::utils::buffer_pool::BufferPool;
//!
//! let pool = BufferPool::new(16);
//! let len = pool.with_lease(|buf| {
//!     buf.extend_from_slice(b"payload");
//!     buf.len()
//! });
//! assert_eq!(len, 7);
//! ```

use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Buffers above this capacity are freed instead of pooled
const MAX_POOLED_BUFFER_SIZE: usize = 256 * 1024;

/// Default buffer capacity
const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Fill byte for released buffers in debug builds
pub const POISON_BYTE: u8 = 0xDD;

struct PoolInner {
    idle: Mutex<Vec<Vec<u8>>>,
    outstanding: AtomicUsize,
}

/// A pooled buffer that returns itself to the pool when dropped
pub struct BufferLease {
    buffer: Vec<u8>,
    pool: Arc<PoolInner>,
}

impl BufferLease {
    /// Return the buffer to the pool explicitly.
    pub fn release(self) {
        drop(self);
    }

    /// Detach the buffer from the pool, consuming this lease.
    pub fn into_inner(mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Freeze the lease into [`Bytes`] without copying. The buffer goes back
    /// to the pool once the last clone of the returned `Bytes` is dropped.
    pub fn into_bytes(self) -> Bytes {
        Bytes::from_owner(self)
    }
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        let previous = self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "buffer lease released more often than acquired");

        let capacity = self.buffer.capacity();
        if capacity == 0 || capacity > MAX_POOLED_BUFFER_SIZE {
            return;
        }

        let mut buffer = std::mem::take(&mut self.buffer);
        if cfg!(debug_assertions) {
            buffer.fill(POISON_BYTE);
        } else {
            buffer.clear();
        }
        if let Ok(mut idle) = self.pool.idle.lock() {
            idle.push(buffer);
        }
    }
}

impl std::ops::Deref for BufferLease {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl std::ops::DerefMut for BufferLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl AsRef<[u8]> for BufferLease {
    fn as_ref(&self) -> &[u8] {
        &self.buffer
    }
}

/// Thread-safe pool of reusable byte buffers
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
    initial_capacity: usize,
}

impl BufferPool {
    /// Create a pool pre-filled with `pool_size` buffers
    pub fn new(pool_size: usize) -> Self {
        let idle = (0..pool_size)
            .map(|_| Vec::with_capacity(DEFAULT_BUFFER_CAPACITY))
            .collect();

        Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(idle),
                outstanding: AtomicUsize::new(0),
            }),
            initial_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Acquire an empty buffer with at least `min_capacity` bytes of capacity
    pub fn acquire_with_capacity(&self, min_capacity: usize) -> BufferLease {
        let mut buffer = match self.inner.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(_) => None,
        }
        .unwrap_or_else(|| Vec::with_capacity(self.initial_capacity.max(min_capacity)));

        buffer.clear();
        buffer.reserve(min_capacity);
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);

        BufferLease {
            buffer,
            pool: self.inner.clone(),
        }
    }

    /// Acquire an empty buffer (or allocate a new one if the pool is drained)
    pub fn acquire(&self) -> BufferLease {
        self.acquire_with_capacity(0)
    }

    /// Run `f` with a leased buffer that is released when `f` returns or unwinds.
    pub fn with_lease<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut Vec<u8>) -> T,
    {
        let mut lease = self.acquire();
        f(&mut lease)
    }

    /// Number of idle buffers ready for reuse
    pub fn available(&self) -> usize {
        self.inner.idle.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Number of leases currently held by callers
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(32)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.available())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}
