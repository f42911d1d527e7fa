//! Connection scoped buffer allocation.
//!
//! Every accepted connection owns one [`ConnectionAllocator`]. Requests served on that
//! connection allocate their outbound buffers from it and adopt their inbound chunks into it,
//! so the bytes handed across the transport boundary are never copied.

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Default capacity for buffers handed out without an explicit size.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Identifies one accepted connection for the lifetime of the process.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    /// Returns the next unused connection id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Counters describing what a connection allocator has produced so far.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Buffers created through [`ConnectionAllocator::allocate`].
    pub allocated_buffers: usize,
    /// Total capacity requested through [`ConnectionAllocator::allocate`].
    pub allocated_bytes: usize,
    /// Inbound chunks adopted through [`ConnectionAllocator::adopt`].
    pub adopted_buffers: usize,
    /// Total length of the adopted chunks.
    pub adopted_bytes: usize,
}

/// A cheaply cloneable handle to one connection's allocator.
#[derive(Clone)]
pub struct ConnectionAllocator {
    inner: Arc<Inner>,
}

struct Inner {
    connection_id: ConnectionId,
    default_capacity: usize,
    allocated_buffers: AtomicUsize,
    allocated_bytes: AtomicUsize,
    adopted_buffers: AtomicUsize,
    adopted_bytes: AtomicUsize,
}

impl ConnectionAllocator {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self::with_capacity(connection_id, DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(connection_id: ConnectionId, default_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                connection_id,
                default_capacity,
                allocated_buffers: AtomicUsize::new(0),
                allocated_bytes: AtomicUsize::new(0),
                adopted_buffers: AtomicUsize::new(0),
                adopted_bytes: AtomicUsize::new(0),
            }),
        }
    }

    #[inline]
    pub fn connection_id(&self) -> ConnectionId {
        self.inner.connection_id
    }

    #[inline]
    pub fn default_capacity(&self) -> usize {
        self.inner.default_capacity
    }

    /// Creates an empty buffer able to hold `capacity` bytes without reallocating.
    pub fn allocate(&self, capacity: usize) -> BytesMut {
        self.inner.allocated_buffers.fetch_add(1, Ordering::Relaxed);
        self.inner.allocated_bytes.fetch_add(capacity, Ordering::Relaxed);
        BytesMut::with_capacity(capacity)
    }

    /// Creates an empty buffer of the default capacity.
    pub fn allocate_default(&self) -> BytesMut {
        self.allocate(self.inner.default_capacity)
    }

    /// Takes ownership of a chunk read from this connection. The bytes are not copied.
    pub fn adopt(&self, bytes: Bytes) -> Bytes {
        self.inner.adopted_buffers.fetch_add(1, Ordering::Relaxed);
        self.inner.adopted_bytes.fetch_add(bytes.len(), Ordering::Relaxed);
        bytes
    }

    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            allocated_buffers: self.inner.allocated_buffers.load(Ordering::Relaxed),
            allocated_bytes: self.inner.allocated_bytes.load(Ordering::Relaxed),
            adopted_buffers: self.inner.adopted_buffers.load(Ordering::Relaxed),
            adopted_bytes: self.inner.adopted_bytes.load(Ordering::Relaxed),
        }
    }

    /// Returns true if both handles point at the same connection allocator.
    pub fn same_as(&self, other: &ConnectionAllocator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ConnectionAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionAllocator")
            .field("connection_id", &self.inner.connection_id)
            .field("default_capacity", &self.inner.default_capacity)
            .field("stats", &self.stats())
            .finish()
    }
}
