//! Buffer creation bound to one connection.

use bytes::{Bytes, BytesMut};
use micro_transport::{ConnectionAllocator, ConnectionId};

/// Creates body buffers from the allocator of the connection a request arrived on.
///
/// A factory is created for one request/response pair and dropped with it. Inbound chunks are
/// wrapped, never copied, and outbound buffers come from the same connection allocator.
#[derive(Debug, Clone)]
pub struct BufferFactory {
    allocator: ConnectionAllocator,
}

impl BufferFactory {
    pub fn new(allocator: ConnectionAllocator) -> Self {
        Self { allocator }
    }

    /// An empty buffer able to hold `capacity` bytes.
    pub fn allocate_buffer(&self, capacity: usize) -> BytesMut {
        self.allocator.allocate(capacity)
    }

    /// An empty buffer of the connection's default capacity.
    pub fn allocate_default_buffer(&self) -> BytesMut {
        self.allocator.allocate_default()
    }

    /// Wraps a chunk received on this connection without copying it.
    pub fn wrap(&self, bytes: Bytes) -> Bytes {
        self.allocator.adopt(bytes)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.allocator.connection_id()
    }

    pub fn allocator(&self) -> &ConnectionAllocator {
        &self.allocator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn buffers_come_from_the_connection_allocator() {
        let allocator = ConnectionAllocator::new(ConnectionId::next());
        let factory = BufferFactory::new(allocator.clone());

        let mut buf = factory.allocate_buffer(32);
        buf.put_slice(b"hello");
        assert_eq!(&buf[..], b"hello");

        let default = factory.allocate_default_buffer();
        assert!(default.capacity() >= allocator.default_capacity());

        let wrapped = factory.wrap(Bytes::from_static(b"world"));
        assert_eq!(wrapped, Bytes::from_static(b"world"));

        let stats = allocator.stats();
        assert_eq!(stats.allocated_buffers, 2);
        assert_eq!(stats.allocated_bytes, 32 + allocator.default_capacity());
        assert_eq!(stats.adopted_buffers, 1);
        assert_eq!(factory.connection_id(), allocator.connection_id());
    }
}
