// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Streaming input port: queued, packet-callback driven.

use super::{ConnectionHandler, Direction, PacketProcessor, PortCreationInfo, PortError, PortState, StateCell};
use crate::buffer::SharedBuffer;
use crossbeam::queue::SegQueue;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Queued streaming endpoint.
///
/// Every inbound publish runs the packet processor synchronously; a `true`
/// return additionally enqueues the buffer for later pull-style consumption,
/// so data can be both reacted to immediately and drained later. Processor
/// panics are isolated: logged as warnings, the packet is not enqueued, and
/// subsequent packets are unaffected.
///
/// The delivery queue is a lock-free [`SegQueue`]; publishers and draining
/// consumers never hold a lock across user callbacks.
pub struct StreamInputPort {
    info: PortCreationInfo,
    processor: Arc<dyn PacketProcessor>,
    connection_handler: Option<Arc<dyn ConnectionHandler>>,
    queue: SegQueue<SharedBuffer>,
    state: StateCell,
}

impl StreamInputPort {
    /// Create an input port. Fails if the creation info is not input-directed.
    pub fn new(
        info: PortCreationInfo,
        processor: Arc<dyn PacketProcessor>,
    ) -> Result<Arc<Self>, PortError> {
        Self::build(info, processor, None)
    }

    /// Create an input port with a connection-handler collaborator that is
    /// notified whenever a partner connects.
    pub fn with_connection_handler(
        info: PortCreationInfo,
        processor: Arc<dyn PacketProcessor>,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Arc<Self>, PortError> {
        Self::build(info, processor, Some(handler))
    }

    fn build(
        info: PortCreationInfo,
        processor: Arc<dyn PacketProcessor>,
        connection_handler: Option<Arc<dyn ConnectionHandler>>,
    ) -> Result<Arc<Self>, PortError> {
        if info.direction != Direction::Input {
            return Err(PortError::WrongDirection {
                port: info.name.clone(),
                expected: Direction::Input,
            });
        }
        Ok(Arc::new(Self {
            info,
            processor,
            connection_handler,
            queue: SegQueue::new(),
            state: StateCell::new(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn state(&self) -> PortState {
        self.state.get()
    }

    /// Deliver one buffer to this port.
    ///
    /// Runs the packet processor synchronously; enqueues the buffer when the
    /// processor returns `true` and queueing is enabled. A bounded queue
    /// drops its oldest entry on overflow. Publishes to a destroyed port are
    /// silently discarded.
    pub fn publish(&self, buffer: SharedBuffer) {
        if self.state.is_destroyed() {
            log::debug!("publish to destroyed port '{}' discarded", self.name());
            return;
        }

        let enqueue = self.invoke_processor(&buffer);
        if !enqueue || !self.info.queue_enabled {
            return;
        }

        if let Some(bound) = self.info.queue_bound {
            while self.queue.len() >= bound as usize {
                // Oldest entry drops here, releasing its buffer hold.
                if self.queue.pop().is_none() {
                    break;
                }
            }
        }
        self.queue.push(buffer);
    }

    /// Drain the entire current queue contents through the packet processor,
    /// for pull-style consumers.
    ///
    /// Only the packets queued at entry are processed; packets published
    /// concurrently stay for the next drain. No lock is held while user code
    /// runs.
    pub fn process_packets(&self) {
        let pending = self.queue.len();
        for _ in 0..pending {
            let Some(buffer) = self.queue.pop() else {
                break;
            };
            let _ = self.invoke_processor(&buffer);
        }
    }

    /// Pop one queued buffer without running the processor.
    pub fn dequeue(&self) -> Option<SharedBuffer> {
        self.queue.pop()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Partner-added hook, called by the connecting output port.
    pub(crate) fn on_partner_added(&self, partner: &str) {
        self.state.mark_connected();
        if let Some(handler) = &self.connection_handler {
            handler.on_connect(partner);
        }
    }

    /// Tear down: discard queued buffers and stop accepting publishes.
    pub fn destroy(&self) {
        if !self.state.mark_destroyed() {
            return;
        }
        while self.queue.pop().is_some() {}
    }

    fn invoke_processor(&self, buffer: &SharedBuffer) -> bool {
        let result = catch_unwind(AssertUnwindSafe(|| self.processor.process(buffer)));
        match result {
            Ok(enqueue) => enqueue,
            Err(_) => {
                log::warn!(
                    "packet processor panicked on port '{}', packet dropped",
                    self.name()
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for StreamInputPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamInputPort")
            .field("name", &self.info.name)
            .field("state", &self.state.get())
            .field("queued", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferPool, MemBuffer, SharedBuffer};
    use crate::registry::types::TypeRegistry;
    use parking_lot::Mutex;

    fn shared_mem(pool: &Arc<BufferPool>, payload: &[u8]) -> SharedBuffer {
        let mut buffer = pool.acquire_unused();
        buffer
            .downcast_mut::<MemBuffer>()
            .expect("MemBuffer pool")
            .copy_from(payload);
        buffer.into_shared()
    }

    fn mem_pool() -> Arc<BufferPool> {
        let registry = TypeRegistry::new();
        let entry = registry
            .register::<MemBuffer>("rtbus.MemBuffer", true)
            .expect("capacity");
        BufferPool::new(entry)
    }

    fn payload(buffer: &SharedBuffer) -> Vec<u8> {
        buffer
            .downcast_ref::<MemBuffer>()
            .expect("MemBuffer payload")
            .as_slice()
            .to_vec()
    }

    #[test]
    fn wrong_direction_is_rejected() {
        let err = StreamInputPort::new(
            PortCreationInfo::streaming_output("backwards"),
            Arc::new(|_: &SharedBuffer| true),
        )
        .expect_err("output info on input port");
        assert!(matches!(err, PortError::WrongDirection { .. }));
    }

    #[test]
    fn drain_preserves_publish_order() {
        let pool = mem_pool();
        let seen: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_in_processor = Arc::clone(&seen);
        let port = StreamInputPort::new(
            PortCreationInfo::streaming_input("in"),
            Arc::new(move |buffer: &SharedBuffer| {
                seen_in_processor.lock().push(payload(buffer));
                true
            }),
        )
        .expect("input info");

        for bytes in [&[1u8][..], &[2], &[3]] {
            port.publish(shared_mem(&pool, bytes));
        }
        assert_eq!(port.queue_len(), 3);

        seen.lock().clear();
        port.process_packets();
        assert_eq!(*seen.lock(), vec![vec![1], vec![2], vec![3]]);
        assert_eq!(port.queue_len(), 0, "all locks released, queue drained");
    }

    #[test]
    fn processor_panic_skips_packet_and_continues() {
        let pool = mem_pool();
        let port = StreamInputPort::new(
            PortCreationInfo::streaming_input("in"),
            Arc::new(|buffer: &SharedBuffer| {
                if payload(buffer) == [2] {
                    panic!("defective processor");
                }
                true
            }),
        )
        .expect("input info");

        for bytes in [&[1u8][..], &[2], &[3]] {
            port.publish(shared_mem(&pool, bytes));
        }

        // b2 was dropped by the panic, b1 and b3 queued in order.
        assert_eq!(port.queue_len(), 2);
        let first = port.dequeue().expect("b1 queued");
        let second = port.dequeue().expect("b3 queued");
        assert_eq!(payload(&first), vec![1]);
        assert_eq!(payload(&second), vec![3]);
    }

    #[test]
    fn processor_false_means_not_enqueued() {
        let pool = mem_pool();
        let port = StreamInputPort::new(
            PortCreationInfo::streaming_input("in"),
            Arc::new(|_: &SharedBuffer| false),
        )
        .expect("input info");

        port.publish(shared_mem(&pool, &[1]));
        assert_eq!(port.queue_len(), 0);
    }

    #[test]
    fn bounded_queue_drops_oldest() {
        let pool = mem_pool();
        let port = StreamInputPort::new(
            PortCreationInfo::streaming_input("in").with_queue(Some(2)),
            Arc::new(|_: &SharedBuffer| true),
        )
        .expect("input info");

        for bytes in [&[1u8][..], &[2], &[3]] {
            port.publish(shared_mem(&pool, bytes));
        }
        assert_eq!(port.queue_len(), 2);
        assert_eq!(payload(&port.dequeue().expect("kept")), vec![2]);
        assert_eq!(payload(&port.dequeue().expect("kept")), vec![3]);
    }

    #[test]
    fn connection_handler_sees_partner_name() {
        let connected: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let connected_in_handler = Arc::clone(&connected);
        let port = StreamInputPort::with_connection_handler(
            PortCreationInfo::streaming_input("in"),
            Arc::new(|_: &SharedBuffer| true),
            Arc::new(move |partner: &str| {
                connected_in_handler.lock().push(partner.to_owned());
            }),
        )
        .expect("input info");

        port.on_partner_added("producer");
        assert_eq!(port.state(), PortState::Connected);
        assert_eq!(*connected.lock(), vec!["producer".to_owned()]);
    }

    #[test]
    fn destroyed_port_discards_publishes_and_queue() {
        let pool = mem_pool();
        let port = StreamInputPort::new(
            PortCreationInfo::streaming_input("in"),
            Arc::new(|_: &SharedBuffer| true),
        )
        .expect("input info");

        port.publish(shared_mem(&pool, &[1]));
        port.destroy();
        assert_eq!(port.queue_len(), 0);

        port.publish(shared_mem(&pool, &[2]));
        assert_eq!(port.queue_len(), 0);
        assert_eq!(port.state(), PortState::Destroyed);
        // Both buffers went home to the pool.
        assert_eq!(pool.free_count(), 2);
    }
}
