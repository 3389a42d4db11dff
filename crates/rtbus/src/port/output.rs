// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Streaming output port: push-only, scheduler-flushed.

use super::{Direction, PortCreationInfo, PortError, PortState, PullRequestHandler, StateCell, StreamInputPort};
use crate::buffer::{BufferPool, PooledBuffer};
use crate::sched::{StreamScheduler, StreamTask, TaskId};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

/// Push-only streaming endpoint.
///
/// Producers either commit buffers immediately ([`commit`](Self::commit)) or
/// park them for the next scheduler cycle
/// ([`defer_commit`](Self::defer_commit)); the port's [`StreamTask`] registration makes the
/// commit scheduler call [`flush`](Self::flush) once per cycle. Do not pass
/// a buffer to `commit` if it was already deferred.
pub struct StreamOutputPort {
    info: PortCreationInfo,
    pool: Arc<BufferPool>,
    connections: RwLock<Vec<Arc<StreamInputPort>>>,
    pull_handler: Option<Arc<dyn PullRequestHandler>>,
    pending: Mutex<Vec<PooledBuffer>>,
    scheduler: Option<Weak<StreamScheduler>>,
    task_id: Mutex<Option<TaskId>>,
    state: StateCell,
}

impl StreamOutputPort {
    pub fn builder(info: PortCreationInfo, pool: Arc<BufferPool>) -> StreamOutputPortBuilder {
        StreamOutputPortBuilder {
            info,
            pool,
            scheduler: None,
            pull_handler: None,
        }
    }

    /// Create a plain output port: no scheduler, no pull handler.
    pub fn new(info: PortCreationInfo, pool: Arc<BufferPool>) -> Result<Arc<Self>, PortError> {
        Self::builder(info, pool).build()
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn state(&self) -> PortState {
        self.state.get()
    }

    /// Connect to an input port and fire its partner-added hook.
    pub fn connect_to(&self, input: &Arc<StreamInputPort>) -> Result<(), PortError> {
        if self.state.is_destroyed() {
            return Err(PortError::InvalidState {
                port: self.info.name.clone(),
                state: PortState::Destroyed,
            });
        }
        self.connections.write().push(Arc::clone(input));
        self.state.mark_connected();
        input.on_partner_added(self.name());
        Ok(())
    }

    /// Remove a connection. Unknown partners are ignored.
    pub fn disconnect_from(&self, input: &Arc<StreamInputPort>) {
        self.connections
            .write()
            .retain(|connected| !Arc::ptr_eq(connected, input));
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// A pre-cleared buffer from the port's pool, ready for filling.
    pub fn get_unused_buffer(&self) -> PooledBuffer {
        self.pool.acquire_unused()
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Publish `buffer` to every connected input immediately.
    ///
    /// The connection list is snapshotted first so no port lock is held while
    /// packet processors run.
    pub fn commit(&self, buffer: PooledBuffer) -> Result<(), PortError> {
        if self.state.is_destroyed() {
            // The rejected buffer recycles on drop.
            return Err(PortError::InvalidState {
                port: self.info.name.clone(),
                state: PortState::Destroyed,
            });
        }
        let shared = buffer.into_shared();
        let connections = self.connections.read().clone();
        for input in &connections {
            input.publish(shared.clone());
        }
        Ok(())
    }

    /// Park `buffer` for the next scheduler cycle instead of committing now.
    ///
    /// Deferred buffers are committed in defer order by
    /// [`flush`](Self::flush).
    pub fn defer_commit(&self, buffer: PooledBuffer) -> Result<(), PortError> {
        if self.state.is_destroyed() {
            return Err(PortError::InvalidState {
                port: self.info.name.clone(),
                state: PortState::Destroyed,
            });
        }
        self.pending.lock().push(buffer);
        Ok(())
    }

    /// Commit all deferred buffers, in defer order. Called by the stream
    /// commit scheduler once per cycle; safe to call manually.
    pub fn flush(&self) {
        let pending = std::mem::take(&mut *self.pending.lock());
        for buffer in pending {
            if let Err(err) = self.commit(buffer) {
                log::warn!("deferred commit dropped: {}", err);
                return;
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Consumer-initiated pull. Delegates to the pull-request handler, which
    /// at most supplies introductory data; `None` is the normal answer on a
    /// pure stream.
    pub fn pull(&self) -> Option<PooledBuffer> {
        self.pull_handler.as_ref().and_then(|handler| handler.pull())
    }

    /// Tear down: unregister from the scheduler, drop pending buffers and
    /// connections.
    pub fn destroy(&self) {
        if !self.state.mark_destroyed() {
            return;
        }
        if let Some(scheduler) = self.scheduler.as_ref().and_then(Weak::upgrade) {
            if let Some(task_id) = self.task_id.lock().take() {
                scheduler.unregister(task_id);
            }
        }
        self.pending.lock().clear();
        self.connections.write().clear();
    }
}

impl StreamTask for StreamOutputPort {
    fn cycle(&self, _now: SystemTime) {
        self.flush();
    }
}

impl std::fmt::Debug for StreamOutputPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOutputPort")
            .field("name", &self.info.name)
            .field("state", &self.state.get())
            .field("connections", &self.connections.read().len())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

/// Builder wiring optional collaborators into a [`StreamOutputPort`].
pub struct StreamOutputPortBuilder {
    info: PortCreationInfo,
    pool: Arc<BufferPool>,
    scheduler: Option<Arc<StreamScheduler>>,
    pull_handler: Option<Arc<dyn PullRequestHandler>>,
}

impl StreamOutputPortBuilder {
    /// Register the port with `scheduler` for per-cycle deferred flushing.
    #[must_use]
    pub fn scheduler(mut self, scheduler: &Arc<StreamScheduler>) -> Self {
        self.scheduler = Some(Arc::clone(scheduler));
        self
    }

    #[must_use]
    pub fn pull_handler(mut self, handler: Arc<dyn PullRequestHandler>) -> Self {
        self.pull_handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<Arc<StreamOutputPort>, PortError> {
        if self.info.direction != Direction::Output {
            return Err(PortError::WrongDirection {
                port: self.info.name.clone(),
                expected: Direction::Output,
            });
        }
        let port = Arc::new(StreamOutputPort {
            info: self.info,
            pool: self.pool,
            connections: RwLock::new(Vec::new()),
            pull_handler: self.pull_handler,
            pending: Mutex::new(Vec::new()),
            scheduler: self.scheduler.as_ref().map(Arc::downgrade),
            task_id: Mutex::new(None),
            state: StateCell::new(),
        });
        if let Some(scheduler) = &self.scheduler {
            let task_id = scheduler.register(Arc::clone(&port) as Arc<dyn StreamTask>);
            *port.task_id.lock() = Some(task_id);
        }
        Ok(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{MemBuffer, SharedBuffer};
    use crate::registry::types::TypeRegistry;
    use std::time::Duration;

    fn mem_pool() -> Arc<BufferPool> {
        let registry = TypeRegistry::new();
        let entry = registry
            .register::<MemBuffer>("rtbus.MemBuffer", true)
            .expect("capacity");
        BufferPool::new(entry)
    }

    fn input_port(name: &str) -> Arc<StreamInputPort> {
        StreamInputPort::new(
            PortCreationInfo::streaming_input(name),
            Arc::new(|_: &SharedBuffer| true),
        )
        .expect("input info")
    }

    fn filled(port: &StreamOutputPort, payload: &[u8]) -> PooledBuffer {
        let mut buffer = port.get_unused_buffer();
        buffer
            .downcast_mut::<MemBuffer>()
            .expect("MemBuffer pool")
            .copy_from(payload);
        buffer
    }

    #[test]
    fn commit_reaches_every_connected_input() {
        let pool = mem_pool();
        let port = StreamOutputPort::new(PortCreationInfo::streaming_output("out"), pool.clone())
            .expect("output info");
        let first = input_port("in1");
        let second = input_port("in2");
        port.connect_to(&first).expect("connectable");
        port.connect_to(&second).expect("connectable");
        assert_eq!(port.state(), PortState::Connected);

        port.commit(filled(&port, &[42])).expect("connected port");
        assert_eq!(first.queue_len(), 1);
        assert_eq!(second.queue_len(), 1);

        let a = first.dequeue().expect("delivered");
        let b = second.dequeue().expect("delivered");
        assert!(a.ptr_eq(&b), "same published instance, not a copy");
    }

    #[test]
    fn get_unused_buffer_is_always_cleared() {
        let pool = mem_pool();
        let port = StreamOutputPort::new(PortCreationInfo::streaming_output("out"), pool.clone())
            .expect("output info");

        // Dirty a buffer, publish it nowhere, let it recycle.
        let buffer = filled(&port, &[9; 32]);
        drop(buffer);

        let reused = port.get_unused_buffer();
        assert!(reused
            .downcast_ref::<MemBuffer>()
            .expect("MemBuffer pool")
            .is_empty());
    }

    #[test]
    fn deferred_commits_flush_in_order_on_cycle() {
        let pool = mem_pool();
        let scheduler = StreamScheduler::new(Duration::from_millis(50));
        let port = StreamOutputPort::builder(PortCreationInfo::streaming_output("out"), pool.clone())
            .scheduler(&scheduler)
            .build()
            .expect("output info");
        let input = input_port("in");
        port.connect_to(&input).expect("connectable");

        port.defer_commit(filled(&port, &[1])).expect("live port");
        port.defer_commit(filled(&port, &[2])).expect("live port");
        assert_eq!(port.pending_count(), 2);
        assert_eq!(input.queue_len(), 0, "nothing delivered before the cycle");

        scheduler.tick();
        assert_eq!(port.pending_count(), 0);
        assert_eq!(input.queue_len(), 2);
        let first = input.dequeue().expect("flushed");
        assert_eq!(
            first.downcast_ref::<MemBuffer>().expect("MemBuffer").as_slice(),
            &[1]
        );
    }

    #[test]
    fn destroy_unregisters_from_scheduler() {
        let pool = mem_pool();
        let scheduler = StreamScheduler::new(Duration::from_millis(50));
        let port = StreamOutputPort::builder(PortCreationInfo::streaming_output("out"), pool)
            .scheduler(&scheduler)
            .build()
            .expect("output info");
        assert_eq!(scheduler.task_count(), 1);

        port.destroy();
        assert_eq!(scheduler.task_count(), 0);
        assert!(matches!(
            port.commit(port.get_unused_buffer()),
            Err(PortError::InvalidState { .. })
        ));
    }

    #[test]
    fn pull_consults_handler() {
        struct Intro(Arc<BufferPool>);
        impl PullRequestHandler for Intro {
            fn pull(&self) -> Option<PooledBuffer> {
                let mut buffer = self.0.acquire_unused();
                buffer
                    .downcast_mut::<MemBuffer>()
                    .expect("MemBuffer pool")
                    .copy_from(&[0xAB]);
                Some(buffer)
            }
        }

        let pool = mem_pool();
        let plain = StreamOutputPort::new(
            PortCreationInfo::streaming_output("plain"),
            pool.clone(),
        )
        .expect("output info");
        assert!(plain.pull().is_none(), "no handler, nothing to pull");

        let port = StreamOutputPort::builder(PortCreationInfo::streaming_output("out"), pool.clone())
            .pull_handler(Arc::new(Intro(pool)))
            .build()
            .expect("output info");
        let pulled = port.pull().expect("handler supplies intro data");
        assert_eq!(
            pulled.downcast_ref::<MemBuffer>().expect("MemBuffer").as_slice(),
            &[0xAB]
        );
    }
}
