// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Pooled, recyclable payload containers.
//!
//! A [`BufferPool`] owns the memory of its buffers for the lifetime of the
//! process: buffers are acquired, filled, published, read, and then recycled
//! (cleared and returned to the free list), never individually freed during
//! steady-state operation.
//!
//! Ownership flows through two handle types:
//!
//! - [`PooledBuffer`]: exclusive, writable. Held by a producer between
//!   `acquire_unused` and commit. Dropping it unpublished recycles the
//!   payload.
//! - [`SharedBuffer`]: cloneable, read-only. Produced by sealing a
//!   [`PooledBuffer`] at publish time; the clone count is the holder count,
//!   and the payload is recycled when the last clone drops.

pub mod chunk;
pub mod mem;
pub mod scratch;

pub use chunk::{ChunkBuffer, ChunkReader};
pub use mem::MemBuffer;
pub use scratch::ScratchBuffer;

use crate::codec::{BinaryReader, BinaryWriter, CodecResult};
use crate::registry::types::TypeEntry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Payload contract for everything that moves through ports.
///
/// Implementations carry the uid of their registered type (attached by
/// [`TypeEntry::create_instance`]), round-trip themselves through the binary
/// codec, and reset to an empty/default state on `clear` without releasing
/// their backing allocation.
pub trait PortData: Send + Sync + 'static {
    /// Uid of the registered type, or
    /// [`NULL_TYPE_UID`](crate::registry::types::NULL_TYPE_UID) before registration.
    fn type_uid(&self) -> i16;

    /// Attach the registered type's uid. Called once by the type factory;
    /// `clear` must not reset it.
    fn set_type_uid(&mut self, uid: i16);

    fn serialize(&self, writer: &mut BinaryWriter) -> CodecResult<()>;

    fn deserialize(&mut self, reader: &mut BinaryReader<'_>) -> CodecResult<()>;

    /// Reset content to empty/default, retaining capacity.
    fn clear(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Supplies pool-backed buffers for standard-typed deserialization.
///
/// Consumed by [`BinaryReader`](crate::codec::BinaryReader); implemented by
/// [`PoolSource`].
pub trait BufferSource: Send + Sync {
    fn acquire(&self, entry: &Arc<TypeEntry>) -> PooledBuffer;
}

/// Recycling pool for one payload type.
///
/// The free list is internally synchronized; any thread may acquire or
/// recycle. Counters are diagnostics only.
pub struct BufferPool {
    entry: Arc<TypeEntry>,
    free: Mutex<Vec<Box<dyn PortData>>>,
    created: AtomicUsize,
    recycled: AtomicUsize,
}

impl BufferPool {
    pub fn new(entry: Arc<TypeEntry>) -> Arc<Self> {
        Arc::new(Self {
            entry,
            free: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            recycled: AtomicUsize::new(0),
        })
    }

    /// Hand out a cleared buffer, reusing a recycled one when available.
    pub fn acquire_unused(self: &Arc<Self>) -> PooledBuffer {
        let data = match self.free.lock().pop() {
            Some(data) => data,
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                self.entry.create_instance()
            }
        };
        PooledBuffer {
            pool: Arc::clone(self),
            data: Some(data),
        }
    }

    /// Clear and return a payload to the free list. Internal: reached only
    /// from handle drops, i.e. once no holder remains.
    fn recycle(&self, mut data: Box<dyn PortData>) {
        data.clear();
        self.recycled.fetch_add(1, Ordering::Relaxed);
        self.free.lock().push(data);
    }

    pub fn entry(&self) -> &Arc<TypeEntry> {
        &self.entry
    }

    pub fn free_count(&self) -> usize {
        self.free.lock().len()
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn recycled_count(&self) -> usize {
        self.recycled.load(Ordering::Relaxed)
    }
}

/// Exclusive writable handle between `acquire_unused` and publish.
pub struct PooledBuffer {
    pool: Arc<BufferPool>,
    data: Option<Box<dyn PortData>>,
}

impl PooledBuffer {
    pub fn data(&self) -> &dyn PortData {
        // Invariant: `data` is Some until the handle is consumed or dropped.
        self.data.as_deref().expect("payload present until handle is consumed")
    }

    pub fn data_mut(&mut self) -> &mut dyn PortData {
        self.data.as_deref_mut().expect("payload present until handle is consumed")
    }

    pub fn downcast_ref<T: PortData>(&self) -> Option<&T> {
        self.data().as_any().downcast_ref()
    }

    pub fn downcast_mut<T: PortData>(&mut self) -> Option<&mut T> {
        self.data_mut().as_any_mut().downcast_mut()
    }

    pub fn type_uid(&self) -> i16 {
        self.data().type_uid()
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Seal for publication: the payload becomes read-only and shareable.
    pub fn into_shared(mut self) -> SharedBuffer {
        SharedBuffer {
            inner: Arc::new(Published {
                pool: Arc::clone(&self.pool),
                data: self.data.take(),
            }),
        }
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.recycle(data);
        }
    }
}

/// Published payload plus its way home.
struct Published {
    pool: Arc<BufferPool>,
    data: Option<Box<dyn PortData>>,
}

impl Drop for Published {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.recycle(data);
        }
    }
}

/// Cloneable read handle to a published buffer.
///
/// The `Arc` strong count is the holder count; the payload returns to its
/// pool when the last clone drops. Payload-internal mutation (e.g. a
/// [`ChunkBuffer`] being appended to while consumers read) is the payload
/// type's own concurrency responsibility.
#[derive(Clone)]
pub struct SharedBuffer {
    inner: Arc<Published>,
}

impl SharedBuffer {
    pub fn data(&self) -> &dyn PortData {
        self.inner
            .data
            .as_deref()
            .expect("payload present until last holder drops")
    }

    pub fn downcast_ref<T: PortData>(&self) -> Option<&T> {
        self.data().as_any().downcast_ref()
    }

    pub fn type_uid(&self) -> i16 {
        self.data().type_uid()
    }

    /// Identity comparison: true when both handles refer to the same
    /// published instance.
    pub fn ptr_eq(&self, other: &SharedBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Current holder count (diagnostics).
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("type_uid", &self.type_uid())
            .field("holders", &self.holders())
            .finish()
    }
}

/// Per-uid pool set implementing [`BufferSource`].
///
/// Pools are created on first acquisition of each standard type.
pub struct PoolSource {
    pools: DashMap<i16, Arc<BufferPool>>,
}

impl PoolSource {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    pub fn pool_for(&self, entry: &Arc<TypeEntry>) -> Arc<BufferPool> {
        Arc::clone(
            self.pools
                .entry(entry.uid())
                .or_insert_with(|| BufferPool::new(Arc::clone(entry)))
                .value(),
        )
    }
}

impl BufferSource for PoolSource {
    fn acquire(&self, entry: &Arc<TypeEntry>) -> PooledBuffer {
        self.pool_for(entry).acquire_unused()
    }
}

impl Default for PoolSource {
    fn default() -> Self {
        Self::new()
    }
}
