// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Lock-striped, chunked lookup table with lock-free reads.
//!
//! [`StripedRegistry`] is the storage primitive backing the type and port
//! lookup tables: a fixed-capacity mapping from a dense integer index to a
//! shared entry. Readers (hot path, e.g. type lookup during deserialization)
//! never take a lock and never contend with writers; writers (rare, e.g.
//! registering a new type) serialize through a single mutex.
//!
//! # Design
//!
//! Storage is partitioned into `chunk_count` chunks of `chunk_size` slots.
//! A chunk is allocated lazily on first write into it and published through
//! an [`ArcSwapOption`], so growing the table costs one pointer publication
//! rather than a full copy. Entries are append-mostly: an index may be
//! overwritten but never cleared, and no removal operation exists.

pub mod types;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Registry operation errors.
#[derive(Debug, Clone)]
pub enum RegistryError {
    /// Write index is beyond `chunk_count * chunk_size`. Capacity is fixed at
    /// construction; hitting this is a configuration defect, not a transient
    /// condition.
    CapacityExceeded { index: usize, capacity: usize },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::CapacityExceeded { index, capacity } => {
                write!(f, "index {} exceeds registry capacity {}", index, capacity)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// One lazily allocated stripe of slots.
struct Chunk<T> {
    slots: Box<[ArcSwapOption<T>]>,
}

impl<T> Chunk<T> {
    fn new(chunk_size: usize) -> Self {
        let slots = (0..chunk_size)
            .map(|_| ArcSwapOption::empty())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { slots }
    }
}

/// Fixed-capacity, chunked index-to-entry table.
///
/// # Concurrency
///
/// - [`get`](Self::get) is lock-free: two atomic pointer loads.
/// - [`set`](Self::set) serializes through one write mutex and publishes
///   lazily allocated chunks with release semantics, so a `get` racing a
///   `set` observes either the old value or the new one, never a torn state.
pub struct StripedRegistry<T> {
    chunks: Box<[ArcSwapOption<Chunk<T>>]>,
    write_lock: Mutex<()>,
    chunk_size: usize,
}

impl<T> StripedRegistry<T> {
    /// Create a registry with `chunk_count * chunk_size` total capacity.
    ///
    /// Only the chunk pointer array is allocated up front; chunk payloads
    /// appear on first write.
    pub fn new(chunk_count: usize, chunk_size: usize) -> Self {
        assert!(chunk_count > 0 && chunk_size > 0, "registry dimensions must be non-zero");
        let chunks = (0..chunk_count)
            .map(|_| ArcSwapOption::empty())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            chunks,
            write_lock: Mutex::new(()),
            chunk_size,
        }
    }

    /// Look up the entry at `index` without taking any lock.
    ///
    /// Returns `None` for never-set indices, indices inside unallocated
    /// chunks, and out-of-range indices alike.
    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        let chunk = self.chunks.get(index / self.chunk_size)?.load_full()?;
        chunk.slots[index % self.chunk_size].load_full()
    }

    /// Store `value` at `index`, allocating the owning chunk if needed.
    ///
    /// Overwriting an already-set index is permitted; clearing is not (no
    /// removal operation exists). Writes are serialized by a single mutex;
    /// concurrent readers are never blocked.
    pub fn set(&self, index: usize, value: T) -> Result<(), RegistryError> {
        let capacity = self.capacity();
        if index >= capacity {
            return Err(RegistryError::CapacityExceeded { index, capacity });
        }

        let _guard = self.write_lock.lock();
        let chunk_index = index / self.chunk_size;
        let chunk = match self.chunks[chunk_index].load_full() {
            Some(chunk) => chunk,
            None => {
                let chunk = Arc::new(Chunk::new(self.chunk_size));
                self.chunks[chunk_index].store(Some(Arc::clone(&chunk)));
                chunk
            }
        };
        chunk.slots[index % self.chunk_size].store(Some(Arc::new(value)));
        Ok(())
    }

    /// Every present entry in index order.
    ///
    /// Enumeration/diagnostics only; not a hot path.
    pub fn get_all(&self) -> Vec<(usize, Arc<T>)> {
        let mut entries = Vec::new();
        for (chunk_index, chunk_slot) in self.chunks.iter().enumerate() {
            let Some(chunk) = chunk_slot.load_full() else {
                continue;
            };
            for (slot_index, slot) in chunk.slots.iter().enumerate() {
                if let Some(entry) = slot.load_full() {
                    entries.push((chunk_index * self.chunk_size + slot_index, entry));
                }
            }
        }
        entries
    }

    /// Total slot capacity (`chunk_count * chunk_size`).
    pub fn capacity(&self) -> usize {
        self.chunks.len() * self.chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
