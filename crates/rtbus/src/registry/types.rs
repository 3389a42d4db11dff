// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Dynamic type registry: uid allocation and descriptor lookup.
//!
//! The codec tags every payload with a 2-byte type uid; this registry maps
//! uids back to descriptors and factories. It is the minimal registration
//! layer the messaging core needs, built directly on [`StripedRegistry`].

use super::{RegistryError, StripedRegistry};
use crate::buffer::PortData;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::TypeId;
use std::sync::Arc;

/// Reserved uid meaning "no type / null payload" on the wire.
pub const NULL_TYPE_UID: i16 = -1;

/// Default table dimensions: 32 chunks x 64 slots = 2048 registerable types.
const TYPE_CHUNK_COUNT: usize = 32;
const TYPE_CHUNK_SIZE: usize = 64;

/// Immutable metadata for one registered payload type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    uid: i16,
    name: String,
    standard: bool,
}

impl TypeDescriptor {
    /// Dense uid assigned at registration. Never `NULL_TYPE_UID`.
    pub fn uid(&self) -> i16 {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Standard types are materialized from a pool-backed buffer source
    /// during deserialization; non-standard types use thread-local scratch
    /// pools.
    pub fn is_standard(&self) -> bool {
        self.standard
    }
}

/// Registered type: descriptor plus the factory used to materialize scratch
/// and pool buffers.
pub struct TypeEntry {
    descriptor: TypeDescriptor,
    factory: fn() -> Box<dyn PortData>,
    type_id: TypeId,
}

impl TypeEntry {
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn uid(&self) -> i16 {
        self.descriptor.uid
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn is_standard(&self) -> bool {
        self.descriptor.is_standard()
    }

    /// Rust `TypeId` of the implementing payload type.
    pub fn rust_type_id(&self) -> TypeId {
        self.type_id
    }

    /// Build a fresh, cleared instance carrying this entry's uid.
    pub fn create_instance(&self) -> Box<dyn PortData> {
        let mut instance = (self.factory)();
        instance.set_type_uid(self.descriptor.uid);
        instance
    }
}

impl std::fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeEntry")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

fn make_instance<T: PortData + Default>() -> Box<dyn PortData> {
    Box::new(T::default())
}

/// Uid-to-descriptor lookup table with dense uid allocation.
///
/// Lookups by uid are lock-free (they hit the underlying
/// [`StripedRegistry`]); registration is rare and serializes through one
/// mutex. Secondary indices (`TypeId`, name) live in [`DashMap`]s.
pub struct TypeRegistry {
    table: StripedRegistry<TypeEntry>,
    by_type: DashMap<TypeId, i16>,
    by_name: DashMap<String, i16>,
    next_uid: Mutex<i16>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::with_capacity(TYPE_CHUNK_COUNT, TYPE_CHUNK_SIZE)
    }

    pub fn with_capacity(chunk_count: usize, chunk_size: usize) -> Self {
        Self {
            table: StripedRegistry::new(chunk_count, chunk_size),
            by_type: DashMap::new(),
            by_name: DashMap::new(),
            next_uid: Mutex::new(0),
        }
    }

    /// Register payload type `T` under `name`, allocating the next dense uid.
    ///
    /// Registering the same Rust type twice returns the existing entry
    /// unchanged. Fails with a capacity error once the table is full.
    pub fn register<T>(&self, name: &str, standard: bool) -> Result<Arc<TypeEntry>, RegistryError>
    where
        T: PortData + Default,
    {
        let type_id = TypeId::of::<T>();
        let mut next_uid = self.next_uid.lock();

        if let Some(existing) = self.by_type.get(&type_id) {
            let uid = *existing;
            drop(existing);
            if let Some(entry) = self.by_uid(uid) {
                return Ok(entry);
            }
        }

        let uid = *next_uid;
        let entry = TypeEntry {
            descriptor: TypeDescriptor {
                uid,
                name: name.to_owned(),
                standard,
            },
            factory: make_instance::<T>,
            type_id,
        };
        self.table.set(uid as usize, entry)?;
        *next_uid += 1;

        self.by_type.insert(type_id, uid);
        self.by_name.insert(name.to_owned(), uid);
        // Lookup cannot fail: the slot was just published.
        Ok(self.table.get(uid as usize).unwrap_or_else(|| {
            unreachable!("type entry published under write lock")
        }))
    }

    /// Lock-free uid resolution. `NULL_TYPE_UID` and unknown uids are `None`.
    pub fn by_uid(&self, uid: i16) -> Option<Arc<TypeEntry>> {
        if uid < 0 {
            return None;
        }
        self.table.get(uid as usize)
    }

    pub fn by_type<T: PortData>(&self) -> Option<Arc<TypeEntry>> {
        let uid = *self.by_type.get(&TypeId::of::<T>())?;
        self.by_uid(uid)
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<TypeEntry>> {
        let uid = *self.by_name.get(name)?;
        self.by_uid(uid)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        *self.next_uid.lock() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registered entries in uid order (diagnostics).
    pub fn entries(&self) -> Vec<Arc<TypeEntry>> {
        self.table.get_all().into_iter().map(|(_, e)| e).collect()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{ChunkBuffer, MemBuffer};

    #[test]
    fn register_assigns_dense_uids() {
        let registry = TypeRegistry::new();
        let mem = registry
            .register::<MemBuffer>("rtbus.MemBuffer", true)
            .expect("capacity");
        let chunk = registry
            .register::<ChunkBuffer>("rtbus.ChunkBuffer", false)
            .expect("capacity");

        assert_eq!(mem.uid(), 0);
        assert_eq!(chunk.uid(), 1);
        assert!(mem.is_standard());
        assert!(!chunk.is_standard());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn reregistering_same_type_returns_existing_entry() {
        let registry = TypeRegistry::new();
        let first = registry
            .register::<MemBuffer>("rtbus.MemBuffer", true)
            .expect("capacity");
        let second = registry
            .register::<MemBuffer>("rtbus.MemBuffer", true)
            .expect("capacity");

        assert_eq!(first.uid(), second.uid());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_by_uid_name_and_type_agree() {
        let registry = TypeRegistry::new();
        let entry = registry
            .register::<ChunkBuffer>("rtbus.ChunkBuffer", false)
            .expect("capacity");

        let by_uid = registry.by_uid(entry.uid()).expect("registered");
        let by_name = registry.by_name("rtbus.ChunkBuffer").expect("registered");
        let by_type = registry.by_type::<ChunkBuffer>().expect("registered");
        assert_eq!(by_uid.uid(), entry.uid());
        assert_eq!(by_name.uid(), entry.uid());
        assert_eq!(by_type.uid(), entry.uid());

        assert!(registry.by_uid(NULL_TYPE_UID).is_none());
        assert!(registry.by_uid(99).is_none());
    }

    #[test]
    fn create_instance_carries_uid_and_is_cleared() {
        let registry = TypeRegistry::new();
        let entry = registry
            .register::<MemBuffer>("rtbus.MemBuffer", true)
            .expect("capacity");

        let instance = entry.create_instance();
        assert_eq!(instance.type_uid(), entry.uid());
        let mem = instance
            .as_any()
            .downcast_ref::<MemBuffer>()
            .expect("factory builds MemBuffer");
        assert!(mem.as_slice().is_empty());
    }
}
