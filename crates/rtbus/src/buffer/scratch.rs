// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Thread-local scratch pools for non-standard-typed deserialization.
//!
//! Non-standard types have no process-wide pool; each thread keeps a small
//! recycling stash per payload type instead. The persistent flavor
//! ([`ContainerMode::ThreadLocal`]) reuses stashed instances, the interthread
//! flavor always builds a fresh value copy that is safe to hand to another
//! execution context.

use super::PortData;
use crate::codec::ContainerMode;
use crate::registry::types::TypeEntry;
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;

/// Stash at most this many recycled instances per type per thread.
const MAX_STASHED_PER_TYPE: usize = 4;

thread_local! {
    // Keyed by the concrete Rust type, not the uid: uids are only unique
    // within one registry, scratch stashes are process-wide per thread.
    static POOLS: RefCell<HashMap<TypeId, Vec<Box<dyn PortData>>>> = RefCell::new(HashMap::new());
}

/// Scratch container handed out by [`acquire`]. Dropping it clears the
/// payload and stashes it in the dropping thread's pool — which is exactly
/// right for interthread hand-offs too: the instance simply starts recycling
/// on the receiving side.
pub struct ScratchBuffer {
    data: Option<Box<dyn PortData>>,
}

impl ScratchBuffer {
    pub fn data(&self) -> &dyn PortData {
        self.data.as_deref().expect("payload present until drop")
    }

    pub fn data_mut(&mut self) -> &mut dyn PortData {
        self.data.as_deref_mut().expect("payload present until drop")
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
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        if let Some(mut data) = self.data.take() {
            let key = data.as_any().type_id();
            data.clear();
            POOLS.with(|pools| {
                let mut pools = pools.borrow_mut();
                let stash = pools.entry(key).or_default();
                if stash.len() < MAX_STASHED_PER_TYPE {
                    stash.push(data);
                }
                // Over the cap the instance is simply dropped; steady-state
                // traffic stays allocation-free.
            });
        }
    }
}

/// Obtain a cleared scratch instance for `entry` in the requested mode.
pub(crate) fn acquire(entry: &TypeEntry, mode: ContainerMode) -> ScratchBuffer {
    let mut data = match mode {
        ContainerMode::Interthread => entry.create_instance(),
        ContainerMode::ThreadLocal => POOLS
            .with(|pools| {
                pools
                    .borrow_mut()
                    .get_mut(&entry.rust_type_id())
                    .and_then(Vec::pop)
            })
            .unwrap_or_else(|| entry.create_instance()),
    };
    // Stashed instances may have been registered under a different uid in a
    // previous session; re-attach the current one.
    data.set_type_uid(entry.uid());
    ScratchBuffer { data: Some(data) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MemBuffer;
    use crate::registry::types::TypeRegistry;

    #[test]
    fn thread_local_mode_reuses_instances() {
        let registry = TypeRegistry::new();
        let entry = registry
            .register::<MemBuffer>("rtbus.MemBuffer", false)
            .expect("capacity");

        let mut first = acquire(&entry, ContainerMode::ThreadLocal);
        first
            .downcast_mut::<MemBuffer>()
            .expect("MemBuffer scratch")
            .copy_from(&[1, 2, 3]);
        let first_ptr = first.data() as *const dyn PortData as *const u8;
        drop(first);

        let second = acquire(&entry, ContainerMode::ThreadLocal);
        let second_ptr = second.data() as *const dyn PortData as *const u8;
        assert_eq!(first_ptr, second_ptr, "same instance came back");
        assert!(
            second
                .downcast_ref::<MemBuffer>()
                .expect("MemBuffer scratch")
                .is_empty(),
            "recycled scratch is cleared"
        );
    }

    #[test]
    fn interthread_mode_always_builds_fresh_instances() {
        let registry = TypeRegistry::new();
        let entry = registry
            .register::<MemBuffer>("rtbus.MemBuffer", false)
            .expect("capacity");

        let held = acquire(&entry, ContainerMode::ThreadLocal);
        let fresh = acquire(&entry, ContainerMode::Interthread);
        let held_ptr = held.data() as *const dyn PortData as *const u8;
        let fresh_ptr = fresh.data() as *const dyn PortData as *const u8;
        assert_ne!(held_ptr, fresh_ptr);
        assert_eq!(fresh.type_uid(), entry.uid());
    }
}
