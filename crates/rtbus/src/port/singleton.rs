// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Singleton port: one fixed buffer, guarded re-publish.

use super::{PortCreationInfo, PortError, PortState, StateCell};
use crate::buffer::{PooledBuffer, SharedBuffer};
use std::sync::Arc;

/// Transactional single-slot endpoint.
///
/// Holds exactly one buffer instance for its entire lifetime, published once
/// at construction. The intent is in-place transactional mutation of one
/// shared object, not message replacement, so the assignment policy rejects
/// any publish whose payload identity differs from the original instance.
/// Concurrent access discipline for the contained object is the payload
/// type's responsibility, not the port's.
pub struct SingletonPort {
    info: PortCreationInfo,
    buffer: SharedBuffer,
    state: StateCell,
}

impl SingletonPort {
    /// Create the port and publish `initial` as its singleton instance.
    ///
    /// Requires creation info with the custom-assignment flag set; the guard
    /// below is that custom assignment policy.
    pub fn new(info: PortCreationInfo, initial: PooledBuffer) -> Result<Arc<Self>, PortError> {
        if !info.custom_assign {
            return Err(PortError::PolicyViolation {
                port: info.name.clone(),
                reason: "singleton ports require the custom-assignment flag".into(),
            });
        }
        Ok(Arc::new(Self {
            info,
            buffer: initial.into_shared(),
            state: StateCell::new(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn state(&self) -> PortState {
        self.state.get()
    }

    /// Handle to the singleton instance.
    pub fn get(&self) -> SharedBuffer {
        self.buffer.clone()
    }

    /// Re-publish after an in-place mutation.
    ///
    /// Accepts only the original singleton instance; any other buffer
    /// identity is a fatal caller defect and leaves the contents unchanged.
    pub fn publish(&self, candidate: &SharedBuffer) -> Result<(), PortError> {
        if self.state.is_destroyed() {
            return Err(PortError::InvalidState {
                port: self.info.name.clone(),
                state: PortState::Destroyed,
            });
        }
        if !candidate.ptr_eq(&self.buffer) {
            return Err(PortError::PolicyViolation {
                port: self.info.name.clone(),
                reason: "publish of a foreign buffer to a singleton port".into(),
            });
        }
        Ok(())
    }

    pub fn destroy(&self) {
        self.state.mark_destroyed();
    }
}

impl std::fmt::Debug for SingletonPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonPort")
            .field("name", &self.info.name)
            .field("state", &self.state.get())
            .finish()
    }
}
