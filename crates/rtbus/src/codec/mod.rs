// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Binary codec for typed payloads.
//!
//! Wire format, little-endian throughout (fixed, not negotiable): every typed
//! object is encoded as an `i16` type uid followed immediately by the type's
//! own serialized bytes. Uid `-1` denotes an absent object; nothing follows
//! it. The payload encoding is self-describing per type and opaque to the
//! codec.
//!
//! # Protocol limitation
//!
//! There is no length prefix or skip envelope. A reader that resolves a uid
//! to no known type cannot skip the payload and must treat the stream as
//! unusable; the owning connection should be torn down. This is preserved
//! bit-compatibly from the original protocol rather than papered over.

mod reader;
mod writer;

pub use reader::{BinaryReader, ReadObject};
pub use writer::BinaryWriter;

use crate::registry::types::TypeEntry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Codec errors. All variants are fatal to the current (de)serialization
/// operation; none are retried or resynchronized.
#[derive(Debug, Clone)]
pub enum CodecError {
    /// Read past the end of the input buffer.
    ReadFailed { offset: usize, reason: String },
    /// Wire uid resolved to no known local type. Fatal: the format carries no
    /// skip length, so the remainder of the stream is unreadable.
    UnknownTypeUid { uid: i16 },
    /// A standard-typed payload was read but no buffer source is attached to
    /// the reader. Standard types can only be materialized from a pool.
    NoBufferSource { type_name: String },
    /// `write_typed` was handed a payload that never went through type
    /// registration (uid still at the null sentinel).
    UntypedPayload,
    /// Payload bytes violate the type's own encoding.
    InvalidData { reason: String },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::ReadFailed { offset, reason } => {
                write!(f, "read failed at offset {}: {}", offset, reason)
            }
            CodecError::UnknownTypeUid { uid } => {
                write!(f, "unresolvable type uid {} (no skip envelope, stream unusable)", uid)
            }
            CodecError::NoBufferSource { type_name } => {
                write!(f, "no buffer source configured for standard type '{}'", type_name)
            }
            CodecError::UntypedPayload => write!(f, "payload has no registered type"),
            CodecError::InvalidData { reason } => write!(f, "invalid data: {}", reason),
        }
    }
}

impl std::error::Error for CodecError {}

pub type CodecResult<T> = core::result::Result<T, CodecError>;

/// Deserialization container flavor for non-standard types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerMode {
    /// Reuse a per-thread scratch instance. Cheapest; the result must stay on
    /// the deserializing thread's side of the hand-off discipline.
    ThreadLocal,
    /// Fresh value-copy instance, safe to hand to another execution context.
    Interthread,
}

/// Remote-to-local type uid translation for one connection/session.
///
/// Wire uids are assigned independently by each process, so a connection
/// learns the remote side's table during handshake and attaches a translation
/// table to its readers. An absent table means "wire uids equal local uids"
/// (intra-process or homogeneous deployments).
pub struct TypeTranslationTable {
    map: RwLock<HashMap<i16, Arc<TypeEntry>>>,
}

impl TypeTranslationTable {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Bind a remote uid to a local type entry.
    pub fn set(&self, remote_uid: i16, entry: Arc<TypeEntry>) {
        self.map.write().insert(remote_uid, entry);
    }

    /// Resolve a remote uid. `None` means the remote type is unknown here.
    pub fn translate(&self, remote_uid: i16) -> Option<Arc<TypeEntry>> {
        self.map.read().get(&remote_uid).cloned()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Default for TypeTranslationTable {
    fn default() -> Self {
        Self::new()
    }
}
