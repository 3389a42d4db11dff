// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Binary input stream with typed-object resolution.

use super::{CodecError, CodecResult, ContainerMode, TypeTranslationTable};
use crate::buffer::scratch::ScratchBuffer;
use crate::buffer::{scratch, BufferSource, PooledBuffer, PortData};
use crate::registry::types::{TypeEntry, TypeRegistry, NULL_TYPE_UID};
use std::sync::Arc;

/// Generate read methods for primitive types (eliminates code duplication).
///
/// Each generated method bounds-checks, reads N little-endian bytes and
/// advances the offset.
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> CodecResult<$type> {
            if self.offset + $size > self.buf.len() {
                return Err(CodecError::ReadFailed {
                    offset: self.offset,
                    reason: "unexpected end of buffer".into(),
                });
            }
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(&self.buf[self.offset..self.offset + $size]);
            self.offset += $size;
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// A typed object materialized by [`BinaryReader::read_typed`].
///
/// Standard types come out of a pool (recycled on drop); non-standard types
/// come out of a thread-local scratch pool.
pub enum ReadObject {
    Pooled(PooledBuffer),
    Scratch(ScratchBuffer),
}

impl core::fmt::Debug for ReadObject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ReadObject::Pooled(_) => f.write_str("ReadObject::Pooled"),
            ReadObject::Scratch(_) => f.write_str("ReadObject::Scratch"),
        }
    }
}

impl ReadObject {
    pub fn data(&self) -> &dyn PortData {
        match self {
            ReadObject::Pooled(buffer) => buffer.data(),
            ReadObject::Scratch(buffer) => buffer.data(),
        }
    }

    pub fn data_mut(&mut self) -> &mut dyn PortData {
        match self {
            ReadObject::Pooled(buffer) => buffer.data_mut(),
            ReadObject::Scratch(buffer) => buffer.data_mut(),
        }
    }

    pub fn type_uid(&self) -> i16 {
        self.data().type_uid()
    }

    pub fn downcast_ref<T: PortData>(&self) -> Option<&T> {
        self.data().as_any().downcast_ref()
    }
}

/// Deserializing input stream (little-endian) over a borrowed byte slice.
///
/// Type resolution order for wire uids: the attached
/// [`TypeTranslationTable`] if any, else the local [`TypeRegistry`] directly.
/// A buffer source must be attached before standard-typed payloads can be
/// read.
pub struct BinaryReader<'a> {
    buf: &'a [u8],
    offset: usize,
    registry: Arc<TypeRegistry>,
    translation: Option<Arc<TypeTranslationTable>>,
    buffer_source: Option<Arc<dyn BufferSource>>,
}

impl<'a> BinaryReader<'a> {
    pub fn new(buf: &'a [u8], registry: Arc<TypeRegistry>) -> Self {
        Self {
            buf,
            offset: 0,
            registry,
            translation: None,
            buffer_source: None,
        }
    }

    /// Attach a remote-to-local uid translation table (connection-scoped).
    #[must_use]
    pub fn with_translation(mut self, translation: Arc<TypeTranslationTable>) -> Self {
        self.translation = Some(translation);
        self
    }

    /// Attach the pool-backed source used to materialize standard types.
    #[must_use]
    pub fn with_buffer_source(mut self, source: Arc<dyn BufferSource>) -> Self {
        self.buffer_source = Some(source);
        self
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_i8, i8, 1);
    impl_read_le!(read_u16, u16, 2);
    impl_read_le!(read_i16, i16, 2);
    impl_read_le!(read_u32, u32, 4);
    impl_read_le!(read_i32, i32, 4);
    impl_read_le!(read_u64, u64, 8);
    impl_read_le!(read_i64, i64, 8);
    impl_read_le!(read_f32, f32, 4);
    impl_read_le!(read_f64, f64, 8);

    pub fn read_bool(&mut self) -> CodecResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Raw byte run of exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if self.offset + len > self.buf.len() {
            return Err(CodecError::ReadFailed {
                offset: self.offset,
                reason: "unexpected end of buffer".into(),
            });
        }
        let bytes = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    /// Counterpart of [`BinaryWriter::write_str`](super::BinaryWriter::write_str).
    pub fn read_str(&mut self) -> CodecResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidData {
            reason: "string payload is not valid UTF-8".into(),
        })
    }

    /// Read a 2-byte type uid and resolve it.
    ///
    /// `-1` yields `Ok(None)`. An unresolvable uid is fatal
    /// ([`CodecError::UnknownTypeUid`]): the format has no skip envelope, so
    /// the caller cannot recover the stream.
    pub fn read_type(&mut self) -> CodecResult<Option<Arc<TypeEntry>>> {
        let uid = self.read_i16()?;
        if uid == NULL_TYPE_UID {
            return Ok(None);
        }
        let entry = match &self.translation {
            Some(table) => table.translate(uid),
            None => self.registry.by_uid(uid),
        };
        match entry {
            Some(entry) => Ok(Some(entry)),
            None => Err(CodecError::UnknownTypeUid { uid }),
        }
    }

    /// Read a typed object: type tag, then the payload deserializes itself
    /// into a container chosen by the type's pool discipline.
    ///
    /// Standard types require an attached buffer source; non-standard types
    /// are materialized from the calling thread's scratch pool in the
    /// requested [`ContainerMode`].
    pub fn read_typed(&mut self, mode: ContainerMode) -> CodecResult<Option<ReadObject>> {
        let Some(entry) = self.read_type()? else {
            return Ok(None);
        };

        if entry.is_standard() {
            let source =
                self.buffer_source
                    .clone()
                    .ok_or_else(|| CodecError::NoBufferSource {
                        type_name: entry.name().to_owned(),
                    })?;
            let mut buffer = source.acquire(&entry);
            buffer.data_mut().deserialize(self)?;
            Ok(Some(ReadObject::Pooled(buffer)))
        } else {
            let mut buffer = scratch::acquire(&entry, mode);
            buffer.data_mut().deserialize(self)?;
            Ok(Some(ReadObject::Scratch(buffer)))
        }
    }

    /// Same-thread consumption flavor of [`read_typed`](Self::read_typed).
    pub fn read_object(&mut self) -> CodecResult<Option<ReadObject>> {
        self.read_typed(ContainerMode::ThreadLocal)
    }

    /// Cross-thread hand-off flavor: the returned container is a value copy
    /// safe to move to another execution context.
    pub fn read_object_in_interthread_container(&mut self) -> CodecResult<Option<ReadObject>> {
        self.read_typed(ContainerMode::Interthread)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }
}
