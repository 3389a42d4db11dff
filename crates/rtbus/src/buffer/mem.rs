// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Flat memory buffer: fixed/resizable byte region.

use super::PortData;
use crate::codec::{BinaryReader, BinaryWriter, CodecResult};
use crate::registry::types::NULL_TYPE_UID;
use std::any::Any;

/// Resizable flat byte region.
///
/// No blocking mode exists for this shape; serialize/deserialize copy the
/// full extent. `clear` empties the region but keeps the allocation.
#[derive(Debug)]
pub struct MemBuffer {
    uid: i16,
    data: Vec<u8>,
}

impl MemBuffer {
    pub fn new() -> Self {
        Self {
            uid: NULL_TYPE_UID,
            data: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            uid: NULL_TYPE_UID,
            data: Vec::with_capacity(capacity),
        }
    }

    /// Resize to exactly `len` bytes, zero-filling any growth.
    pub fn resize(&mut self, len: usize) {
        self.data.resize(len, 0);
    }

    /// Replace content with `bytes`, reusing the allocation.
    pub fn copy_from(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }
}

impl Default for MemBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PortData for MemBuffer {
    fn type_uid(&self) -> i16 {
        self.uid
    }

    fn set_type_uid(&mut self, uid: i16) {
        self.uid = uid;
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> CodecResult<()> {
        writer.write_u32(self.data.len() as u32);
        writer.write_bytes(&self.data);
        Ok(())
    }

    fn deserialize(&mut self, reader: &mut BinaryReader<'_>) -> CodecResult<()> {
        let len = reader.read_u32()? as usize;
        let bytes = reader.read_bytes(len)?;
        self.copy_from(bytes);
        Ok(())
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl PartialEq for MemBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::TypeRegistry;
    use std::sync::Arc;

    #[test]
    fn roundtrip_is_byte_exact() {
        let registry = Arc::new(TypeRegistry::new());
        registry
            .register::<MemBuffer>("rtbus.MemBuffer", false)
            .expect("capacity");

        let mut original = MemBuffer::new();
        original.copy_from(&[0, 255, 17, 3]);

        let mut writer = BinaryWriter::new();
        original.serialize(&mut writer).expect("infallible sink");

        let bytes = writer.into_bytes();
        let mut reader = BinaryReader::new(&bytes, registry);
        let mut decoded = MemBuffer::new();
        decoded.deserialize(&mut reader).expect("well-formed");
        assert_eq!(decoded, original);
    }

    #[test]
    fn clear_keeps_capacity_and_uid() {
        let mut buffer = MemBuffer::new();
        buffer.set_type_uid(5);
        buffer.copy_from(&[1; 64]);
        let capacity = buffer.capacity();

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), capacity);
        assert_eq!(buffer.type_uid(), 5);
    }

    #[test]
    fn resize_zero_fills_growth() {
        let mut buffer = MemBuffer::new();
        buffer.copy_from(&[9, 9]);
        buffer.resize(4);
        assert_eq!(buffer.as_slice(), &[9, 9, 0, 0]);
        buffer.resize(1);
        assert_eq!(buffer.as_slice(), &[9]);
    }
}
