// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Binary output stream over a growable byte sink.

use super::{CodecError, CodecResult};
use crate::buffer::PortData;
use crate::registry::types::{TypeDescriptor, NULL_TYPE_UID};

/// Generate write methods for primitive types (eliminates code duplication).
///
/// Each generated method converts the value with `to_le_bytes()` and appends
/// it to the sink. The sink is growable, so primitive writes are infallible.
macro_rules! impl_write_le {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) {
            self.buf.extend_from_slice(&value.to_le_bytes());
        }
    };
}

/// Serializing output stream (little-endian).
///
/// Primitive writes append to an internal `Vec<u8>`;
/// [`write_typed`](Self::write_typed) prefixes polymorphic payloads with their 2-byte type
/// uid.
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    impl_write_le!(write_u8, u8);
    impl_write_le!(write_i8, i8);
    impl_write_le!(write_u16, u16);
    impl_write_le!(write_i16, i16);
    impl_write_le!(write_u32, u32);
    impl_write_le!(write_i32, i32);
    impl_write_le!(write_u64, u64);
    impl_write_le!(write_i64, i64);
    impl_write_le!(write_f32, f32);
    impl_write_le!(write_f64, f64);

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Raw bytes, no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// UTF-8 string as `u32` byte length + bytes.
    pub fn write_str(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Just the type tag: the descriptor's uid, or `-1` for none.
    pub fn write_type(&mut self, descriptor: Option<&TypeDescriptor>) {
        match descriptor {
            Some(descriptor) => self.write_i16(descriptor.uid()),
            None => self.write_i16(NULL_TYPE_UID),
        }
    }

    /// Typed object: `-1` sentinel for none, otherwise the payload's type uid
    /// followed by its self-serialization.
    pub fn write_typed(&mut self, object: Option<&dyn PortData>) -> CodecResult<()> {
        match object {
            None => {
                self.write_i16(NULL_TYPE_UID);
                Ok(())
            }
            Some(object) => {
                let uid = object.type_uid();
                if uid == NULL_TYPE_UID {
                    return Err(CodecError::UntypedPayload);
                }
                self.write_i16(uid);
                object.serialize(self)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Reset for reuse, retaining the allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_little_endian() {
        let mut writer = BinaryWriter::new();
        writer.write_u16(0x1234);
        writer.write_i16(-1);
        writer.write_u32(0xDEAD_BEEF);
        assert_eq!(
            writer.as_slice(),
            &[0x34, 0x12, 0xFF, 0xFF, 0xEF, 0xBE, 0xAD, 0xDE]
        );
    }

    #[test]
    fn string_is_length_prefixed() {
        let mut writer = BinaryWriter::new();
        writer.write_str("ab");
        assert_eq!(writer.as_slice(), &[2, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn none_typed_object_is_null_sentinel() {
        let mut writer = BinaryWriter::new();
        writer.write_typed(None).expect("sentinel always writable");
        writer.write_type(None);
        assert_eq!(writer.as_slice(), &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn untyped_payload_is_rejected() {
        // A buffer constructed directly (not via a TypeEntry factory) carries
        // the null uid and must not be written as a typed object.
        let buffer = crate::buffer::MemBuffer::default();
        let mut writer = BinaryWriter::new();
        let err = writer.write_typed(Some(&buffer)).expect_err("no uid");
        assert!(matches!(err, CodecError::UntypedPayload));
    }
}
