// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Streaming chunk buffer: append-oriented payload with blocking readers.
//!
//! Models a producer writing a packet incrementally while consumers drain it
//! concurrently. A [`ChunkReader`] in blocking mode suspends past the
//! writer's current append position until more data arrives or the writer
//! closes the chunk. This is the only suspension point in the messaging
//! core.

use super::PortData;
use crate::codec::{BinaryReader, BinaryWriter, CodecResult};
use crate::registry::types::NULL_TYPE_UID;
use parking_lot::{Condvar, Mutex};
use std::any::Any;

struct ChunkState {
    data: Vec<u8>,
    closed: bool,
}

/// Growable append-only byte chunk with interior synchronization.
///
/// Appends and reads take a short internal lock; only a blocking read may
/// suspend. Shared consumers access the chunk through `&self`, which is what
/// lets a [`SharedBuffer`](super::SharedBuffer) holder keep appending while
/// the buffer is already published.
pub struct ChunkBuffer {
    uid: i16,
    state: Mutex<ChunkState>,
    appended: Condvar,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self {
            uid: NULL_TYPE_UID,
            state: Mutex::new(ChunkState {
                data: Vec::new(),
                closed: false,
            }),
            appended: Condvar::new(),
        }
    }

    /// Append bytes and wake blocked readers. Appends after
    /// [`close`](Self::close) are a producer defect: logged and ignored.
    pub fn append(&self, bytes: &[u8]) {
        let mut state = self.state.lock();
        if state.closed {
            log::warn!("append of {} bytes to closed chunk buffer ignored", bytes.len());
            return;
        }
        state.data.extend_from_slice(bytes);
        drop(state);
        self.appended.notify_all();
    }

    /// Mark the chunk complete; blocked readers drain the remainder and then
    /// observe end-of-chunk.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.appended.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().data.is_empty()
    }

    /// Copy of the bytes appended so far.
    pub fn snapshot(&self) -> Vec<u8> {
        self.state.lock().data.clone()
    }

    /// Reader that suspends until data past its position is appended or the
    /// chunk is closed.
    pub fn blocking_reader(&self) -> ChunkReader<'_> {
        ChunkReader {
            chunk: self,
            position: 0,
        }
    }
}

impl Default for ChunkBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PortData for ChunkBuffer {
    fn type_uid(&self) -> i16 {
        self.uid
    }

    fn set_type_uid(&mut self, uid: i16) {
        self.uid = uid;
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> CodecResult<()> {
        let state = self.state.lock();
        writer.write_u32(state.data.len() as u32);
        writer.write_bytes(&state.data);
        writer.write_bool(state.closed);
        Ok(())
    }

    fn deserialize(&mut self, reader: &mut BinaryReader<'_>) -> CodecResult<()> {
        let len = reader.read_u32()? as usize;
        let bytes = reader.read_bytes(len)?;
        let closed = reader.read_bool()?;
        {
            let mut state = self.state.lock();
            state.data.clear();
            state.data.extend_from_slice(bytes);
            state.closed = closed;
        }
        self.appended.notify_all();
        Ok(())
    }

    fn clear(&mut self) {
        let mut state = self.state.lock();
        state.data.clear();
        state.closed = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl PartialEq for ChunkBuffer {
    fn eq(&self, other: &Self) -> bool {
        let a = self.state.lock();
        let b = other.state.lock();
        a.data == b.data && a.closed == b.closed
    }
}

impl std::fmt::Debug for ChunkBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ChunkBuffer")
            .field("uid", &self.uid)
            .field("len", &state.data.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// Sequential reader over a [`ChunkBuffer`].
pub struct ChunkReader<'a> {
    chunk: &'a ChunkBuffer,
    position: usize,
}

impl ChunkReader<'_> {
    /// Read into `out`, suspending while no data past the current position
    /// exists and the chunk is still open.
    ///
    /// Returns the number of bytes read; `0` means the chunk is closed and
    /// fully drained.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        if out.is_empty() {
            return 0;
        }
        let mut state = self.chunk.state.lock();
        loop {
            let available = state.data.len().saturating_sub(self.position);
            if available > 0 {
                let n = available.min(out.len());
                out[..n].copy_from_slice(&state.data[self.position..self.position + n]);
                self.position += n;
                return n;
            }
            if state.closed {
                return 0;
            }
            self.chunk.appended.wait(&mut state);
        }
    }

    /// Non-blocking variant: `None` when no new data is available yet.
    pub fn try_read(&mut self, out: &mut [u8]) -> Option<usize> {
        let state = self.chunk.state.lock();
        let available = state.data.len().saturating_sub(self.position);
        if available == 0 {
            return if state.closed { Some(0) } else { None };
        }
        let n = available.min(out.len());
        out[..n].copy_from_slice(&state.data[self.position..self.position + n]);
        self.position += n;
        Some(n)
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn reader_blocks_until_append_then_drains() {
        let chunk = Arc::new(ChunkBuffer::new());

        let consumer = {
            let chunk = Arc::clone(&chunk);
            thread::spawn(move || {
                let mut reader = chunk.blocking_reader();
                let mut collected = Vec::new();
                let mut scratch = [0u8; 8];
                loop {
                    let n = reader.read(&mut scratch);
                    if n == 0 {
                        break;
                    }
                    collected.extend_from_slice(&scratch[..n]);
                }
                collected
            })
        };

        // Writer appends incrementally, then closes.
        thread::sleep(Duration::from_millis(20));
        chunk.append(&[1, 2, 3]);
        thread::sleep(Duration::from_millis(20));
        chunk.append(&[4, 5]);
        chunk.close();

        let collected = consumer.join().expect("consumer thread");
        assert_eq!(collected, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn close_wakes_blocked_reader_with_eof() {
        let chunk = Arc::new(ChunkBuffer::new());
        let consumer = {
            let chunk = Arc::clone(&chunk);
            thread::spawn(move || {
                let mut reader = chunk.blocking_reader();
                let mut scratch = [0u8; 4];
                reader.read(&mut scratch)
            })
        };

        thread::sleep(Duration::from_millis(20));
        chunk.close();
        assert_eq!(consumer.join().expect("consumer thread"), 0);
    }

    #[test]
    fn try_read_never_blocks() {
        let chunk = ChunkBuffer::new();
        let mut reader = chunk.blocking_reader();
        let mut scratch = [0u8; 4];

        assert_eq!(reader.try_read(&mut scratch), None, "open and empty");
        chunk.append(&[7, 8]);
        assert_eq!(reader.try_read(&mut scratch), Some(2));
        assert_eq!(&scratch[..2], &[7, 8]);
        chunk.close();
        assert_eq!(reader.try_read(&mut scratch), Some(0), "closed and drained");
    }

    #[test]
    fn append_after_close_is_ignored() {
        let chunk = ChunkBuffer::new();
        chunk.append(&[1]);
        chunk.close();
        chunk.append(&[2, 3]);
        assert_eq!(chunk.snapshot(), vec![1]);
    }

    #[test]
    fn clear_reopens_and_empties() {
        let mut chunk = ChunkBuffer::new();
        chunk.set_type_uid(3);
        chunk.append(&[1, 2]);
        chunk.close();

        chunk.clear();
        assert!(chunk.is_empty());
        assert!(!chunk.is_closed());
        assert_eq!(chunk.type_uid(), 3, "clear keeps the type attachment");
    }
}
