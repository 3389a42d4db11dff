// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! # rtbus - typed, pool-backed publish/subscribe core
//!
//! Messaging core of a real-time control middleware: producers and consumers
//! exchange strongly typed binary payloads across process and network
//! boundaries, with zero-copy buffer reuse and bounded/unbounded delivery
//! queues. Built for robot-control workloads where many periodic producers
//! (sensors, controllers) feed many consumers with low latency and
//! predictable memory behavior.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rtbus::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! fn main() -> rtbus::Result<()> {
//!     let registry = Arc::new(TypeRegistry::new());
//!     let entry = registry.register::<MemBuffer>("demo.Frame", true)?;
//!     let pool = BufferPool::new(entry);
//!
//!     let scheduler = StreamScheduler::new(Duration::from_millis(5));
//!     scheduler.start();
//!
//!     let output = StreamOutputPort::builder(
//!         PortCreationInfo::streaming_output("sensors/frame"),
//!         Arc::clone(&pool),
//!     )
//!     .scheduler(&scheduler)
//!     .build()?;
//!
//!     let input = StreamInputPort::new(
//!         PortCreationInfo::streaming_input("control/frame"),
//!         Arc::new(|_buffer: &SharedBuffer| true),
//!     )?;
//!     output.connect_to(&input)?;
//!
//!     let mut buffer = output.get_unused_buffer();
//!     buffer.downcast_mut::<MemBuffer>().unwrap().copy_from(&[1, 2, 3]);
//!     output.commit(buffer)?;
//!
//!     input.process_packets();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                          Producers                           |
//! |  acquire buffer -> fill -> commit / defer_commit             |
//! +--------------------------------------------------------------+
//! |                        Port Variants                         |
//! |  StreamOutputPort | StreamInputPort | SingletonPort          |
//! +--------------------------------------------------------------+
//! |  Pooled Buffers (recycle, never free)  |  Commit Scheduler   |
//! +--------------------------------------------------------------+
//! |  Binary Codec (typed, uid-tagged)  |  Lock-Striped Registry  |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`StripedRegistry`] | Chunked index table, lock-free reads |
//! | [`TypeRegistry`] | Uid allocation and descriptor lookup |
//! | [`BinaryWriter`]/[`BinaryReader`] | Typed binary streams |
//! | [`BufferPool`] | Recycling pool, buffers never freed in steady state |
//! | [`StreamInputPort`] | Queued, packet-callback driven endpoint |
//! | [`StreamOutputPort`] | Push-only endpoint with deferred flush |
//! | [`SingletonPort`] | One fixed buffer, guarded re-publish |
//! | [`StreamScheduler`] | One periodic loop drives all deferred commits |

/// Pooled, recyclable payload containers (chunk and flat shapes).
pub mod buffer;
/// Binary serialization of uid-tagged typed payloads.
pub mod codec;
/// Crate-level error aggregation.
pub mod error;
/// Port endpoints: streaming input/output and singleton delivery policies.
pub mod port;
/// Lock-striped registry and the type registry built on it.
pub mod registry;
/// Periodic stream commit scheduler.
pub mod sched;

pub use buffer::{BufferPool, BufferSource, ChunkBuffer, MemBuffer, PooledBuffer, PoolSource, PortData, SharedBuffer};
pub use codec::{BinaryReader, BinaryWriter, CodecError, ContainerMode, ReadObject, TypeTranslationTable};
pub use error::{Error, Result};
pub use port::{
    ConnectionHandler, Direction, PacketProcessor, PortCreationInfo, PortError, PortState,
    PullRequestHandler, SingletonPort, StreamInputPort, StreamOutputPort,
};
pub use registry::types::{TypeDescriptor, TypeEntry, TypeRegistry, NULL_TYPE_UID};
pub use registry::{RegistryError, StripedRegistry};
pub use sched::{StreamScheduler, StreamTask, TaskId};

/// Convenience imports for applications.
pub mod prelude {
    pub use crate::buffer::{
        BufferPool, BufferSource, ChunkBuffer, MemBuffer, PooledBuffer, PoolSource, PortData,
        SharedBuffer,
    };
    pub use crate::codec::{BinaryReader, BinaryWriter, ContainerMode, TypeTranslationTable};
    pub use crate::error::{Error, Result};
    pub use crate::port::{
        Direction, PortCreationInfo, PortState, SingletonPort, StreamInputPort, StreamOutputPort,
    };
    pub use crate::registry::types::{TypeDescriptor, TypeRegistry};
    pub use crate::registry::StripedRegistry;
    pub use crate::sched::{StreamScheduler, StreamTask};
}
