// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Port endpoints: the delivery-policy layer of the messaging core.
//!
//! Three variants share one lifecycle (`Created -> Connected(0..N) ->
//! Destroyed`, connections mutable while connected) and differ in delivery
//! policy:
//!
//! - [`StreamInputPort`]: queued, packet-callback driven.
//! - [`StreamOutputPort`]: push-only, pull-request-aware, scheduler-flushed.
//! - [`SingletonPort`]: one fixed buffer, guarded re-publish.
//!
//! Dynamically supplied behavior (packet processors, connection handlers,
//! pull handlers) is constructor-injected as trait objects; closures get
//! blanket implementations.

mod input;
mod output;
mod singleton;

pub use input::StreamInputPort;
pub use output::{StreamOutputPort, StreamOutputPortBuilder};
pub use singleton::SingletonPort;

use crate::buffer::{PooledBuffer, SharedBuffer};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Data-flow direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Port lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Created,
    Connected,
    Destroyed,
}

/// Externally supplied creation configuration.
///
/// Recognized options only; the ownership tree that hands this struct to a
/// port constructor lives outside the messaging core.
#[derive(Debug, Clone)]
pub struct PortCreationInfo {
    pub name: String,
    pub direction: Direction,
    pub queue_enabled: bool,
    /// Queue capacity; `None` means unbounded. Only meaningful with
    /// `queue_enabled`.
    pub queue_bound: Option<u32>,
    /// Enables a custom assignment policy (used by singleton ports).
    pub custom_assign: bool,
}

impl PortCreationInfo {
    pub fn new(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            direction,
            queue_enabled: false,
            queue_bound: None,
            custom_assign: false,
        }
    }

    /// Streaming input configuration: queueing enabled, unbounded.
    pub fn streaming_input(name: impl Into<String>) -> Self {
        let mut info = Self::new(name, Direction::Input);
        info.queue_enabled = true;
        info
    }

    /// Streaming output configuration: push-only, no queue.
    pub fn streaming_output(name: impl Into<String>) -> Self {
        Self::new(name, Direction::Output)
    }

    /// Singleton configuration: output direction with custom assignment.
    pub fn singleton(name: impl Into<String>) -> Self {
        let mut info = Self::new(name, Direction::Output);
        info.custom_assign = true;
        info
    }

    #[must_use]
    pub fn with_queue(mut self, bound: Option<u32>) -> Self {
        self.queue_enabled = true;
        self.queue_bound = bound;
        self
    }
}

/// Port operation errors. All variants indicate caller defects and are
/// surfaced immediately; none are retried.
#[derive(Debug, Clone)]
pub enum PortError {
    /// The port's assignment policy rejected the operation (e.g. publishing
    /// a foreign buffer to a singleton port).
    PolicyViolation { port: String, reason: String },
    /// Operation attempted in a lifecycle state that does not allow it.
    InvalidState { port: String, state: PortState },
    /// Creation info direction does not match the port variant.
    WrongDirection { port: String, expected: Direction },
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortError::PolicyViolation { port, reason } => {
                write!(f, "policy violation on port '{}': {}", port, reason)
            }
            PortError::InvalidState { port, state } => {
                write!(f, "port '{}' is in state {:?}", port, state)
            }
            PortError::WrongDirection { port, expected } => {
                write!(f, "port '{}' requires direction {:?}", port, expected)
            }
        }
    }
}

impl std::error::Error for PortError {}

/// Packet processor: invoked synchronously with every inbound buffer.
///
/// The return value decides whether the buffer is additionally enqueued for
/// later pull-style dequeue. Panics are caught by the port, logged, and
/// treated as "do not enqueue".
pub trait PacketProcessor: Send + Sync {
    fn process(&self, buffer: &SharedBuffer) -> bool;
}

impl<F> PacketProcessor for F
where
    F: Fn(&SharedBuffer) -> bool + Send + Sync,
{
    fn process(&self, buffer: &SharedBuffer) -> bool {
        self(buffer)
    }
}

/// Notified when a partner port connects.
pub trait ConnectionHandler: Send + Sync {
    fn on_connect(&self, partner: &str);
}

impl<F> ConnectionHandler for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_connect(&self, partner: &str) {
        self(partner)
    }
}

/// Supplies initial/introductory data to a newly pulling consumer.
///
/// Streaming data has no natural single "current value", so this is the
/// whole extent of pull support on streaming output ports.
pub trait PullRequestHandler: Send + Sync {
    fn pull(&self) -> Option<PooledBuffer>;
}

/// Atomic [`PortState`] cell shared by the port variants.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    const CREATED: u8 = 0;
    const CONNECTED: u8 = 1;
    const DESTROYED: u8 = 2;

    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(Self::CREATED))
    }

    pub(crate) fn get(&self) -> PortState {
        match self.0.load(Ordering::Acquire) {
            Self::CREATED => PortState::Created,
            Self::CONNECTED => PortState::Connected,
            _ => PortState::Destroyed,
        }
    }

    /// Created -> Connected. No effect once destroyed.
    pub(crate) fn mark_connected(&self) {
        let _ = self.0.compare_exchange(
            Self::CREATED,
            Self::CONNECTED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Any state -> Destroyed. Returns false if already destroyed.
    pub(crate) fn mark_destroyed(&self) -> bool {
        self.0.swap(Self::DESTROYED, Ordering::AcqRel) != Self::DESTROYED
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.0.load(Ordering::Acquire) == Self::DESTROYED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_info_presets() {
        let input = PortCreationInfo::streaming_input("in");
        assert_eq!(input.direction, Direction::Input);
        assert!(input.queue_enabled);
        assert_eq!(input.queue_bound, None);

        let output = PortCreationInfo::streaming_output("out");
        assert_eq!(output.direction, Direction::Output);
        assert!(!output.queue_enabled);

        let singleton = PortCreationInfo::singleton("one");
        assert!(singleton.custom_assign);

        let bounded = PortCreationInfo::streaming_input("in").with_queue(Some(8));
        assert_eq!(bounded.queue_bound, Some(8));
    }

    #[test]
    fn state_cell_transitions() {
        let state = StateCell::new();
        assert_eq!(state.get(), PortState::Created);

        state.mark_connected();
        assert_eq!(state.get(), PortState::Connected);

        assert!(state.mark_destroyed());
        assert!(!state.mark_destroyed(), "second destroy is a no-op");
        state.mark_connected();
        assert_eq!(state.get(), PortState::Destroyed, "destroyed is terminal");
    }
}
