// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Crate-level error aggregation.
//!
//! Fault taxonomy: capacity errors (registry misconfiguration), protocol
//! errors (codec) and policy violations (ports) are all fatal to the
//! triggering operation and surface here as `Err`. Callback faults are NOT
//! errors in this sense — ports and the scheduler recover them locally
//! (warn log, skip) and they never reach a `Result`.

use crate::codec::CodecError;
use crate::port::PortError;
use crate::registry::RegistryError;
use std::fmt;

/// Umbrella error for operations that cross module boundaries.
#[derive(Debug)]
pub enum Error {
    /// Registry write beyond configured bounds: a configuration defect.
    Registry(RegistryError),
    /// Wire-format fault: the owning connection should be torn down.
    Codec(CodecError),
    /// Port lifecycle or assignment-policy violation: a caller defect.
    Port(PortError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Registry(err) => write!(f, "registry: {}", err),
            Error::Codec(err) => write!(f, "codec: {}", err),
            Error::Port(err) => write!(f, "port: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Registry(err) => Some(err),
            Error::Codec(err) => Some(err),
            Error::Port(err) => Some(err),
        }
    }
}

impl From<RegistryError> for Error {
    fn from(err: RegistryError) -> Self {
        Error::Registry(err)
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        Error::Codec(err)
    }
}

impl From<PortError> for Error {
    fn from(err: PortError) -> Self {
        Error::Port(err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
