// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for port construction.

use std::io;
use thiserror::Error;

/// Why a Bluetooth operation did not produce a result.
#[derive(Debug, Error)]
pub enum PortError {
    /// No adapter present or usable.
    #[error("Bluetooth adapter unavailable")]
    Unavailable,

    /// The address does not resolve to a known device.
    #[error("device not found: {0}")]
    NotFound(String),

    /// The operation needs a capability the platform lacks.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// RFCOMM channel or server socket setup failed after resolution.
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    /// GATT connection or HM-10 characteristic discovery failed.
    #[error("GATT failure: {0}")]
    Gatt(String),

    /// A platform query (lookup, bonded set, enabled state) failed.
    #[error("platform error: {0}")]
    Platform(String),
}

impl PortError {
    /// Whether this failure is reported as an absent result rather than
    /// handed back to the caller.
    ///
    /// Only classic and server transport failures propagate.
    pub fn is_absorbed(&self) -> bool {
        !matches!(self, PortError::Transport(_))
    }

    /// Convert into the boundary form: `Ok(None)` for absorbed failures,
    /// `Err` for propagated ones.
    pub fn into_boundary<T>(self) -> io::Result<Option<T>> {
        match self {
            PortError::Transport(e) => Err(e),
            _ => Ok(None),
        }
    }
}

/// Failure reported by the downstream platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("BlueZ error: {0}")]
    Bluer(#[from] bluer::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("service {0} not found")]
    ServiceNotFound(uuid::Uuid),

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(uuid::Uuid),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<PlatformError> for PortError {
    fn from(e: PlatformError) -> Self {
        PortError::Platform(e.to_string())
    }
}
