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

//! Lifecycle of a single connection attempt.

use std::fmt;
use tracing::{debug, warn};

/// How the caller wants to reach the remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// RFCOMM client on the Serial Port Profile.
    ClassicSpp,
    /// GATT serial emulation on an HM-10 style module.
    LeHm10,
    /// RFCOMM server waiting for one inbound connection.
    ServerListen,
}

impl ConnectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMode::ClassicSpp => "classic SPP",
            ConnectionMode::LeHm10 => "LE HM-10",
            ConnectionMode::ServerListen => "server",
        }
    }
}

/// A connection request, consumed by the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    /// Remote address. Ignored for [`ConnectionMode::ServerListen`].
    pub address: String,
    pub mode: ConnectionMode,
}

impl ConnectionRequest {
    pub fn classic(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            mode: ConnectionMode::ClassicSpp,
        }
    }

    pub fn le(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            mode: ConnectionMode::LeHm10,
        }
    }

    pub fn listen() -> Self {
        Self {
            address: String::new(),
            mode: ConnectionMode::ServerListen,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Resolving,
    Connecting,
    Connected,
    Failed,
}

impl AttemptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Idle => "Idle",
            AttemptState::Resolving => "Resolving",
            AttemptState::Connecting => "Connecting...",
            AttemptState::Connected => "Connected",
            AttemptState::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Connected | AttemptState::Failed)
    }

    fn can_advance_to(&self, next: AttemptState) -> bool {
        use AttemptState::*;
        match (self, next) {
            (Idle, Resolving) | (Resolving, Connecting) | (Connecting, Connected) => true,
            // Server attempts have nothing to resolve
            (Idle, Connecting) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the state of one attempt. Not shared; dropped when the attempt ends.
#[derive(Debug)]
pub struct ConnectionAttempt {
    request: ConnectionRequest,
    state: AttemptState,
}

impl ConnectionAttempt {
    pub fn new(request: ConnectionRequest) -> Self {
        Self {
            request,
            state: AttemptState::Idle,
        }
    }

    pub fn request(&self) -> &ConnectionRequest {
        &self.request
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// Move to `next`. Returns false and stays put on an illegal transition.
    pub fn advance(&mut self, next: AttemptState) -> bool {
        if !self.state.can_advance_to(next) {
            warn!(
                "{} attempt {}: rejected transition {} -> {}",
                self.request.mode.as_str(),
                self.request.address,
                self.state,
                next
            );
            return false;
        }
        debug!(
            "{} attempt {}: {} -> {}",
            self.request.mode.as_str(),
            self.request.address,
            self.state,
            next
        );
        self.state = next;
        true
    }

    pub fn fail(&mut self) {
        self.advance(AttemptState::Failed);
    }
}
