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

//! Connection strategy selection.
//!
//! Picks the port implementation for a request and drives the attempt through
//! `Idle -> Resolving -> Connecting -> {Connected, Failed}`.
//!
//! Classic and server transport failures come back as
//! [`PortError::Transport`] for the caller to act on. GATT failures are
//! reported as [`PortError::Gatt`] and absorbed at the boundary: many HM-10
//! clones simply lack the serial characteristic.

use tracing::{error, info, warn};

use super::attempt::{AttemptState, ConnectionAttempt, ConnectionMode, ConnectionRequest};
use super::classifier::{resolve_bonded_device, resolve_device};
use super::constants::{HM10_SERIAL_UUID, HM10_SERVICE_UUID, SPP_UUID};
use super::context::AdapterContext;
use super::platform::RadioAdapter;
use crate::error::PortError;
use crate::port::{ClassicPort, GattPort, Port, ServerPort};

/// Connect according to `request.mode`.
pub async fn connect<A: RadioAdapter + 'static>(
    context: &AdapterContext<A>,
    request: ConnectionRequest,
) -> Result<Box<dyn Port>, PortError> {
    match request.mode {
        ConnectionMode::ClassicSpp => connect_classic(context, &request.address).await,
        ConnectionMode::LeHm10 => connect_le(context, &request.address).await,
        ConnectionMode::ServerListen => listen(context).await,
    }
}

/// Open an RFCOMM client channel to the SPP service of the bonded device at
/// `address`.
pub async fn connect_classic<A: RadioAdapter + 'static>(
    context: &AdapterContext<A>,
    address: &str,
) -> Result<Box<dyn Port>, PortError> {
    let mut attempt = ConnectionAttempt::new(ConnectionRequest::classic(address));

    let adapter = match context.adapter() {
        Some(adapter) => adapter,
        None => {
            attempt.fail();
            return Err(PortError::Unavailable);
        }
    };

    attempt.advance(AttemptState::Resolving);
    let device = match resolve_bonded_device(context, address).await {
        Ok(device) => device,
        Err(e) => {
            warn!("Classic connect to {} failed: {}", address, e);
            attempt.fail();
            return Err(e);
        }
    };

    attempt.advance(AttemptState::Connecting);
    match adapter.connect_rfcomm(&device, SPP_UUID).await {
        Ok(stream) => {
            attempt.advance(AttemptState::Connected);
            Ok(Box::new(ClassicPort::new(stream, address.to_string())))
        }
        Err(e) => {
            error!("RFCOMM connect to {} failed: {}", address, e);
            attempt.fail();
            Err(PortError::Transport(e))
        }
    }
}

/// Open an HM-10 serial link over GATT to `address`.
///
/// Unlike classic connects, the peripheral does not have to be bonded; any
/// device the adapter has seen, typically through an LE scan, is accepted.
pub async fn connect_le<A: RadioAdapter + 'static>(
    context: &AdapterContext<A>,
    address: &str,
) -> Result<Box<dyn Port>, PortError> {
    let mut attempt = ConnectionAttempt::new(ConnectionRequest::le(address));

    let adapter = match context.adapter() {
        Some(adapter) => adapter,
        None => {
            attempt.fail();
            return Err(PortError::Unavailable);
        }
    };
    if !context.supports_le() {
        warn!("LE connect to {} refused: no LE support", address);
        attempt.fail();
        return Err(PortError::Unsupported("Bluetooth Low Energy"));
    }

    attempt.advance(AttemptState::Resolving);
    let device = match resolve_device(context, address).await {
        Ok(device) => device,
        Err(e) => {
            warn!("LE connect to {} failed: {}", address, e);
            attempt.fail();
            return Err(e);
        }
    };

    attempt.advance(AttemptState::Connecting);
    match adapter
        .open_gatt_serial(&device, HM10_SERVICE_UUID, HM10_SERIAL_UUID)
        .await
    {
        Ok(serial) => {
            attempt.advance(AttemptState::Connected);
            Ok(Box::new(GattPort::new(serial, address.to_string())))
        }
        Err(e) => {
            warn!("HM-10 GATT link to {} failed: {}", address, e);
            attempt.fail();
            Err(PortError::Gatt(e.to_string()))
        }
    }
}

/// Register an RFCOMM server on the SPP service. The returned port accepts
/// one inbound connection.
pub async fn listen<A: RadioAdapter + 'static>(
    context: &AdapterContext<A>,
) -> Result<Box<dyn Port>, PortError> {
    let mut attempt = ConnectionAttempt::new(ConnectionRequest::listen());

    let adapter = match context.adapter() {
        Some(adapter) => adapter,
        None => {
            attempt.fail();
            return Err(PortError::Unavailable);
        }
    };

    attempt.advance(AttemptState::Connecting);
    match adapter.listen_rfcomm(SPP_UUID).await {
        Ok(acceptor) => {
            attempt.advance(AttemptState::Connected);
            info!("RFCOMM server registered for {}", SPP_UUID);
            Ok(Box::new(ServerPort::new(acceptor)))
        }
        Err(e) => {
            error!("RFCOMM server registration failed: {}", e);
            attempt.fail();
            Err(PortError::Transport(e))
        }
    }
}
