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

//! Downstream interface to the Bluetooth radio stack.
//!
//! Everything here is fallible. The core wraps each call and decides whether a
//! failure becomes an absent result or propagates.

use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

use crate::error::PlatformError;

/// Platform device-type code as reported by the radio stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawDeviceType(pub u32);

impl RawDeviceType {
    pub const UNKNOWN: RawDeviceType = RawDeviceType(0);
    pub const CLASSIC: RawDeviceType = RawDeviceType(1);
    pub const LE: RawDeviceType = RawDeviceType(2);
    pub const DUAL: RawDeviceType = RawDeviceType(3);
}

/// A peripheral reported by an LE scan.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredPeripheral {
    pub address: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

/// Callback invoked once per advertisement, from a platform-owned task.
pub type ScanSink = Arc<dyn Fn(DiscoveredPeripheral) + Send + Sync>;

/// Byte stream usable as a port transport.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// A device known to the adapter.
#[async_trait]
pub trait RemoteDevice: Send + Sync {
    fn address(&self) -> String;

    async fn name(&self) -> Result<Option<String>, PlatformError>;

    async fn device_type(&self) -> Result<RawDeviceType, PlatformError>;

    /// Whether the device is part of the bonded set.
    async fn is_bonded(&self) -> Result<bool, PlatformError>;
}

/// An established LE link.
#[async_trait]
pub trait GattLink: Send + Sync {
    async fn disconnect(&self) -> Result<(), PlatformError>;
}

/// An open serial characteristic and the link carrying it.
pub struct GattSerial<R, W, L> {
    /// Notifications from the characteristic.
    pub reader: R,
    /// Write-without-response channel to the characteristic.
    pub writer: W,
    /// ATT MTU negotiated for writes.
    pub mtu: usize,
    pub link: L,
}

/// Server endpoint that yields inbound RFCOMM streams.
#[async_trait]
pub trait RfcommAcceptor: Send {
    type Stream: ByteStream;

    /// Wait for the next inbound connection. Returns the stream and the peer address.
    async fn accept(&mut self) -> io::Result<(Self::Stream, String)>;
}

/// The local Bluetooth adapter.
#[async_trait]
pub trait RadioAdapter: Send + Sync {
    type Device: RemoteDevice;
    type Stream: ByteStream;
    type Acceptor: RfcommAcceptor + 'static;
    type GattReader: AsyncRead + Send + Unpin + 'static;
    type GattWriter: AsyncWrite + Send + Unpin + 'static;
    type Link: GattLink + 'static;
    type Scan: Send;

    async fn is_enabled(&self) -> Result<bool, PlatformError>;

    async fn cancel_discovery(&self) -> Result<(), PlatformError>;

    /// Look up a device by address. `Ok(None)` when the adapter does not know it.
    async fn remote_device(&self, address: &str) -> Result<Option<Self::Device>, PlatformError>;

    /// The bonded set. `Ok(None)` when the platform has no answer.
    async fn bonded_devices(&self) -> Result<Option<Vec<Self::Device>>, PlatformError>;

    /// Open a client RFCOMM channel to the given service record.
    async fn connect_rfcomm(&self, device: &Self::Device, service: Uuid) -> io::Result<Self::Stream>;

    /// Register a server RFCOMM endpoint for the given service record.
    async fn listen_rfcomm(&self, service: Uuid) -> io::Result<Self::Acceptor>;

    /// Connect over GATT and open the serial characteristic for notify and write.
    ///
    /// A link brought up by this call is torn down again if the characteristic
    /// cannot be opened.
    async fn open_gatt_serial(
        &self,
        device: &Self::Device,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<GattSerial<Self::GattReader, Self::GattWriter, Self::Link>, PlatformError>;

    /// Start LE discovery. `Ok(None)` when the platform refused.
    async fn start_le_scan(&self, sink: ScanSink) -> Result<Option<Self::Scan>, PlatformError>;

    async fn stop_le_scan(&self, scan: Self::Scan) -> Result<(), PlatformError>;
}

/// Entry point into a radio stack.
#[async_trait]
pub trait BluetoothPlatform: Send + Sync {
    type Adapter: RadioAdapter;

    async fn default_adapter(&self) -> Result<Self::Adapter, PlatformError>;

    /// Whether the system advertises Bluetooth Low Energy support.
    async fn has_le_feature(&self, adapter: &Self::Adapter) -> bool;
}
