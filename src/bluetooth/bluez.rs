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

//! BlueZ backend built on `bluer`.
//!
//! RFCOMM client and server channels go through BlueZ profile registration
//! keyed by service UUID, so no channel number has to be known up front.

use async_trait::async_trait;
use bluer::gatt::{CharacteristicReader, CharacteristicWriter};
use bluer::rfcomm::{Profile, ProfileHandle, Role};
use bluer::{Adapter, AdapterEvent, AddressType, Address, DiscoveryFilter, DiscoveryTransport, Session};
use futures::StreamExt;
use parking_lot::Mutex;
use pin_project_lite::pin_project;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::constants::RFCOMM_CHANNEL;
use super::platform::{
    BluetoothPlatform, DiscoveredPeripheral, GattLink, GattSerial, RadioAdapter, RawDeviceType,
    RemoteDevice, RfcommAcceptor, ScanSink,
};
use crate::error::PlatformError;

/// How long to wait for GATT services after connecting.
const SERVICE_RESOLVE_POLLS: u32 = 50;
const SERVICE_RESOLVE_INTERVAL: Duration = Duration::from_millis(100);

fn to_io(e: bluer::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

pin_project! {
    /// RFCOMM stream that keeps its BlueZ profile registered while open.
    pub struct RfcommLink {
        #[pin]
        stream: bluer::rfcomm::Stream,
        _profile: Option<ProfileHandle>,
    }
}

impl AsyncRead for RfcommLink {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.project().stream.poll_read(cx, buf)
    }
}

impl AsyncWrite for RfcommLink {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.project().stream.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().stream.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().stream.poll_shutdown(cx)
    }
}

/// A device known to BlueZ.
pub struct BluezDevice {
    device: bluer::Device,
}

#[async_trait]
impl RemoteDevice for BluezDevice {
    fn address(&self) -> String {
        self.device.address().to_string()
    }

    async fn name(&self) -> Result<Option<String>, PlatformError> {
        Ok(self.device.name().await?)
    }

    /// BlueZ reports an address type rather than a device type. An LE public
    /// address with a BR/EDR class of device is taken as dual mode.
    async fn device_type(&self) -> Result<RawDeviceType, PlatformError> {
        let address_type = self.device.address_type().await?;
        let class = self.device.class().await?;
        Ok(match (address_type, class) {
            (AddressType::BrEdr, _) => RawDeviceType::CLASSIC,
            (AddressType::LePublic, Some(_)) => RawDeviceType::DUAL,
            (AddressType::LePublic, None) | (AddressType::LeRandom, _) => RawDeviceType::LE,
            #[allow(unreachable_patterns)]
            _ => RawDeviceType::UNKNOWN,
        })
    }

    async fn is_bonded(&self) -> Result<bool, PlatformError> {
        Ok(self.device.is_paired().await?)
    }
}

/// LE link behind a GATT serial port.
pub struct BluezLink {
    device: bluer::Device,
}

#[async_trait]
impl GattLink for BluezLink {
    async fn disconnect(&self) -> Result<(), PlatformError> {
        debug!("Disconnecting LE link to {}", self.device.address());
        Ok(self.device.disconnect().await?)
    }
}

/// Server endpoint backed by a registered RFCOMM profile.
pub struct BluezAcceptor {
    profile: Option<ProfileHandle>,
}

#[async_trait]
impl RfcommAcceptor for BluezAcceptor {
    type Stream = RfcommLink;

    async fn accept(&mut self) -> io::Result<(RfcommLink, String)> {
        let profile = self
            .profile
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "server already accepted"))?;

        let request = profile
            .next()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "profile unregistered"))?;
        let peer = request.device().to_string();
        let stream = request.accept().map_err(to_io)?;

        // The profile moves into the link only once a connection is accepted
        Ok((
            RfcommLink {
                stream,
                _profile: self.profile.take(),
            },
            peer,
        ))
    }
}

/// Token for a running BlueZ discovery task.
#[derive(Debug)]
pub struct BluezScan(u64);

/// Running discovery tasks keyed by scan id. A task removes its own entry when
/// its event stream ends.
#[derive(Clone, Default)]
struct ScanTasks {
    tasks: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
    next_id: Arc<AtomicU64>,
}

impl ScanTasks {
    fn spawn<F>(&self, discovery: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = self.tasks.clone();
        // Held across the spawn so the task cannot remove its entry before it exists
        let mut table = self.tasks.lock();
        let handle = tokio::spawn(async move {
            discovery.await;
            tasks.lock().remove(&id);
        });
        table.insert(id, handle);
        id
    }

    fn stop(&self, id: u64) {
        if let Some(handle) = self.tasks.lock().remove(&id) {
            handle.abort();
        }
    }

    fn stop_all(&self) {
        for (_, handle) in self.tasks.lock().drain() {
            handle.abort();
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.tasks.lock().len()
    }
}

pub struct BluezAdapter {
    session: Session,
    adapter: Adapter,
    scans: ScanTasks,
}

impl BluezAdapter {
    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    async fn register_profile(&self, service: Uuid, role: Role) -> io::Result<ProfileHandle> {
        let channel = matches!(role, Role::Server).then_some(RFCOMM_CHANNEL);
        let profile = Profile {
            uuid: service,
            role: Some(role),
            channel,
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        self.session.register_profile(profile).await.map_err(to_io)
    }

    async fn wait_services_resolved(device: &bluer::Device) -> Result<(), PlatformError> {
        for _ in 0..SERVICE_RESOLVE_POLLS {
            if device.is_services_resolved().await? {
                return Ok(());
            }
            tokio::time::sleep(SERVICE_RESOLVE_INTERVAL).await;
        }
        Err(PlatformError::Other("GATT services not resolved".into()))
    }

    async fn open_characteristic(
        device: &bluer::Device,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(CharacteristicReader, CharacteristicWriter, usize), PlatformError> {
        Self::wait_services_resolved(device).await?;

        for remote_service in device.services().await? {
            if remote_service.uuid().await? != service {
                continue;
            }
            for remote_char in remote_service.characteristics().await? {
                if remote_char.uuid().await? != characteristic {
                    continue;
                }
                let writer = remote_char.write_io().await?;
                let reader = remote_char.notify_io().await?;
                let mtu = writer.mtu();
                debug!("Serial characteristic open (MTU {})", mtu);
                return Ok((reader, writer, mtu));
            }
            return Err(PlatformError::CharacteristicNotFound(characteristic));
        }
        Err(PlatformError::ServiceNotFound(service))
    }
}

#[async_trait]
impl RadioAdapter for BluezAdapter {
    type Device = BluezDevice;
    type Stream = RfcommLink;
    type Acceptor = BluezAcceptor;
    type GattReader = CharacteristicReader;
    type GattWriter = CharacteristicWriter;
    type Link = BluezLink;
    type Scan = BluezScan;

    async fn is_enabled(&self) -> Result<bool, PlatformError> {
        Ok(self.adapter.is_powered().await?)
    }

    async fn cancel_discovery(&self) -> Result<(), PlatformError> {
        // Dropping the discovery stream ends the BlueZ discovery session
        self.scans.stop_all();
        Ok(())
    }

    async fn remote_device(&self, address: &str) -> Result<Option<BluezDevice>, PlatformError> {
        let addr =
            Address::from_str(address).map_err(|_| PlatformError::InvalidAddress(address.to_string()))?;
        if !self.adapter.device_addresses().await?.contains(&addr) {
            return Ok(None);
        }
        Ok(Some(BluezDevice {
            device: self.adapter.device(addr)?,
        }))
    }

    async fn bonded_devices(&self) -> Result<Option<Vec<BluezDevice>>, PlatformError> {
        let mut devices = Vec::new();
        for addr in self.adapter.device_addresses().await? {
            let device = self.adapter.device(addr)?;
            if device.is_paired().await? {
                devices.push(BluezDevice { device });
            }
        }
        Ok(Some(devices))
    }

    async fn connect_rfcomm(&self, device: &BluezDevice, service: Uuid) -> io::Result<RfcommLink> {
        let mut profile = self.register_profile(service, Role::Client).await?;
        debug!("Connecting {} to {}", device.address(), service);

        let connect = device.device.connect_profile(&service);
        tokio::pin!(connect);
        // BlueZ may deliver the connection before connect_profile returns
        let early = tokio::select! {
            res = &mut connect => {
                res.map_err(to_io)?;
                None
            }
            req = profile.next() => Some(req),
        };
        let request = match early {
            Some(req) => req,
            None => profile.next().await,
        };
        let request = request
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionAborted, "profile unregistered"))?;
        let stream = request.accept().map_err(to_io)?;

        Ok(RfcommLink {
            stream,
            _profile: Some(profile),
        })
    }

    async fn listen_rfcomm(&self, service: Uuid) -> io::Result<BluezAcceptor> {
        let profile = self.register_profile(service, Role::Server).await?;
        info!("RFCOMM server profile registered on channel {}", RFCOMM_CHANNEL);
        Ok(BluezAcceptor {
            profile: Some(profile),
        })
    }

    async fn open_gatt_serial(
        &self,
        device: &BluezDevice,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<GattSerial<CharacteristicReader, CharacteristicWriter, BluezLink>, PlatformError> {
        let device = &device.device;
        let made_link = !device.is_connected().await?;
        if made_link {
            info!("Connecting to {}...", device.address());
            device.connect().await?;
        }

        match Self::open_characteristic(device, service, characteristic).await {
            Ok((reader, writer, mtu)) => Ok(GattSerial {
                reader,
                writer,
                mtu,
                link: BluezLink {
                    device: device.clone(),
                },
            }),
            Err(e) => {
                if made_link {
                    if let Err(de) = device.disconnect().await {
                        warn!("Failed to disconnect {}: {}", device.address(), de);
                    }
                }
                Err(e)
            }
        }
    }

    async fn start_le_scan(&self, sink: ScanSink) -> Result<Option<BluezScan>, PlatformError> {
        self.adapter
            .set_discovery_filter(DiscoveryFilter {
                transport: DiscoveryTransport::Le,
                ..Default::default()
            })
            .await?;
        let events = self.adapter.discover_devices().await?;
        let adapter = self.adapter.clone();

        let id = self.scans.spawn(async move {
            futures::pin_mut!(events);
            while let Some(event) = events.next().await {
                let AdapterEvent::DeviceAdded(addr) = event else {
                    continue;
                };
                let device = match adapter.device(addr) {
                    Ok(device) => device,
                    Err(e) => {
                        warn!("Discovered device {} vanished: {}", addr, e);
                        continue;
                    }
                };
                sink(DiscoveredPeripheral {
                    address: addr.to_string(),
                    name: device.name().await.ok().flatten(),
                    rssi: device.rssi().await.ok().flatten(),
                });
            }
            debug!("Discovery stream ended");
        });
        Ok(Some(BluezScan(id)))
    }

    async fn stop_le_scan(&self, scan: BluezScan) -> Result<(), PlatformError> {
        self.scans.stop(scan.0);
        Ok(())
    }
}

/// Linux platform entry point.
pub struct BluezPlatform {
    le_enabled: bool,
}

impl BluezPlatform {
    /// `le_enabled` gates LE scanning and HM-10 connections.
    pub fn new(le_enabled: bool) -> Self {
        Self { le_enabled }
    }
}

#[async_trait]
impl BluetoothPlatform for BluezPlatform {
    type Adapter = BluezAdapter;

    async fn default_adapter(&self) -> Result<BluezAdapter, PlatformError> {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());
        Ok(BluezAdapter {
            session,
            adapter,
            scans: ScanTasks::default(),
        })
    }

    async fn has_le_feature(&self, _adapter: &BluezAdapter) -> bool {
        self.le_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_finished_scan_leaves_table() {
        let scans = ScanTasks::default();
        scans.spawn(async {});
        assert_eq!(scans.len(), 1);

        for _ in 0..100 {
            if scans.len() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(scans.len(), 0);
    }

    #[tokio::test]
    async fn test_stop_scans() {
        let scans = ScanTasks::default();
        let first = scans.spawn(futures::future::pending::<()>());
        let second = scans.spawn(futures::future::pending::<()>());
        assert_ne!(first, second);
        assert_eq!(scans.len(), 2);

        scans.stop(first);
        assert_eq!(scans.len(), 1);
        // Stopping twice is harmless
        scans.stop(first);

        scans.stop_all();
        assert_eq!(scans.len(), 0);
    }
}
