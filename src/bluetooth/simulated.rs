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

//! In-memory radio stack.
//!
//! Devices, failures and inbound connections are scripted by the caller. Every
//! connection hands out one end of a `tokio::io::duplex` pipe and keeps the
//! other end so the remote side can be driven from outside.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::platform::{
    BluetoothPlatform, DiscoveredPeripheral, GattLink, GattSerial, RadioAdapter, RawDeviceType,
    RemoteDevice, RfcommAcceptor, ScanSink,
};
use crate::error::PlatformError;

const PIPE_SIZE: usize = 4096;

#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    address: String,
    name: Option<String>,
    raw_type: RawDeviceType,
    bonded: bool,
}

impl SimulatedDevice {
    pub fn new(address: &str, name: Option<&str>, raw_type: RawDeviceType) -> Self {
        Self {
            address: address.to_string(),
            name: name.map(str::to_string),
            raw_type,
            bonded: true,
        }
    }

    pub fn classic(address: &str, name: Option<&str>) -> Self {
        Self::new(address, name, RawDeviceType::CLASSIC)
    }

    pub fn le(address: &str, name: Option<&str>) -> Self {
        Self::new(address, name, RawDeviceType::LE)
    }

    /// Known to the adapter but not part of the bonded set.
    pub fn unbonded(mut self) -> Self {
        self.bonded = false;
        self
    }
}

#[async_trait]
impl RemoteDevice for SimulatedDevice {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn name(&self) -> Result<Option<String>, PlatformError> {
        Ok(self.name.clone())
    }

    async fn device_type(&self) -> Result<RawDeviceType, PlatformError> {
        Ok(self.raw_type)
    }

    async fn is_bonded(&self) -> Result<bool, PlatformError> {
        Ok(self.bonded)
    }
}

/// Remote ends of an open GATT serial link.
pub struct GattRemote {
    /// Bytes written here arrive as notifications on the port.
    pub notify: DuplexStream,
    /// Bytes the port writes to the characteristic.
    pub written: DuplexStream,
}

#[derive(Default)]
struct Inner {
    devices: Vec<SimulatedDevice>,
    disabled: bool,
    fail_enabled_query: bool,
    fail_cancel_discovery: bool,
    fail_lookups: bool,
    fail_bonded_query: bool,
    no_bonded_answer: bool,
    rfcomm_error: Option<io::ErrorKind>,
    listen_error: Option<io::ErrorKind>,
    gatt_error: Option<String>,
    refuse_scan: bool,
    rfcomm_remotes: HashMap<String, DuplexStream>,
    gatt_remotes: HashMap<String, GattRemote>,
    le_links: HashSet<String>,
    server_tx: Option<mpsc::UnboundedSender<(DuplexStream, String)>>,
    scans: HashMap<u64, ScanSink>,
    next_scan: u64,
    discovery_cancels: usize,
}

/// Scripted adapter. Clones share state.
#[derive(Clone, Default)]
pub struct SimulatedAdapter {
    inner: Arc<Mutex<Inner>>,
    calls: Arc<AtomicUsize>,
}

impl SimulatedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, device: SimulatedDevice) {
        let mut inner = self.inner.lock();
        inner.devices.retain(|d| d.address != device.address);
        inner.devices.push(device);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.lock().disabled = !enabled;
    }

    pub fn fail_enabled_query(&self) {
        self.inner.lock().fail_enabled_query = true;
    }

    pub fn fail_cancel_discovery(&self) {
        self.inner.lock().fail_cancel_discovery = true;
    }

    pub fn fail_lookups(&self) {
        self.inner.lock().fail_lookups = true;
    }

    pub fn fail_bonded_query(&self) {
        self.inner.lock().fail_bonded_query = true;
    }

    /// The bonded-set query returns no answer at all.
    pub fn withhold_bonded_set(&self) {
        self.inner.lock().no_bonded_answer = true;
    }

    pub fn fail_rfcomm(&self, kind: io::ErrorKind) {
        self.inner.lock().rfcomm_error = Some(kind);
    }

    pub fn fail_listen(&self, kind: io::ErrorKind) {
        self.inner.lock().listen_error = Some(kind);
    }

    /// Fail GATT setup after the LE link is up.
    pub fn fail_gatt(&self, reason: &str) {
        self.inner.lock().gatt_error = Some(reason.to_string());
    }

    pub fn refuse_scan(&self) {
        self.inner.lock().refuse_scan = true;
    }

    /// Number of platform calls made through the `RadioAdapter` interface.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn discovery_cancels(&self) -> usize {
        self.inner.lock().discovery_cancels
    }

    pub fn active_scans(&self) -> usize {
        self.inner.lock().scans.len()
    }

    /// Remote end of the last RFCOMM client channel opened to `address`.
    pub fn take_rfcomm_remote(&self, address: &str) -> Option<DuplexStream> {
        self.inner.lock().rfcomm_remotes.remove(address)
    }

    /// Remote ends of the last GATT serial link opened to `address`.
    pub fn take_gatt_remote(&self, address: &str) -> Option<GattRemote> {
        self.inner.lock().gatt_remotes.remove(address)
    }

    /// Bring up an LE link to `address` outside of any port.
    pub fn connect_le_link(&self, address: &str) {
        self.inner.lock().le_links.insert(address.to_string());
    }

    pub fn is_le_connected(&self, address: &str) -> bool {
        self.inner.lock().le_links.contains(address)
    }

    /// Deliver an inbound connection to the registered server endpoint.
    /// Returns the remote end, or `None` if nothing is listening.
    pub fn connect_inbound(&self, peer: &str) -> Option<DuplexStream> {
        let tx = self.inner.lock().server_tx.clone()?;
        let (local, remote) = tokio::io::duplex(PIPE_SIZE);
        tx.send((local, peer.to_string())).ok()?;
        Some(remote)
    }

    /// Report an advertisement to every active scan.
    pub fn advertise(&self, peripheral: DiscoveredPeripheral) {
        let sinks: Vec<ScanSink> = self.inner.lock().scans.values().cloned().collect();
        for sink in sinks {
            sink(peripheral.clone());
        }
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct SimulatedAcceptor {
    incoming: mpsc::UnboundedReceiver<(DuplexStream, String)>,
}

#[async_trait]
impl RfcommAcceptor for SimulatedAcceptor {
    type Stream = DuplexStream;

    async fn accept(&mut self) -> io::Result<(DuplexStream, String)> {
        self.incoming
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "server endpoint unregistered"))
    }
}

/// LE link handed out with a GATT serial port.
pub struct SimulatedLink {
    inner: Arc<Mutex<Inner>>,
    address: String,
}

#[async_trait]
impl GattLink for SimulatedLink {
    async fn disconnect(&self) -> Result<(), PlatformError> {
        self.inner.lock().le_links.remove(&self.address);
        Ok(())
    }
}

/// Token for a running simulated scan.
#[derive(Debug)]
pub struct SimulatedScan(u64);

#[async_trait]
impl RadioAdapter for SimulatedAdapter {
    type Device = SimulatedDevice;
    type Stream = DuplexStream;
    type Acceptor = SimulatedAcceptor;
    type GattReader = DuplexStream;
    type GattWriter = DuplexStream;
    type Link = SimulatedLink;
    type Scan = SimulatedScan;

    async fn is_enabled(&self) -> Result<bool, PlatformError> {
        self.record_call();
        let inner = self.inner.lock();
        if inner.fail_enabled_query {
            return Err(PlatformError::Other("enabled-state query failed".into()));
        }
        Ok(!inner.disabled)
    }

    async fn cancel_discovery(&self) -> Result<(), PlatformError> {
        self.record_call();
        let mut inner = self.inner.lock();
        if inner.fail_cancel_discovery {
            return Err(PlatformError::Other("cancel discovery failed".into()));
        }
        inner.discovery_cancels += 1;
        Ok(())
    }

    async fn remote_device(&self, address: &str) -> Result<Option<SimulatedDevice>, PlatformError> {
        self.record_call();
        let inner = self.inner.lock();
        if inner.fail_lookups {
            return Err(PlatformError::Other(format!("lookup of {} failed", address)));
        }
        Ok(inner.devices.iter().find(|d| d.address == address).cloned())
    }

    async fn bonded_devices(&self) -> Result<Option<Vec<SimulatedDevice>>, PlatformError> {
        self.record_call();
        let inner = self.inner.lock();
        if inner.fail_bonded_query {
            return Err(PlatformError::Other("bonded-set query failed".into()));
        }
        if inner.no_bonded_answer {
            return Ok(None);
        }
        Ok(Some(inner.devices.iter().filter(|d| d.bonded).cloned().collect()))
    }

    async fn connect_rfcomm(&self, device: &SimulatedDevice, _service: Uuid) -> io::Result<DuplexStream> {
        self.record_call();
        let mut inner = self.inner.lock();
        if let Some(kind) = inner.rfcomm_error {
            return Err(io::Error::new(kind, format!("RFCOMM connect to {} failed", device.address)));
        }
        let (local, remote) = tokio::io::duplex(PIPE_SIZE);
        inner.rfcomm_remotes.insert(device.address.clone(), remote);
        Ok(local)
    }

    async fn listen_rfcomm(&self, _service: Uuid) -> io::Result<SimulatedAcceptor> {
        self.record_call();
        let mut inner = self.inner.lock();
        if let Some(kind) = inner.listen_error {
            return Err(io::Error::new(kind, "RFCOMM server registration failed"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        inner.server_tx = Some(tx);
        Ok(SimulatedAcceptor { incoming: rx })
    }

    async fn open_gatt_serial(
        &self,
        device: &SimulatedDevice,
        _service: Uuid,
        characteristic: Uuid,
    ) -> Result<GattSerial<DuplexStream, DuplexStream, SimulatedLink>, PlatformError> {
        self.record_call();
        let mut inner = self.inner.lock();
        let made_link = inner.le_links.insert(device.address.clone());

        let failure = match &inner.gatt_error {
            Some(reason) => Some(PlatformError::Other(reason.clone())),
            None if device.raw_type == RawDeviceType::CLASSIC => {
                Some(PlatformError::CharacteristicNotFound(characteristic))
            }
            None => None,
        };
        if let Some(e) = failure {
            if made_link {
                inner.le_links.remove(&device.address);
            }
            return Err(e);
        }

        let (notify_remote, notify_local) = tokio::io::duplex(PIPE_SIZE);
        let (write_local, write_remote) = tokio::io::duplex(PIPE_SIZE);
        inner.gatt_remotes.insert(
            device.address.clone(),
            GattRemote {
                notify: notify_remote,
                written: write_remote,
            },
        );
        Ok(GattSerial {
            reader: notify_local,
            writer: write_local,
            mtu: super::constants::gatt::DEFAULT_MTU,
            link: SimulatedLink {
                inner: self.inner.clone(),
                address: device.address.clone(),
            },
        })
    }

    async fn start_le_scan(&self, sink: ScanSink) -> Result<Option<SimulatedScan>, PlatformError> {
        self.record_call();
        let mut inner = self.inner.lock();
        if inner.refuse_scan {
            return Ok(None);
        }
        let id = inner.next_scan;
        inner.next_scan += 1;
        inner.scans.insert(id, sink);
        Ok(Some(SimulatedScan(id)))
    }

    async fn stop_le_scan(&self, scan: SimulatedScan) -> Result<(), PlatformError> {
        self.record_call();
        self.inner.lock().scans.remove(&scan.0);
        Ok(())
    }
}

/// Platform wrapper around an optional [`SimulatedAdapter`].
pub struct SimulatedPlatform {
    adapter: Option<SimulatedAdapter>,
    le_feature: bool,
}

impl SimulatedPlatform {
    pub fn new(adapter: SimulatedAdapter, le_feature: bool) -> Self {
        Self {
            adapter: Some(adapter),
            le_feature,
        }
    }

    /// A platform whose adapter lookup fails.
    pub fn without_adapter(le_feature: bool) -> Self {
        Self {
            adapter: None,
            le_feature,
        }
    }
}

#[async_trait]
impl BluetoothPlatform for SimulatedPlatform {
    type Adapter = SimulatedAdapter;

    async fn default_adapter(&self) -> Result<SimulatedAdapter, PlatformError> {
        self.adapter
            .clone()
            .ok_or_else(|| PlatformError::Other("no Bluetooth adapter".into()))
    }

    async fn has_le_feature(&self, _adapter: &SimulatedAdapter) -> bool {
        self.le_feature
    }
}
