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

//! Call surface for the application core.
//!
//! Failures the core can recover from by picking another device or mode come
//! back as `None`/`false`; the detail only goes to the log. Classic and server
//! transport failures come back as `io::Error` so the core can tell "nothing to
//! connect to" from "the connection attempt failed".

use std::io;

use crate::bluetooth::platform::{BluetoothPlatform, RadioAdapter};
use crate::bluetooth::{self, AdapterContext, DeviceRecord, ScanSink, ScanSubscription};
use crate::port::Port;

pub struct BluetoothHelper<A> {
    context: AdapterContext<A>,
}

impl<A: RadioAdapter + 'static> BluetoothHelper<A> {
    pub fn new(context: AdapterContext<A>) -> Self {
        Self { context }
    }

    /// Resolve the adapter and LE support once, at startup.
    pub async fn initialize<P>(platform: &P) -> Self
    where
        P: BluetoothPlatform<Adapter = A>,
    {
        Self::new(AdapterContext::detect(platform).await)
    }

    pub fn context(&self) -> &AdapterContext<A> {
        &self.context
    }

    pub async fn is_enabled(&self) -> bool {
        self.context.is_enabled().await
    }

    pub async fn cancel_discovery(&self) {
        self.context.cancel_discovery().await
    }

    /// Bonded devices as records.
    pub async fn devices(&self) -> Option<Vec<DeviceRecord>> {
        bluetooth::list_bonded_devices(&self.context).await.ok()
    }

    /// Bonded devices flattened to `[address, name, tag]` triples.
    pub async fn list(&self) -> Option<Vec<String>> {
        let records = self.devices().await?;
        Some(bluetooth::flatten(&records))
    }

    pub async fn name_from_address(&self, address: &str) -> Option<String> {
        bluetooth::resolve_name(&self.context, address).await.ok().flatten()
    }

    /// `TYPE_CLASSIC`, `TYPE_DUAL`, `TYPE_LE` or `TYPE_UNKNOWN`.
    pub async fn type_from_address(&self, address: &str) -> Option<&'static str> {
        bluetooth::classify(&self.context, address)
            .await
            .ok()
            .map(|t| t.type_tag())
    }

    /// Classic SPP client port.
    pub async fn connect(&self, address: &str) -> io::Result<Option<Box<dyn Port>>> {
        match bluetooth::connect_classic(&self.context, address).await {
            Ok(port) => Ok(Some(port)),
            Err(e) => e.into_boundary(),
        }
    }

    /// HM-10 GATT port. Every failure is absorbed.
    pub async fn connect_hm10(&self, address: &str) -> Option<Box<dyn Port>> {
        bluetooth::connect_le(&self.context, address).await.ok()
    }

    /// RFCOMM server port accepting one connection.
    pub async fn create_server(&self) -> io::Result<Option<Box<dyn Port>>> {
        match bluetooth::listen(&self.context).await {
            Ok(port) => Ok(Some(port)),
            Err(e) => e.into_boundary(),
        }
    }

    /// `None` means no scan was started.
    pub async fn start_le_scan(&self, sink: ScanSink) -> Option<ScanSubscription<A::Scan>> {
        bluetooth::start_scan(&self.context, sink).await
    }

    pub async fn stop_le_scan(&self, subscription: ScanSubscription<A::Scan>) {
        bluetooth::stop_scan(&self.context, subscription).await
    }
}
