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

//! Bonded-device enumeration.

use serde::Serialize;
use tracing::{debug, error, warn};

use super::classifier::TransportType;
use super::context::AdapterContext;
use super::platform::{RadioAdapter, RemoteDevice};
use crate::error::PortError;

/// One bonded device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub address: String,
    pub name: Option<String>,
    pub transport: TransportType,
}

impl DeviceRecord {
    /// Tag used in the flattened list.
    pub fn tag(&self) -> &'static str {
        self.transport.list_tag()
    }

    /// `name [address]`, or just the address when unnamed.
    pub fn display_string(&self) -> String {
        match &self.name {
            Some(name) => format!("{} [{}]", name, self.address),
            None => self.address.clone(),
        }
    }
}

/// List the bonded devices in platform order.
///
/// A device whose type cannot be read or is unmapped is listed as
/// [`TransportType::Unknown`].
pub async fn list_bonded_devices<A: RadioAdapter>(
    context: &AdapterContext<A>,
) -> Result<Vec<DeviceRecord>, PortError> {
    let adapter = context.adapter().ok_or(PortError::Unavailable)?;

    let devices = match adapter.bonded_devices().await {
        Ok(Some(devices)) => devices,
        Ok(None) => {
            warn!("Bonded device set unavailable");
            return Err(PortError::Platform("no bonded device set".into()));
        }
        Err(e) => {
            error!("Failed to get bluetooth devices list: {}", e);
            return Err(e.into());
        }
    };

    let mut records = Vec::with_capacity(devices.len());
    for device in devices {
        let address = device.address();
        let name = match device.name().await {
            Ok(name) => name,
            Err(e) => {
                warn!("Failed to read name of {}: {}", address, e);
                None
            }
        };
        let transport = match device.device_type().await {
            Ok(raw) => TransportType::from_raw(raw).unwrap_or(TransportType::Unknown),
            Err(e) => {
                warn!("Failed to read type of {}: {}", address, e);
                TransportType::Unknown
            }
        };
        records.push(DeviceRecord {
            address,
            name,
            transport,
        });
    }

    debug!("Listed {} bonded devices", records.len());
    Ok(records)
}

/// Flatten records into `[address, name, tag]` triples.
/// A missing name becomes an empty string.
pub fn flatten(records: &[DeviceRecord]) -> Vec<String> {
    let mut flat = Vec::with_capacity(records.len() * 3);
    for record in records {
        flat.push(record.address.clone());
        flat.push(record.name.clone().unwrap_or_default());
        flat.push(record.tag().to_string());
    }
    flat
}
