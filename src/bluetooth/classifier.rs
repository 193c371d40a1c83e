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

//! Device classification and name lookup.

use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

use super::context::AdapterContext;
use super::platform::{RadioAdapter, RawDeviceType, RemoteDevice};
use crate::error::PortError;

/// Transport a remote device speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransportType {
    Classic,
    Dual,
    /// Low Energy only. Assumed to be an HM-10 style serial module.
    Le,
    Unknown,
}

impl TransportType {
    /// Map a platform device-type code. Codes outside the four defined ones
    /// are unresolvable.
    pub fn from_raw(raw: RawDeviceType) -> Option<Self> {
        match raw {
            RawDeviceType::CLASSIC => Some(TransportType::Classic),
            RawDeviceType::DUAL => Some(TransportType::Dual),
            RawDeviceType::LE => Some(TransportType::Le),
            RawDeviceType::UNKNOWN => Some(TransportType::Unknown),
            _ => None,
        }
    }

    /// Tag reported by the per-address type query.
    pub fn type_tag(&self) -> &'static str {
        match self {
            TransportType::Classic => "TYPE_CLASSIC",
            TransportType::Dual => "TYPE_DUAL",
            TransportType::Le => "TYPE_LE",
            TransportType::Unknown => "TYPE_UNKNOWN",
        }
    }

    /// Tag reported in the bonded-device list. Only LE devices are singled out.
    pub fn list_tag(&self) -> &'static str {
        match self {
            TransportType::Le => "HM10",
            _ => "CLASSIC",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// Resolve `address` to a device the adapter knows, bonded or not.
pub(crate) async fn resolve_device<A: RadioAdapter>(
    context: &AdapterContext<A>,
    address: &str,
) -> Result<A::Device, PortError> {
    let adapter = context.adapter().ok_or(PortError::Unavailable)?;
    adapter
        .remote_device(address)
        .await?
        .ok_or_else(|| PortError::NotFound(address.to_string()))
}

/// Resolve `address` to a device in the bonded set. Devices that are only
/// known from discovery are not found.
pub(crate) async fn resolve_bonded_device<A: RadioAdapter>(
    context: &AdapterContext<A>,
    address: &str,
) -> Result<A::Device, PortError> {
    let device = resolve_device(context, address).await?;
    if device.is_bonded().await? {
        Ok(device)
    } else {
        Err(PortError::NotFound(address.to_string()))
    }
}

/// Classify the bonded device at `address`.
pub async fn classify<A: RadioAdapter>(
    context: &AdapterContext<A>,
    address: &str,
) -> Result<TransportType, PortError> {
    let device = resolve_bonded_device(context, address).await.map_err(|e| {
        if !matches!(e, PortError::Unavailable) {
            error!("Failed to look up type of {}: {}", address, e);
        }
        e
    })?;

    let raw = device.device_type().await.map_err(|e| {
        error!("Failed to look up type of {}: {}", address, e);
        PortError::from(e)
    })?;

    TransportType::from_raw(raw).ok_or_else(|| {
        warn!("Unmapped device type {} for {}", raw.0, address);
        PortError::Platform(format!("unmapped device type {}", raw.0))
    })
}

/// Look up the display name of the bonded device at `address`.
pub async fn resolve_name<A: RadioAdapter>(
    context: &AdapterContext<A>,
    address: &str,
) -> Result<Option<String>, PortError> {
    let device = resolve_bonded_device(context, address).await.map_err(|e| {
        if !matches!(e, PortError::Unavailable) {
            error!("Failed to look up name of {}: {}", address, e);
        }
        e
    })?;

    device.name().await.map_err(|e| {
        error!("Failed to look up name of {}: {}", address, e);
        PortError::from(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::simulated::{SimulatedAdapter, SimulatedDevice};

    fn context_with(devices: Vec<SimulatedDevice>) -> AdapterContext<SimulatedAdapter> {
        let adapter = SimulatedAdapter::new();
        for device in devices {
            adapter.add_device(device);
        }
        AdapterContext::new(Some(adapter), true)
    }

    #[test]
    fn test_raw_mapping_is_total_over_defined_codes() {
        assert_eq!(TransportType::from_raw(RawDeviceType::CLASSIC), Some(TransportType::Classic));
        assert_eq!(TransportType::from_raw(RawDeviceType::DUAL), Some(TransportType::Dual));
        assert_eq!(TransportType::from_raw(RawDeviceType::LE), Some(TransportType::Le));
        assert_eq!(TransportType::from_raw(RawDeviceType::UNKNOWN), Some(TransportType::Unknown));
        assert_eq!(TransportType::from_raw(RawDeviceType(4)), None);
        assert_eq!(TransportType::from_raw(RawDeviceType(u32::MAX)), None);
    }

    #[test]
    fn test_tags() {
        assert_eq!(TransportType::Dual.type_tag(), "TYPE_DUAL");
        assert_eq!(TransportType::Le.list_tag(), "HM10");
        assert_eq!(TransportType::Dual.list_tag(), "CLASSIC");
        assert_eq!(TransportType::Unknown.list_tag(), "CLASSIC");
    }

    #[tokio::test]
    async fn test_classify() {
        let context = context_with(vec![
            SimulatedDevice::classic("AA:BB:CC:DD:EE:FF", Some("Flarm")),
            SimulatedDevice::le("11:22:33:44:55:66", Some("HMSoft")),
            SimulatedDevice::new("22:22:22:22:22:22", None, RawDeviceType::DUAL),
        ]);

        assert_eq!(classify(&context, "AA:BB:CC:DD:EE:FF").await.unwrap(), TransportType::Classic);
        assert_eq!(classify(&context, "11:22:33:44:55:66").await.unwrap(), TransportType::Le);
        assert_eq!(classify(&context, "22:22:22:22:22:22").await.unwrap(), TransportType::Dual);
    }

    #[tokio::test]
    async fn test_unknown_address_is_not_found() {
        let context = context_with(vec![]);
        assert!(matches!(
            classify(&context, "00:00:00:00:00:00").await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            resolve_name(&context, "00:00:00:00:00:00").await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unbonded_device_is_not_found() {
        let context = context_with(vec![
            SimulatedDevice::classic("33:33:33:33:33:33", Some("Phone")).unbonded(),
        ]);
        assert!(matches!(
            classify(&context, "33:33:33:33:33:33").await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            resolve_name(&context, "33:33:33:33:33:33").await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unmapped_code_is_unresolvable() {
        let context = context_with(vec![SimulatedDevice::new(
            "33:33:33:33:33:33",
            None,
            RawDeviceType(9),
        )]);
        assert!(classify(&context, "33:33:33:33:33:33").await.is_err());
    }

    #[tokio::test]
    async fn test_lookup_failure_does_not_escape() {
        let context = context_with(vec![SimulatedDevice::classic("AA:BB:CC:DD:EE:FF", Some("Flarm"))]);
        context.adapter().unwrap().fail_lookups();

        assert!(matches!(
            classify(&context, "AA:BB:CC:DD:EE:FF").await,
            Err(PortError::Platform(_))
        ));
        assert!(matches!(
            resolve_name(&context, "AA:BB:CC:DD:EE:FF").await,
            Err(PortError::Platform(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_name() {
        let context = context_with(vec![
            SimulatedDevice::classic("AA:BB:CC:DD:EE:FF", Some("Flarm")),
            SimulatedDevice::classic("01:02:03:04:05:06", None),
        ]);
        assert_eq!(
            resolve_name(&context, "AA:BB:CC:DD:EE:FF").await.unwrap().as_deref(),
            Some("Flarm")
        );
        assert_eq!(resolve_name(&context, "01:02:03:04:05:06").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let context: AdapterContext<SimulatedAdapter> = AdapterContext::unavailable();
        assert!(matches!(classify(&context, "AA:BB:CC:DD:EE:FF").await, Err(PortError::Unavailable)));
        assert!(matches!(resolve_name(&context, "AA:BB:CC:DD:EE:FF").await, Err(PortError::Unavailable)));
    }
}
