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

//! Bluetooth device discovery, classification and connection setup.
//!
//! Builds classic RFCOMM client ports, HM-10 GATT ports and RFCOMM server
//! ports on top of a [`platform::RadioAdapter`].

mod attempt;
pub mod bluez;
mod classifier;
pub mod constants;
mod context;
mod enumeration;
pub mod platform;
mod scan;
mod selector;
pub mod simulated;

pub use attempt::{AttemptState, ConnectionAttempt, ConnectionMode, ConnectionRequest};
pub use classifier::{classify, resolve_name, TransportType};
pub use context::AdapterContext;
pub use enumeration::{flatten, list_bonded_devices, DeviceRecord};
pub use platform::{DiscoveredPeripheral, RawDeviceType, ScanSink};
pub use scan::{start_scan, stop_scan, ScanSubscription};
pub use selector::{connect, connect_classic, connect_le, listen};
