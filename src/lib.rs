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

//! Bluetooth port layer for the LK8000 glide computer.
//!
//! Lists bonded devices with a transport tag, and turns an address into a
//! byte-stream [`Port`]: a classic RFCOMM/SPP client, an HM-10 serial link over
//! BLE GATT, or an RFCOMM server waiting for one inbound connection.

pub mod bluetooth;
pub mod config;
pub mod error;
pub mod helper;
pub mod port;

pub use bluetooth::{AdapterContext, DeviceRecord, TransportType};
pub use error::{PlatformError, PortError};
pub use helper::BluetoothHelper;
pub use port::{Port, PortKind};
