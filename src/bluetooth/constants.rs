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

//! Service and characteristic UUIDs used to build ports.

use uuid::Uuid;

/// Serial Port Profile service UUID, used by the RFCOMM client and server.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// HM-10 serial service UUID.
pub const HM10_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000FFE0_0000_1000_8000_00805F9B34FB);

/// HM-10 serial characteristic UUID.
/// Properties: Read, Write Without Response, Notify
pub const HM10_SERIAL_UUID: Uuid = Uuid::from_u128(0x0000FFE1_0000_1000_8000_00805F9B34FB);

/// RFCOMM channel requested for the server profile.
pub const RFCOMM_CHANNEL: u16 = 1;

/// BLE link constants.
pub mod gatt {
    /// Default ATT MTU (minimum for all BLE devices).
    pub const DEFAULT_MTU: usize = 23;

    /// ATT protocol overhead (3 bytes).
    pub const ATT_OVERHEAD: usize = 3;

    /// Largest payload a single characteristic write may carry for a given MTU.
    pub fn max_write_len(mtu: usize) -> usize {
        mtu.saturating_sub(ATT_OVERHEAD).max(1)
    }
}
