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

//! Adapter guard and feature flags.
//!
//! `AdapterContext` is built once at startup and handed by reference to the
//! classifier, selector, scan controller and enumeration. It is never
//! reassigned; an absent adapter turns every operation into its safe default
//! without touching the platform.

use tracing::{error, info, warn};

use super::platform::{BluetoothPlatform, RadioAdapter};

pub struct AdapterContext<A> {
    adapter: Option<A>,
    supports_le: bool,
}

impl<A: RadioAdapter> AdapterContext<A> {
    /// Build from an already resolved adapter.
    ///
    /// `le_feature` is ignored when there is no adapter.
    pub fn new(adapter: Option<A>, le_feature: bool) -> Self {
        let supports_le = adapter.is_some() && le_feature;
        Self {
            adapter,
            supports_le,
        }
    }

    /// A context with no adapter.
    pub fn unavailable() -> Self {
        Self::new(None, false)
    }

    /// Resolve the default adapter and query LE support.
    pub async fn detect<P>(platform: &P) -> Self
    where
        P: BluetoothPlatform<Adapter = A>,
    {
        let adapter = match platform.default_adapter().await {
            Ok(adapter) => Some(adapter),
            Err(e) => {
                error!("Default Bluetooth adapter lookup failed: {}", e);
                None
            }
        };

        let le_feature = match &adapter {
            Some(adapter) => platform.has_le_feature(adapter).await,
            None => false,
        };

        let context = Self::new(adapter, le_feature);
        info!(
            "Bluetooth adapter {}, LE {}",
            if context.is_available() { "available" } else { "unavailable" },
            if context.supports_le() { "supported" } else { "unsupported" }
        );
        context
    }

    pub fn is_available(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn supports_le(&self) -> bool {
        self.supports_le
    }

    pub fn adapter(&self) -> Option<&A> {
        self.adapter.as_ref()
    }

    /// Whether the adapter is present and powered.
    pub async fn is_enabled(&self) -> bool {
        let Some(adapter) = self.adapter() else {
            return false;
        };
        match adapter.is_enabled().await {
            Ok(enabled) => enabled,
            Err(e) => {
                error!("Bluetooth enabled-state query failed: {}", e);
                false
            }
        }
    }

    /// Best-effort stop of any running discovery.
    pub async fn cancel_discovery(&self) {
        if let Some(adapter) = self.adapter() {
            if let Err(e) = adapter.cancel_discovery().await {
                warn!("Cancelling discovery failed: {}", e);
            }
        }
    }
}
