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

//! LE discovery scanning.
//!
//! Results go straight to the caller's sink from the platform's task; nothing
//! is buffered or deduplicated here. A subscription keeps running until it is
//! handed back to [`stop_scan`], dropping it does not stop the scan.

use tracing::{debug, error, info};

use super::context::AdapterContext;
use super::platform::{RadioAdapter, ScanSink};

/// A running LE scan.
#[must_use = "a scan runs until passed to stop_scan"]
pub struct ScanSubscription<S> {
    token: S,
}

impl<S> ScanSubscription<S> {
    pub fn token(&self) -> &S {
        &self.token
    }
}

/// Start an LE scan. `None` when LE is unsupported or the platform refused.
pub async fn start_scan<A: RadioAdapter>(
    context: &AdapterContext<A>,
    sink: ScanSink,
) -> Option<ScanSubscription<A::Scan>> {
    if !context.supports_le() {
        debug!("LE scan requested without LE support");
        return None;
    }
    let adapter = context.adapter()?;

    match adapter.start_le_scan(sink).await {
        Ok(Some(token)) => {
            info!("LE scan started");
            Some(ScanSubscription { token })
        }
        Ok(None) => {
            info!("LE scan refused by platform");
            None
        }
        Err(e) => {
            error!("Failed to start LE scan: {}", e);
            None
        }
    }
}

/// Stop a scan started by [`start_scan`].
pub async fn stop_scan<A: RadioAdapter>(
    context: &AdapterContext<A>,
    subscription: ScanSubscription<A::Scan>,
) {
    if !context.supports_le() {
        return;
    }
    let Some(adapter) = context.adapter() else {
        return;
    };
    match adapter.stop_le_scan(subscription.token).await {
        Ok(()) => info!("LE scan stopped"),
        Err(e) => error!("Failed to stop LE scan: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::platform::DiscoveredPeripheral;
    use crate::bluetooth::simulated::SimulatedAdapter;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn collecting_sink() -> (ScanSink, Arc<Mutex<Vec<DiscoveredPeripheral>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: ScanSink = Arc::new(move |p: DiscoveredPeripheral| sink_seen.lock().push(p));
        (sink, seen)
    }

    fn peripheral(address: &str) -> DiscoveredPeripheral {
        DiscoveredPeripheral {
            address: address.to_string(),
            name: Some("HMSoft".to_string()),
            rssi: Some(-60),
        }
    }

    #[tokio::test]
    async fn test_scan_delivers_without_dedup() {
        let adapter = SimulatedAdapter::new();
        let context = AdapterContext::new(Some(adapter.clone()), true);
        let (sink, seen) = collecting_sink();

        let subscription = start_scan(&context, sink).await.expect("scan should start");
        adapter.advertise(peripheral("11:22:33:44:55:66"));
        adapter.advertise(peripheral("11:22:33:44:55:66"));
        assert_eq!(seen.lock().len(), 2);

        stop_scan(&context, subscription).await;
        assert_eq!(adapter.active_scans(), 0);

        adapter.advertise(peripheral("11:22:33:44:55:66"));
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_no_le_support_never_scans() {
        let adapter = SimulatedAdapter::new();
        let context = AdapterContext::new(Some(adapter.clone()), false);
        let (sink, _) = collecting_sink();

        assert!(start_scan(&context, sink).await.is_none());
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_platform_refusal() {
        let adapter = SimulatedAdapter::new();
        adapter.refuse_scan();
        let context = AdapterContext::new(Some(adapter), true);
        let (sink, _) = collecting_sink();

        assert!(start_scan(&context, sink).await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_subscription_keeps_scanning() {
        let adapter = SimulatedAdapter::new();
        let context = AdapterContext::new(Some(adapter.clone()), true);
        let (sink, seen) = collecting_sink();

        drop(start_scan(&context, sink).await);
        adapter.advertise(peripheral("11:22:33:44:55:66"));
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(adapter.active_scans(), 1);
    }
}
