//! End-to-end tests of the call surface over the simulated radio stack.

use lk8000_bluetooth::bluetooth::simulated::{SimulatedAdapter, SimulatedDevice, SimulatedPlatform};
use lk8000_bluetooth::bluetooth::{AdapterContext, DiscoveredPeripheral, RawDeviceType, ScanSink};
use lk8000_bluetooth::{BluetoothHelper, PortKind};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

const FLARM: &str = "AA:BB:CC:DD:EE:FF";
const HM10: &str = "11:22:33:44:55:66";
const PHONE: &str = "33:33:33:33:33:33";

/// Counts log entries at INFO and above.
struct LogCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for LogCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() <= Level::INFO {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn count_logs() -> (Arc<AtomicUsize>, tracing::subscriber::DefaultGuard) {
    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(LogCounter(count.clone()));
    (count, tracing::subscriber::set_default(subscriber))
}

async fn helper_with(
    devices: Vec<SimulatedDevice>,
    le_feature: bool,
) -> (SimulatedAdapter, BluetoothHelper<SimulatedAdapter>) {
    let adapter = SimulatedAdapter::new();
    for device in devices {
        adapter.add_device(device);
    }
    let platform = SimulatedPlatform::new(adapter.clone(), le_feature);
    (adapter, BluetoothHelper::initialize(&platform).await)
}

#[tokio::test]
async fn test_single_classic_device_list() {
    let (_, helper) = helper_with(vec![SimulatedDevice::classic(FLARM, Some("Flarm"))], true).await;

    assert_eq!(
        helper.list().await.unwrap(),
        vec!["AA:BB:CC:DD:EE:FF", "Flarm", "CLASSIC"]
    );
}

#[tokio::test]
async fn test_le_device_is_hm10() {
    let (_, helper) = helper_with(vec![SimulatedDevice::le(HM10, Some("HMSoft"))], true).await;

    assert_eq!(helper.type_from_address(HM10).await, Some("TYPE_LE"));
    let list = helper.list().await.unwrap();
    assert_eq!(list[2], "HM10");
}

#[tokio::test]
async fn test_list_length_is_three_per_device() {
    let (_, helper) = helper_with(
        vec![
            SimulatedDevice::classic(FLARM, Some("Flarm")),
            SimulatedDevice::le(HM10, Some("HMSoft")),
            SimulatedDevice::new("22:22:22:22:22:22", Some("LX9000"), RawDeviceType::DUAL),
            SimulatedDevice::new("33:33:33:33:33:33", None, RawDeviceType::UNKNOWN),
        ],
        true,
    )
    .await;

    let records = helper.devices().await.unwrap();
    let list = helper.list().await.unwrap();
    assert_eq!(list.len(), records.len() * 3);

    let addresses: HashSet<_> = list.iter().step_by(3).collect();
    assert_eq!(addresses.len(), records.len());

    // Dual mode is only distinguished by the per-address query
    assert_eq!(helper.type_from_address("22:22:22:22:22:22").await, Some("TYPE_DUAL"));
    let dual = list.iter().position(|a| a == "22:22:22:22:22:22").unwrap();
    assert_eq!(list[dual + 2], "CLASSIC");
}

#[tokio::test]
async fn test_unknown_address_is_absent_everywhere() {
    let (_, helper) = helper_with(vec![SimulatedDevice::classic(FLARM, Some("Flarm"))], true).await;
    let missing = "00:00:00:00:00:00";

    assert_eq!(helper.type_from_address(missing).await, None);
    assert_eq!(helper.name_from_address(missing).await, None);
    assert!(helper.connect(missing).await.unwrap().is_none());
    assert!(helper.connect_hm10(missing).await.is_none());
}

#[tokio::test]
async fn test_no_adapter_makes_no_platform_calls() {
    let helper: BluetoothHelper<SimulatedAdapter> = BluetoothHelper::new(AdapterContext::unavailable());

    assert!(!helper.is_enabled().await);
    assert!(helper.list().await.is_none());
    assert!(helper.devices().await.is_none());
    assert_eq!(helper.type_from_address(FLARM).await, None);
    assert_eq!(helper.name_from_address(FLARM).await, None);
    assert!(helper.connect(FLARM).await.unwrap().is_none());
    assert!(helper.connect_hm10(FLARM).await.is_none());
    assert!(helper.create_server().await.unwrap().is_none());

    let sink: ScanSink = Arc::new(|_: DiscoveredPeripheral| {});
    assert!(helper.start_le_scan(sink).await.is_none());
    helper.cancel_discovery().await;
}

#[tokio::test]
async fn test_failed_adapter_lookup_is_unavailable() {
    let platform = SimulatedPlatform::without_adapter(true);
    let helper = BluetoothHelper::initialize(&platform).await;

    assert!(!helper.context().is_available());
    assert!(!helper.context().supports_le());
    assert!(helper.list().await.is_none());
}

#[tokio::test]
async fn test_without_le_support() {
    let (adapter, helper) = helper_with(vec![SimulatedDevice::le(HM10, Some("HMSoft"))], false).await;

    let sink: ScanSink = Arc::new(|_: DiscoveredPeripheral| {});
    assert!(helper.start_le_scan(sink).await.is_none());
    assert!(helper.connect_hm10(HM10).await.is_none());
    assert_eq!(adapter.calls(), 0);
}

#[tokio::test]
async fn test_gatt_failure_falls_back_to_classic() {
    let (adapter, helper) = helper_with(vec![SimulatedDevice::le(HM10, Some("HMSoft"))], true).await;
    adapter.fail_gatt("characteristic FFE1 missing");

    assert!(helper.connect_hm10(HM10).await.is_none());

    assert!(!adapter.is_le_connected(HM10));

    let mut port = helper.connect(HM10).await.unwrap().expect("classic port");
    assert_eq!(port.kind(), PortKind::Classic);

    let mut remote = adapter.take_rfcomm_remote(HM10).unwrap();
    port.write_all(b"$PFLAC,R,ID*00\r\n").await.unwrap();
    let mut buf = [0u8; 16];
    remote.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"$PFLAC,R,ID*00\r\n");
}

#[tokio::test]
async fn test_classic_transport_failure_propagates() {
    let (adapter, helper) = helper_with(vec![SimulatedDevice::classic(FLARM, Some("Flarm"))], true).await;
    adapter.fail_rfcomm(io::ErrorKind::HostUnreachable);

    let err = helper.connect(FLARM).await.err().expect("error expected");
    assert_eq!(err.kind(), io::ErrorKind::HostUnreachable);
}

#[tokio::test]
async fn test_server_failure_propagates() {
    let (adapter, helper) = helper_with(vec![], true).await;
    adapter.fail_listen(io::ErrorKind::AddrInUse);

    let err = helper.create_server().await.err().expect("error expected");
    assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
}

#[tokio::test]
async fn test_server_round_trip() {
    let (adapter, helper) = helper_with(vec![], true).await;
    let mut port = helper.create_server().await.unwrap().expect("server port");
    assert_eq!(port.kind(), PortKind::Server);
    assert_eq!(port.peer(), None);

    let mut remote = adapter.connect_inbound("66:55:44:33:22:11").unwrap();
    remote.write_all(b"$PLXVF").await.unwrap();

    let mut buf = [0u8; 6];
    let n = port.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"$PLXVF");
    assert_eq!(port.peer(), Some("66:55:44:33:22:11"));

    port.write_all(b"ACK").await.unwrap();
    let mut reply = [0u8; 3];
    remote.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b"ACK");

    // Only one connection per server port
    assert!(adapter.connect_inbound("77:77:77:77:77:77").is_none());

    port.close().await.unwrap();
    assert_eq!(remote.read(&mut reply).await.unwrap(), 0);
}

#[tokio::test]
async fn test_hm10_round_trip() {
    let (adapter, helper) = helper_with(vec![SimulatedDevice::le(HM10, Some("HMSoft"))], true).await;
    let mut port = helper.connect_hm10(HM10).await.expect("gatt port");
    assert_eq!(port.kind(), PortKind::Gatt);

    let mut remote = adapter.take_gatt_remote(HM10).unwrap();
    remote.notify.write_all(b"$GPGGA").await.unwrap();
    let mut buf = [0u8; 6];
    let n = port.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"$GPGGA");

    let long = [b'x'; 50];
    port.write_all(&long).await.unwrap();
    let mut written = [0u8; 50];
    remote.written.read_exact(&mut written).await.unwrap();
    assert_eq!(written, long);
}

#[tokio::test]
async fn test_scan_session() {
    let (adapter, helper) = helper_with(vec![], true).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    let sink: ScanSink = Arc::new(move |p: DiscoveredPeripheral| sink_seen.lock().push(p.address));

    let subscription = helper.start_le_scan(sink).await.expect("scan");
    adapter.advertise(DiscoveredPeripheral {
        address: HM10.to_string(),
        name: Some("HMSoft".to_string()),
        rssi: Some(-71),
    });
    helper.stop_le_scan(subscription).await;
    helper.cancel_discovery().await;

    assert_eq!(*seen.lock(), vec![HM10.to_string()]);
    assert_eq!(adapter.active_scans(), 0);
    assert_eq!(adapter.discovery_cancels(), 1);
}

#[tokio::test]
async fn test_enabled_state() {
    let (adapter, helper) = helper_with(vec![], true).await;
    assert!(helper.is_enabled().await);

    adapter.set_enabled(false);
    assert!(!helper.is_enabled().await);

    adapter.set_enabled(true);
    adapter.fail_enabled_query();
    assert!(!helper.is_enabled().await);
}

#[tokio::test]
async fn test_unknown_address_logs_once() {
    let (_adapter, helper) = helper_with(vec![SimulatedDevice::classic(FLARM, Some("Flarm"))], true).await;
    let (logs, _guard) = count_logs();

    assert!(helper.connect("00:00:00:00:00:00").await.unwrap().is_none());
    assert_eq!(logs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gatt_failure_logs_once() {
    let (adapter, helper) = helper_with(vec![SimulatedDevice::le(HM10, Some("HMSoft"))], true).await;
    adapter.fail_gatt("characteristic FFE1 missing");
    let (logs, _guard) = count_logs();

    assert!(helper.connect_hm10(HM10).await.is_none());
    assert_eq!(logs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unbonded_devices() {
    let (adapter, helper) = helper_with(
        vec![
            SimulatedDevice::classic(PHONE, Some("Phone")).unbonded(),
            SimulatedDevice::le(HM10, Some("HMSoft")).unbonded(),
        ],
        true,
    )
    .await;

    assert_eq!(helper.list().await, Some(vec![]));
    assert_eq!(helper.type_from_address(PHONE).await, None);
    assert_eq!(helper.name_from_address(PHONE).await, None);
    assert!(helper.connect(PHONE).await.unwrap().is_none());
    assert!(adapter.take_rfcomm_remote(PHONE).is_none());

    // Peripherals found by scanning can be reached over GATT without bonding
    let mut port = helper.connect_hm10(HM10).await.expect("gatt port");
    assert!(adapter.is_le_connected(HM10));
    port.close().await.unwrap();
    assert!(!adapter.is_le_connected(HM10));
}
