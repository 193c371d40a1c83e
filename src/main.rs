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

//! `lkbt`: inspect and exercise Bluetooth ports from the command line.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lk8000_bluetooth::bluetooth::bluez::{BluezAdapter, BluezPlatform};
use lk8000_bluetooth::bluetooth::{DiscoveredPeripheral, ScanSink};
use lk8000_bluetooth::config::Config;
use lk8000_bluetooth::{BluetoothHelper, Port};

#[derive(Parser)]
#[command(name = "lkbt")]
#[command(about = "LK8000 Bluetooth ports", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show adapter state
    Status,
    /// List bonded devices
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show name and type of a device
    Info { address: String },
    /// Scan for LE peripherals
    Scan {
        #[arg(short, long)]
        seconds: Option<u64>,
    },
    /// Connect to a device and bridge it to stdin/stdout
    Connect {
        address: String,
        /// Use the HM-10 GATT serial service instead of RFCOMM
        #[arg(long)]
        le: bool,
    },
    /// Wait for one inbound RFCOMM connection and bridge it to stdin/stdout
    Listen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                config
                    .log
                    .filter
                    .parse::<tracing_subscriber::filter::Directive>()
                    .context("invalid log filter in config")?,
            ),
        )
        .init();

    info!("Starting lkbt v{}", env!("CARGO_PKG_VERSION"));

    let platform = BluezPlatform::new(config.bluetooth.le_enabled);
    let helper = BluetoothHelper::initialize(&platform).await;

    match cli.command {
        Commands::Status => status(&helper).await,
        Commands::List { json } => list(&helper, json).await,
        Commands::Info { address } => device_info(&helper, &address).await,
        Commands::Scan { seconds } => {
            let seconds = seconds.unwrap_or(config.bluetooth.scan_seconds);
            scan(&helper, Duration::from_secs(seconds)).await
        }
        Commands::Connect { address, le } => {
            let port = if le {
                helper.connect_hm10(&address).await
            } else {
                helper.connect(&address).await?
            };
            let port = port.ok_or_else(|| anyhow!("device {} unavailable", address))?;
            bridge(port).await
        }
        Commands::Listen => {
            let port = helper
                .create_server()
                .await?
                .ok_or_else(|| anyhow!("Bluetooth adapter unavailable"))?;
            println!("Waiting for a connection...");
            bridge(port).await
        }
    }
}

async fn status(helper: &BluetoothHelper<BluezAdapter>) -> Result<()> {
    let context = helper.context();
    match context.adapter() {
        Some(adapter) => println!("Adapter:  {}", adapter.name()),
        None => println!("Adapter:  none"),
    }
    println!("Enabled:  {}", helper.is_enabled().await);
    println!("LE:       {}", context.supports_le());
    Ok(())
}

async fn list(helper: &BluetoothHelper<BluezAdapter>, json: bool) -> Result<()> {
    let records = helper
        .devices()
        .await
        .ok_or_else(|| anyhow!("bonded device list unavailable"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for record in &records {
        println!("{:<18} {:<8} {}", record.address, record.tag(), record.display_string());
    }
    Ok(())
}

async fn device_info(helper: &BluetoothHelper<BluezAdapter>, address: &str) -> Result<()> {
    let kind = helper
        .type_from_address(address)
        .await
        .ok_or_else(|| anyhow!("device {} not found", address))?;
    let name = helper.name_from_address(address).await;

    println!("Address:  {}", address);
    println!("Name:     {}", name.as_deref().unwrap_or("-"));
    println!("Type:     {}", kind);
    Ok(())
}

async fn scan(helper: &BluetoothHelper<BluezAdapter>, window: Duration) -> Result<()> {
    let sink: ScanSink = Arc::new(|peripheral: DiscoveredPeripheral| {
        println!(
            "{:<18} {:>5} {}",
            peripheral.address,
            peripheral.rssi.map(|r| r.to_string()).unwrap_or_default(),
            peripheral.name.unwrap_or_default()
        );
    });

    let subscription = helper
        .start_le_scan(sink)
        .await
        .ok_or_else(|| anyhow!("LE scan not available"))?;

    tokio::select! {
        _ = tokio::time::sleep(window) => {}
        _ = tokio::signal::ctrl_c() => info!("Scan interrupted"),
    }

    helper.stop_le_scan(subscription).await;
    helper.cancel_discovery().await;
    Ok(())
}

enum BridgeEvent {
    Stdin(Option<Vec<u8>>),
    Port(std::io::Result<usize>),
}

/// Copy stdin to the port and the port to stdout until either side closes.
async fn bridge(mut port: Box<dyn Port>) -> Result<()> {
    let (stdin_tx, mut stdin_rx) = mpsc::channel::<Vec<u8>>(16);
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buf = [0u8; 512];
        loop {
            match stdin.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if stdin_tx.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut stdout = tokio::io::stdout();
    let mut buf = [0u8; 512];
    loop {
        let event = tokio::select! {
            data = stdin_rx.recv() => BridgeEvent::Stdin(data),
            res = port.read(&mut buf) => BridgeEvent::Port(res),
        };

        match event {
            BridgeEvent::Stdin(Some(data)) => port.write_all(&data).await?,
            BridgeEvent::Stdin(None) => break,
            BridgeEvent::Port(Ok(0)) => {
                info!("Remote closed the {} port", port.kind());
                break;
            }
            BridgeEvent::Port(Ok(n)) => {
                stdout.write_all(&buf[..n]).await?;
                stdout.flush().await?;
            }
            BridgeEvent::Port(Err(e)) => {
                error!("Port read failed: {}", e);
                break;
            }
        }
    }

    port.close().await?;
    Ok(())
}
