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

//! HM-10 serial emulation over a GATT characteristic.
//!
//! Notifications from the characteristic form the read side; writes are split
//! into chunks that fit a single ATT write. Closing the port also drops the LE
//! link.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::{closed_error, Port, PortKind};
use crate::bluetooth::constants::gatt;
use crate::bluetooth::platform::{GattLink, GattSerial};

pub struct GattPort<R, W, L> {
    reader: Option<R>,
    writer: Option<W>,
    link: Option<L>,
    max_write: usize,
    peer: String,
}

impl<R, W, L> GattPort<R, W, L>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
    L: GattLink + 'static,
{
    pub fn new(serial: GattSerial<R, W, L>, peer: String) -> Self {
        let max_write = gatt::max_write_len(serial.mtu);
        info!(
            "GATT port open to {} (MTU {}, {} bytes per write)",
            peer, serial.mtu, max_write
        );
        Self {
            reader: Some(serial.reader),
            writer: Some(serial.writer),
            link: Some(serial.link),
            max_write,
            peer,
        }
    }

    pub fn max_write(&self) -> usize {
        self.max_write
    }
}

#[async_trait]
impl<R, W, L> Port for GattPort<R, W, L>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
    L: GattLink + 'static,
{
    fn kind(&self) -> PortKind {
        PortKind::Gatt
    }

    fn peer(&self) -> Option<&str> {
        Some(&self.peer)
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read(buf).await,
            None => Ok(0),
        }
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| closed_error(PortKind::Gatt))?;
        let chunk = &data[..data.len().min(self.max_write)];
        writer.write_all(chunk).await?;
        writer.flush().await?;
        Ok(chunk.len())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.reader = None;
        let shutdown = match self.writer.take() {
            Some(mut writer) => {
                debug!("Closing GATT port to {}", self.peer);
                writer.shutdown().await
            }
            None => Ok(()),
        };

        // The link goes down even if the writer did not shut down cleanly
        if let Some(link) = self.link.take() {
            if let Err(e) = link.disconnect().await {
                warn!("Failed to disconnect {}: {}", self.peer, e);
                shutdown?;
                return Err(io::Error::new(io::ErrorKind::Other, e));
            }
        }
        shutdown
    }
}
