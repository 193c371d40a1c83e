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

//! RFCOMM client port.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use super::{closed_error, Port, PortKind};
use crate::bluetooth::platform::ByteStream;

/// Port over a connected RFCOMM stream.
pub struct ClassicPort<S> {
    stream: Option<S>,
    peer: String,
}

impl<S: ByteStream> ClassicPort<S> {
    pub fn new(stream: S, peer: String) -> Self {
        info!("Classic port open to {}", peer);
        Self {
            stream: Some(stream),
            peer,
        }
    }
}

#[async_trait]
impl<S: ByteStream> Port for ClassicPort<S> {
    fn kind(&self) -> PortKind {
        PortKind::Classic
    }

    fn peer(&self) -> Option<&str> {
        Some(&self.peer)
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.as_mut() {
            Some(stream) => stream.read(buf).await,
            None => Ok(0),
        }
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| closed_error(PortKind::Classic))?;
        let n = stream.write(data).await?;
        stream.flush().await?;
        Ok(n)
    }

    async fn close(&mut self) -> io::Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Closing classic port to {}", self.peer);
            stream.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_write() {
        let (local, mut remote) = tokio::io::duplex(64);
        let mut port = ClassicPort::new(local, "AA:BB:CC:DD:EE:FF".to_string());

        assert_eq!(port.kind(), PortKind::Classic);
        assert_eq!(port.peer(), Some("AA:BB:CC:DD:EE:FF"));

        port.write_all(b"$PFLAU,0*00\r\n").await.unwrap();
        let mut buf = [0u8; 13];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"$PFLAU,0*00\r\n");

        remote.write_all(b"OK").await.unwrap();
        let mut buf = [0u8; 8];
        let n = port.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"OK");
    }

    #[tokio::test]
    async fn test_close() {
        let (local, mut remote) = tokio::io::duplex(64);
        let mut port = ClassicPort::new(local, "AA:BB:CC:DD:EE:FF".to_string());

        port.close().await.unwrap();

        // Remote sees EOF
        let mut buf = [0u8; 4];
        assert_eq!(remote.read(&mut buf).await.unwrap(), 0);

        assert_eq!(port.read(&mut buf).await.unwrap(), 0);
        let err = port.write(b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        // Closing twice is harmless
        port.close().await.unwrap();
    }
}
