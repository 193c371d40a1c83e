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

//! Byte-stream ports handed to the application core.
//!
//! A port is owned exclusively by whoever receives it. The three variants share
//! no state; the caller only sees the `Port` trait.

mod classic;
mod gatt;
mod server;

pub use classic::ClassicPort;
pub use gatt::GattPort;
pub use server::ServerPort;

use async_trait::async_trait;
use std::fmt;
use std::io;

/// Which transport backs a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// RFCOMM client on the Serial Port Profile.
    Classic,
    /// GATT serial emulation (HM-10).
    Gatt,
    /// RFCOMM server accepting one inbound connection.
    Server,
}

impl PortKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortKind::Classic => "classic",
            PortKind::Gatt => "gatt",
            PortKind::Server => "server",
        }
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bidirectional byte stream with explicit close.
#[async_trait]
pub trait Port: Send {
    fn kind(&self) -> PortKind;

    /// Address of the remote end, once known.
    fn peer(&self) -> Option<&str>;

    /// Read into `buf`. `Ok(0)` means the remote closed the link.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write part of `data`, returning how much was accepted.
    async fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Write all of `data`.
    async fn write_all(&mut self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            let n = self.write(data).await?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "port accepted no bytes"));
            }
            data = &data[n..];
        }
        Ok(())
    }

    /// Shut the link down. Further reads return 0 and writes fail.
    async fn close(&mut self) -> io::Result<()>;
}

pub(crate) fn closed_error(kind: PortKind) -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, format!("{} port closed", kind))
}
