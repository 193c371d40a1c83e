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

//! RFCOMM server port.
//!
//! The port owns a registered server endpoint and accepts exactly one inbound
//! connection, either explicitly through [`ServerPort::accept`] or on first I/O.
//! The endpoint is released as soon as that connection arrives.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use super::{closed_error, Port, PortKind};
use crate::bluetooth::platform::RfcommAcceptor;

enum ServerState<A: RfcommAcceptor> {
    Listening(A),
    Connected { stream: A::Stream, peer: String },
    Closed,
}

pub struct ServerPort<A: RfcommAcceptor> {
    state: ServerState<A>,
}

impl<A: RfcommAcceptor> ServerPort<A> {
    pub fn new(acceptor: A) -> Self {
        info!("RFCOMM server port waiting for a connection");
        Self {
            state: ServerState::Listening(acceptor),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ServerState::Connected { .. })
    }

    /// Wait for the inbound connection. Returns immediately once connected.
    pub async fn accept(&mut self) -> io::Result<()> {
        match &mut self.state {
            ServerState::Listening(acceptor) => {
                let (stream, peer) = acceptor.accept().await?;
                info!("Server port accepted connection from {}", peer);
                // Dropping the acceptor unregisters the endpoint
                self.state = ServerState::Connected { stream, peer };
                Ok(())
            }
            ServerState::Connected { .. } => Ok(()),
            ServerState::Closed => Err(closed_error(PortKind::Server)),
        }
    }

    async fn stream(&mut self) -> io::Result<Option<&mut A::Stream>> {
        if matches!(self.state, ServerState::Closed) {
            return Ok(None);
        }
        self.accept().await?;
        match &mut self.state {
            ServerState::Connected { stream, .. } => Ok(Some(stream)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl<A: RfcommAcceptor + 'static> Port for ServerPort<A> {
    fn kind(&self) -> PortKind {
        PortKind::Server
    }

    fn peer(&self) -> Option<&str> {
        match &self.state {
            ServerState::Connected { peer, .. } => Some(peer),
            _ => None,
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream().await? {
            Some(stream) => stream.read(buf).await,
            None => Ok(0),
        }
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let stream = self
            .stream()
            .await?
            .ok_or_else(|| closed_error(PortKind::Server))?;
        let n = stream.write(data).await?;
        stream.flush().await?;
        Ok(n)
    }

    async fn close(&mut self) -> io::Result<()> {
        match std::mem::replace(&mut self.state, ServerState::Closed) {
            ServerState::Connected { mut stream, peer } => {
                debug!("Closing server port connection from {}", peer);
                stream.shutdown().await
            }
            ServerState::Listening(_) => {
                debug!("Closing server port before any connection");
                Ok(())
            }
            ServerState::Closed => Ok(()),
        }
    }
}
