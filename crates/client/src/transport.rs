// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! How a client reaches the agent: a Unix socket, or a named pipe where
//! Unix sockets are unavailable.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fa_core::Paths;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ClientError;

/// Byte stream to the agent
pub trait AgentStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AgentStream for T {}

/// One open connection to the agent
pub type Connection = Box<dyn AgentStream>;

/// Opens connections to the agent.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<Connection, ClientError>;

    /// Address shown in diagnostics
    fn address(&self) -> String;
}

/// The transport for this platform, selected once from the config layout.
pub fn default_transport(paths: &Paths) -> Arc<dyn Transport> {
    #[cfg(unix)]
    {
        Arc::new(UnixTransport::new(&paths.socket_path))
    }
    #[cfg(windows)]
    {
        Arc::new(PipeTransport::new(paths.pipe_name()))
    }
}

/// A missing or refusing endpoint means no agent is listening there; a
/// stale socket file looks the same as an absent one.
fn map_connect_error(e: io::Error) -> ClientError {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => ClientError::NotRunning,
        _ => ClientError::Io(e),
    }
}

#[derive(Debug, Clone)]
pub struct UnixTransport {
    path: PathBuf,
}

impl UnixTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(unix)]
#[async_trait]
impl Transport for UnixTransport {
    async fn connect(&self) -> Result<Connection, ClientError> {
        let stream = tokio::net::UnixStream::connect(&self.path).await.map_err(map_connect_error)?;
        Ok(Box::new(stream))
    }

    fn address(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(windows)]
#[derive(Debug, Clone)]
pub struct PipeTransport {
    name: String,
}

#[cfg(windows)]
impl PipeTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[cfg(windows)]
#[async_trait]
impl Transport for PipeTransport {
    async fn connect(&self) -> Result<Connection, ClientError> {
        use tokio::net::windows::named_pipe::ClientOptions;

        // ERROR_PIPE_BUSY: every instance is taken, the server is about to
        // create another
        const PIPE_BUSY: i32 = 231;
        for _ in 0..20 {
            match ClientOptions::new().open(&self.name) {
                Ok(pipe) => return Ok(Box::new(pipe)),
                Err(e) if e.raw_os_error() == Some(PIPE_BUSY) => {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
                Err(e) => return Err(map_connect_error(e)),
            }
        }
        Err(ClientError::Io(io::Error::new(io::ErrorKind::TimedOut, "agent pipe busy")))
    }

    fn address(&self) -> String {
        self.name.clone()
    }
}

#[cfg(all(test, unix))]
#[path = "transport_tests.rs"]
mod tests;
