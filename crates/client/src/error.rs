// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fa_core::ConfigError;
use fa_wire::ProtocolError;
use thiserror::Error;

use crate::supervisor::StartError;

/// Reply text the agent uses for a tunnel that isn't up yet
const TUNNEL_UNAVAILABLE: &str = "tunnel unavailable";

/// Reply text the agent uses for a name with no addresses
const NO_SUCH_HOST: &str = "no such host";

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("agent not running")]
    NotRunning,

    #[error("tunnel unavailable")]
    TunnelUnavailable,

    #[error("no such host")]
    NoSuchHost,

    /// An `err` reply from the agent
    #[error("{0}")]
    Agent(String),

    /// A platform API failure
    #[error("{0}")]
    Api(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("another process is already starting the agent")]
    AlreadyStarting(#[source] std::io::Error),

    #[error("failed starting agent process: {0}")]
    Launch(#[source] std::io::Error),

    #[error(transparent)]
    Start(#[from] StartError),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ClientError>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Decode an `err` reply, recognizing the agent's canonical messages.
    pub(crate) fn from_agent(message: String) -> Self {
        match message.as_str() {
            TUNNEL_UNAVAILABLE => ClientError::TunnelUnavailable,
            NO_SUCH_HOST => ClientError::NoSuchHost,
            _ => ClientError::Agent(message),
        }
    }

    pub(crate) fn context(self, context: impl Into<String>) -> Self {
        ClientError::Context { context: context.into(), source: Box::new(self) }
    }

    /// The innermost error beneath any added context.
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), ClientError::Cancelled)
    }
}
