//! Error types for the transport layer.

use std::io;

use hidd_protocol::{BdAddr, ChannelRole};

/// Errors produced while opening, accepting or inspecting a channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot create {role} socket: {source}")]
    Socket { role: ChannelRole, source: io::Error },

    #[error("cannot bind {role} channel: {source}")]
    Bind { role: ChannelRole, source: io::Error },

    #[error("cannot connect {role} channel to {remote}: {source}")]
    Connect {
        role: ChannelRole,
        remote: BdAddr,
        source: io::Error,
    },

    #[error("cannot listen on {role} channel: {source}")]
    Listen { role: ChannelRole, source: io::Error },

    #[error("accept on {role} channel failed: {source}")]
    Accept { role: ChannelRole, source: io::Error },

    #[error("cannot read {role} channel address: {source}")]
    Identity { role: ChannelRole, source: io::Error },

    #[error("{0} channel is closed")]
    Closed(ChannelRole),
}

impl TransportError {
    /// The channel the failure happened on.
    pub fn role(&self) -> ChannelRole {
        match self {
            TransportError::Socket { role, .. }
            | TransportError::Bind { role, .. }
            | TransportError::Connect { role, .. }
            | TransportError::Listen { role, .. }
            | TransportError::Accept { role, .. }
            | TransportError::Identity { role, .. } => *role,
            TransportError::Closed(role) => *role,
        }
    }
}
