use std::io;

use hidd_protocol::{BdAddr, ChannelRole};
use hidd_transport::TransportError;

/// Descriptor lookup failures.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("{0} offers no HID service")]
    NoHidService(BdAddr),

    #[error("service query to {remote} failed: {reason}")]
    Query { remote: BdAddr, reason: String },
}

/// Kernel session registration failures.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("cannot open HIDP control socket: {0}")]
    ControlSocket(#[source] io::Error),

    #[error("HID driver rejected the session: {0}")]
    Rejected(#[source] io::Error),

    #[error("{0} channel closed before handoff")]
    ChannelClosed(ChannelRole),

    #[error("report descriptor of {0} bytes is too large")]
    DescriptorTooLarge(usize),
}

/// Why one pairing attempt did not produce a session.
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),

    #[error("channels from different peers: control {control}, interrupt {interrupt}")]
    PeerMismatch { control: BdAddr, interrupt: BdAddr },

    #[error("{role} channel from {remote} expired waiting for its partner")]
    Expired { remote: BdAddr, role: ChannelRole },
}
