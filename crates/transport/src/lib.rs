//! L2CAP channel endpoints for Bluetooth HID.
//!
//! A HID session rides on two connection-oriented datagram channels, the
//! control channel and the interrupt channel. This crate opens them in
//! either direction (connect to a peer, or listen and accept) and exposes
//! the local and remote address of an established channel.
//!
//! The [`Transport`], [`Listener`] and [`Channel`] traits are the seam the
//! pairing logic is written against; [`l2cap`] implements them on Linux
//! Bluetooth sockets and, with the `mock` feature, [`mock`] implements them
//! in memory.

pub mod error;
pub mod l2cap;
#[cfg(feature = "mock")]
pub mod mock;
pub mod sys;

pub use error::TransportError;
pub use l2cap::{L2capChannel, L2capListener, L2capTransport};

use std::future::Future;
use std::os::fd::RawFd;

use hidd_protocol::{BdAddr, ChannelRole};

/// One half-open or established channel.
///
/// Dropping a channel closes it.
pub trait Channel {
    /// Which HID channel this is.
    fn role(&self) -> ChannelRole;

    /// Address of the local adapter the channel is bound to.
    fn local_identity(&self) -> Result<BdAddr, TransportError>;

    /// Address of the connected peer.
    fn remote_identity(&self) -> Result<BdAddr, TransportError>;

    /// OS descriptor handed to the kernel driver, `None` once closed.
    fn raw_fd(&self) -> Option<RawFd>;

    fn is_open(&self) -> bool {
        self.raw_fd().is_some()
    }

    /// Releases the channel. Calling it again is a no-op.
    fn close(&mut self);
}

/// A channel bound to a role's PSM and waiting for peers.
pub trait Listener {
    type Channel: Channel;

    fn role(&self) -> ChannelRole;

    /// Waits until a peer connects and returns the new channel together
    /// with the peer's address.
    ///
    /// The wait itself is cancel-safe: dropping the future before it
    /// completes never loses a connection.
    fn accept(
        &self,
    ) -> impl Future<Output = Result<(Self::Channel, BdAddr), TransportError>>;
}

/// Factory for channels in both directions.
pub trait Transport {
    type Channel: Channel;
    type Listener: Listener<Channel = Self::Channel>;

    /// Opens `role`'s channel from `local` to `remote`. Blocks until the
    /// peer answers; never retries.
    fn connect(
        &self,
        local: BdAddr,
        remote: BdAddr,
        role: ChannelRole,
    ) -> Result<Self::Channel, TransportError>;

    /// Binds `role`'s PSM on `local` and starts listening.
    fn listen(
        &self,
        local: BdAddr,
        role: ChannelRole,
        backlog: u32,
    ) -> Result<Self::Listener, TransportError>;
}
