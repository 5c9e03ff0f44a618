//! HID channels on Linux L2CAP sockets.

use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};

use hidd_protocol::constants::{FLUSH_TIMEOUT_INFINITE, HIDP_DEFAULT_MTU};
use hidd_protocol::{BdAddr, ChannelRole};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::sys;
use crate::{Channel, Listener, Transport};

/// Opens HID channels over `SOCK_SEQPACKET` L2CAP sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct L2capTransport;

impl L2capTransport {
    pub fn new() -> Self {
        Self
    }
}

fn tune(fd: &OwnedFd, role: ChannelRole) {
    // Peers cope with the kernel defaults, so a refusal is only noted.
    if let Err(e) = sys::set_l2cap_options(fd.as_fd(), HIDP_DEFAULT_MTU, FLUSH_TIMEOUT_INFINITE) {
        warn!(%role, "cannot set L2CAP options: {e}");
    }
}

impl Transport for L2capTransport {
    type Channel = L2capChannel;
    type Listener = L2capListener;

    fn connect(
        &self,
        local: BdAddr,
        remote: BdAddr,
        role: ChannelRole,
    ) -> Result<L2capChannel, TransportError> {
        let fd = sys::socket(libc::SOCK_SEQPACKET, sys::BTPROTO_L2CAP)
            .map_err(|source| TransportError::Socket { role, source })?;

        sys::bind_l2cap(fd.as_fd(), local, 0)
            .map_err(|source| TransportError::Bind { role, source })?;

        tune(&fd, role);

        sys::connect_l2cap(fd.as_fd(), remote, role.psm()).map_err(|source| {
            TransportError::Connect {
                role,
                remote,
                source,
            }
        })?;

        debug!(%remote, %role, "channel connected");
        Ok(L2capChannel::new(fd, role))
    }

    /// Must be called from within a tokio runtime: the listener registers
    /// with the runtime's reactor.
    fn listen(
        &self,
        local: BdAddr,
        role: ChannelRole,
        backlog: u32,
    ) -> Result<L2capListener, TransportError> {
        let fd = sys::socket(libc::SOCK_SEQPACKET | libc::SOCK_NONBLOCK, sys::BTPROTO_L2CAP)
            .map_err(|source| TransportError::Socket { role, source })?;

        sys::bind_l2cap(fd.as_fd(), local, role.psm())
            .map_err(|source| TransportError::Bind { role, source })?;

        if let Err(e) = sys::set_link_mode(fd.as_fd(), sys::L2CAP_LM_MASTER) {
            warn!(%role, "cannot request master link mode: {e}");
        }
        tune(&fd, role);

        sys::listen(fd.as_fd(), backlog)
            .map_err(|source| TransportError::Listen { role, source })?;

        // SAFETY: `fd` is an open socket owned by the `AsyncFd` from here on
        // and its descriptor never changes.
        let fd = unsafe { AsyncFd::register_with_interest(fd, Interest::READABLE) }
            .map_err(|e| TransportError::Listen {
                role,
                source: e.into(),
            })?;

        debug!(%local, %role, psm = role.psm(), "listening");
        Ok(L2capListener { fd, role })
    }
}

/// An established (or closed) HID channel.
#[derive(Debug)]
pub struct L2capChannel {
    fd: Option<OwnedFd>,
    role: ChannelRole,
}

impl L2capChannel {
    fn new(fd: OwnedFd, role: ChannelRole) -> Self {
        Self { fd: Some(fd), role }
    }

    fn open_fd(&self) -> Result<&OwnedFd, TransportError> {
        self.fd.as_ref().ok_or(TransportError::Closed(self.role))
    }
}

impl Channel for L2capChannel {
    fn role(&self) -> ChannelRole {
        self.role
    }

    fn local_identity(&self) -> Result<BdAddr, TransportError> {
        sys::local_l2cap(self.open_fd()?.as_fd()).map_err(|source| TransportError::Identity {
            role: self.role,
            source,
        })
    }

    fn remote_identity(&self) -> Result<BdAddr, TransportError> {
        sys::peer_l2cap(self.open_fd()?.as_fd()).map_err(|source| TransportError::Identity {
            role: self.role,
            source,
        })
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.fd.as_ref().map(|fd| fd.as_raw_fd())
    }

    fn close(&mut self) {
        // Dropping the descriptor closes it.
        self.fd.take();
    }
}

/// A non-blocking listening socket registered with the tokio reactor.
#[derive(Debug)]
pub struct L2capListener {
    fd: AsyncFd<OwnedFd>,
    role: ChannelRole,
}

impl Listener for L2capListener {
    type Channel = L2capChannel;

    fn role(&self) -> ChannelRole {
        self.role
    }

    async fn accept(&self) -> Result<(L2capChannel, BdAddr), TransportError> {
        let role = self.role;
        loop {
            let mut guard = self
                .fd
                .readable()
                .await
                .map_err(|source| TransportError::Accept { role, source })?;

            match guard.try_io(|inner| sys::accept_l2cap(inner.get_ref().as_fd())) {
                Ok(Ok((fd, remote))) => {
                    debug!(%remote, %role, "channel accepted");
                    return Ok((L2capChannel::new(fd, role), remote));
                }
                Ok(Err(source)) => return Err(TransportError::Accept { role, source }),
                // Spurious readiness; readiness was cleared, wait again.
                Err(_would_block) => continue,
            }
        }
    }
}
