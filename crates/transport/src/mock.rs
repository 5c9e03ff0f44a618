//! In-memory transport for tests.
//!
//! [`MockTransport`] hands out [`MockChannel`]s and keeps count of how many
//! are still open, so tests can assert that no failure path leaks one.
//! Connect failures are scripted per (peer, role); incoming connections
//! are queued per role and delivered by the matching [`MockListener`].

use std::collections::{HashMap, HashSet};
use std::io;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hidd_protocol::{BdAddr, ChannelRole};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::{Channel, Listener, Transport};

const FIRST_FD: RawFd = 100;

enum Incoming {
    Peer(BdAddr),
    Fail,
}

struct State {
    local: BdAddr,
    open: AtomicUsize,
    next_fd: AtomicI32,
    connects: Mutex<Vec<(BdAddr, ChannelRole)>>,
    refused: Mutex<HashSet<(BdAddr, ChannelRole)>>,
    refused_listen: Mutex<HashSet<ChannelRole>>,
    senders: HashMap<ChannelRole, mpsc::UnboundedSender<Incoming>>,
    receivers: Mutex<HashMap<ChannelRole, mpsc::UnboundedReceiver<Incoming>>>,
}

impl State {
    fn open_channel(self: &Arc<Self>, role: ChannelRole, remote: BdAddr) -> MockChannel {
        self.open.fetch_add(1, Ordering::SeqCst);
        MockChannel {
            role,
            local: self.local,
            remote,
            fd: self.next_fd.fetch_add(1, Ordering::SeqCst),
            open: true,
            state: Arc::clone(self),
        }
    }
}

/// Cloneable handle; clones share state.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<State>,
}

impl MockTransport {
    /// Creates a transport whose channels report `local` as their adapter.
    pub fn new(local: BdAddr) -> Self {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for role in ChannelRole::BOTH {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.insert(role, tx);
            receivers.insert(role, rx);
        }

        Self {
            state: Arc::new(State {
                local,
                open: AtomicUsize::new(0),
                next_fd: AtomicI32::new(FIRST_FD),
                connects: Mutex::new(Vec::new()),
                refused: Mutex::new(HashSet::new()),
                refused_listen: Mutex::new(HashSet::new()),
                senders,
                receivers: Mutex::new(receivers),
            }),
        }
    }

    /// Number of channels created and not yet closed.
    pub fn open_channels(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    /// Every connect attempt so far, in order, including refused ones.
    pub fn connect_log(&self) -> Vec<(BdAddr, ChannelRole)> {
        self.state.connects.lock().unwrap().clone()
    }

    /// Makes connects of `role` to `remote` fail.
    pub fn refuse(&self, remote: BdAddr, role: ChannelRole) {
        self.state.refused.lock().unwrap().insert((remote, role));
    }

    /// Makes `listen` fail for `role`.
    pub fn refuse_listen(&self, role: ChannelRole) {
        self.state.refused_listen.lock().unwrap().insert(role);
    }

    /// Queues a connection from `remote` on `role`'s listener.
    pub fn incoming(&self, role: ChannelRole, remote: BdAddr) {
        let _ = self.state.senders[&role].send(Incoming::Peer(remote));
    }

    /// Queues a failing accept on `role`'s listener.
    pub fn incoming_failure(&self, role: ChannelRole) {
        let _ = self.state.senders[&role].send(Incoming::Fail);
    }
}

impl Transport for MockTransport {
    type Channel = MockChannel;
    type Listener = MockListener;

    fn connect(
        &self,
        _local: BdAddr,
        remote: BdAddr,
        role: ChannelRole,
    ) -> Result<MockChannel, TransportError> {
        self.state.connects.lock().unwrap().push((remote, role));

        if self.state.refused.lock().unwrap().contains(&(remote, role)) {
            return Err(TransportError::Connect {
                role,
                remote,
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        }
        Ok(self.state.open_channel(role, remote))
    }

    fn listen(
        &self,
        _local: BdAddr,
        role: ChannelRole,
        _backlog: u32,
    ) -> Result<MockListener, TransportError> {
        if self.state.refused_listen.lock().unwrap().contains(&role) {
            return Err(TransportError::Bind {
                role,
                source: io::Error::from(io::ErrorKind::AddrInUse),
            });
        }

        let rx = self
            .state
            .receivers
            .lock()
            .unwrap()
            .remove(&role)
            .ok_or_else(|| TransportError::Bind {
                role,
                source: io::Error::from(io::ErrorKind::AddrInUse),
            })?;

        Ok(MockListener {
            role,
            rx: tokio::sync::Mutex::new(rx),
            state: Arc::clone(&self.state),
        })
    }
}

/// Listener fed by [`MockTransport::incoming`].
pub struct MockListener {
    role: ChannelRole,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Incoming>>,
    state: Arc<State>,
}

impl Listener for MockListener {
    type Channel = MockChannel;

    fn role(&self) -> ChannelRole {
        self.role
    }

    async fn accept(&self) -> Result<(MockChannel, BdAddr), TransportError> {
        let next = self.rx.lock().await.recv().await;
        match next {
            Some(Incoming::Peer(remote)) => Ok((self.state.open_channel(self.role, remote), remote)),
            Some(Incoming::Fail) => Err(TransportError::Accept {
                role: self.role,
                source: io::Error::from(io::ErrorKind::ConnectionAborted),
            }),
            // Transport handle gone: nobody will ever connect.
            None => std::future::pending().await,
        }
    }
}

/// A channel that only exists in the accounting of its [`MockTransport`].
pub struct MockChannel {
    role: ChannelRole,
    local: BdAddr,
    remote: BdAddr,
    fd: RawFd,
    open: bool,
    state: Arc<State>,
}

impl std::fmt::Debug for MockChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChannel")
            .field("role", &self.role)
            .field("remote", &self.remote)
            .field("fd", &self.fd)
            .field("open", &self.open)
            .finish()
    }
}

impl Channel for MockChannel {
    fn role(&self) -> ChannelRole {
        self.role
    }

    fn local_identity(&self) -> Result<BdAddr, TransportError> {
        if !self.open {
            return Err(TransportError::Closed(self.role));
        }
        Ok(self.local)
    }

    fn remote_identity(&self) -> Result<BdAddr, TransportError> {
        if !self.open {
            return Err(TransportError::Closed(self.role));
        }
        Ok(self.remote)
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.open.then_some(self.fd)
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.state.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockChannel {
    fn drop(&mut self) {
        self.close();
    }
}
