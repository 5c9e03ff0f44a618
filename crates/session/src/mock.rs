//! Scriptable resolver and handoff doubles.

use std::io;
use std::sync::{Arc, Mutex};

use hidd_protocol::{BdAddr, ChannelRole, SessionMetadata};
use hidd_transport::Channel;

use crate::error::{HandoffError, ResolutionError};
use crate::handoff::SessionHandoff;
use crate::resolver::DescriptorResolver;

/// Resolver that answers every query the same way and logs the queries.
#[derive(Clone)]
pub struct StaticResolver {
    answer: Option<SessionMetadata>,
    queries: Arc<Mutex<Vec<(BdAddr, BdAddr)>>>,
}

impl StaticResolver {
    /// Every peer resolves to `metadata`.
    pub fn ok(metadata: SessionMetadata) -> Self {
        Self {
            answer: Some(metadata),
            queries: Arc::default(),
        }
    }

    /// Every peer lacks a HID service record.
    pub fn no_hid() -> Self {
        Self {
            answer: None,
            queries: Arc::default(),
        }
    }

    /// `(local, remote)` of every query so far.
    pub fn queries(&self) -> Vec<(BdAddr, BdAddr)> {
        self.queries.lock().unwrap().clone()
    }
}

impl DescriptorResolver for StaticResolver {
    fn resolve(&self, local: BdAddr, remote: BdAddr) -> Result<SessionMetadata, ResolutionError> {
        self.queries.lock().unwrap().push((local, remote));
        self.answer
            .clone()
            .ok_or(ResolutionError::NoHidService(remote))
    }
}

/// What the handoff double saw for one session.
#[derive(Debug, Clone)]
pub struct HandoffCall {
    pub remote: BdAddr,
    pub roles: (ChannelRole, ChannelRole),
    /// Whether both channels were still open when handed over.
    pub channels_open: bool,
    pub metadata: SessionMetadata,
}

/// Handoff that records each request and accepts or rejects all of them.
#[derive(Clone, Default)]
pub struct RecordingHandoff {
    reject: bool,
    calls: Arc<Mutex<Vec<HandoffCall>>>,
}

impl RecordingHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver that refuses every session.
    pub fn failing() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<HandoffCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl SessionHandoff for RecordingHandoff {
    fn create_session<C: Channel>(
        &self,
        control: &C,
        interrupt: &C,
        metadata: &SessionMetadata,
    ) -> Result<(), HandoffError> {
        self.calls.lock().unwrap().push(HandoffCall {
            remote: control.remote_identity().unwrap_or(BdAddr::NONE),
            roles: (control.role(), interrupt.role()),
            channels_open: control.is_open() && interrupt.is_open(),
            metadata: metadata.clone(),
        });

        if self.reject {
            return Err(HandoffError::Rejected(io::Error::from_raw_os_error(
                libc::EBADFD,
            )));
        }
        Ok(())
    }
}
