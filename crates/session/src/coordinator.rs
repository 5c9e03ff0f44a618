//! Pairing coordinator: turns two channels to one peer into a HID session.

use std::fmt;
use std::time::Duration;

use hidd_protocol::{BdAddr, ChannelRole};
use hidd_transport::{Channel, Transport};
use tracing::{info, warn};

use crate::error::PairingError;
use crate::handoff::SessionHandoff;
use crate::resolver::DescriptorResolver;

/// Where the current pairing attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    /// No attempt in progress.
    Idle,
    /// At least one channel is open, its partner is not.
    AwaitingBoth,
    /// Both channels are up; the descriptor is being fetched.
    Resolving,
    /// Metadata known; the driver is being asked to take over.
    HandingOff,
    /// The driver owns the session.
    Done,
    /// The attempt was abandoned and its channels closed.
    Failed,
}

impl fmt::Display for PairingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PairingState::Idle => "idle",
            PairingState::AwaitingBoth => "awaiting-both",
            PairingState::Resolving => "resolving",
            PairingState::HandingOff => "handing-off",
            PairingState::Done => "done",
            PairingState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub remote: BdAddr,
    pub name: String,
}

/// Drives one attempt at a time through
/// `Idle -> AwaitingBoth -> Resolving -> HandingOff -> Done | Failed`.
///
/// Every channel handed to the coordinator is closed before the attempt's
/// result is returned, whatever the outcome.
pub struct PairingCoordinator<T, R, H> {
    transport: T,
    resolver: R,
    handoff: H,
    local: BdAddr,
    idle_timeout: Duration,
    state: PairingState,
}

impl<T, R, H> PairingCoordinator<T, R, H>
where
    T: Transport,
    R: DescriptorResolver,
    H: SessionHandoff,
{
    pub fn new(transport: T, resolver: R, handoff: H, local: BdAddr, idle_timeout: Duration) -> Self {
        Self {
            transport,
            resolver,
            handoff,
            local,
            idle_timeout,
            state: PairingState::Idle,
        }
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    pub fn local(&self) -> BdAddr {
        self.local
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a terminal coordinator to `Idle` for the next attempt.
    pub fn reset(&mut self) {
        self.state = PairingState::Idle;
    }

    /// Marks a half-open attempt.
    pub fn awaiting(&mut self) {
        self.state = PairingState::AwaitingBoth;
    }

    /// Connecting role: opens control then interrupt to `remote` and, once
    /// both are up, resolves and hands off the session.
    pub fn connect(&mut self, remote: BdAddr) -> Result<Session, PairingError> {
        self.state = PairingState::AwaitingBoth;
        info!(%remote, "connecting");

        match self.open_pair(remote) {
            Ok((control, interrupt)) => self.establish(control, interrupt, Some(remote)),
            Err(e) => Err(self.fail(remote, e)),
        }
    }

    fn open_pair(&self, remote: BdAddr) -> Result<(T::Channel, T::Channel), PairingError> {
        let mut control = self
            .transport
            .connect(self.local, remote, ChannelRole::Control)?;

        match self
            .transport
            .connect(self.local, remote, ChannelRole::Interrupt)
        {
            Ok(interrupt) => Ok((control, interrupt)),
            Err(e) => {
                control.close();
                Err(e.into())
            }
        }
    }

    /// Takes a complete channel pair through resolution and handoff, then
    /// closes both channels. `remote` is the peer address when the caller
    /// already knows it; otherwise it is read from the control channel.
    pub fn establish(
        &mut self,
        mut control: T::Channel,
        mut interrupt: T::Channel,
        remote: Option<BdAddr>,
    ) -> Result<Session, PairingError> {
        self.state = PairingState::Resolving;
        let result = self.resolve_and_hand_off(&control, &interrupt, remote);
        let remote = remote.or_else(|| control.remote_identity().ok());

        control.close();
        interrupt.close();

        match result {
            Ok(session) => {
                self.state = PairingState::Done;
                info!(remote = %session.remote, name = %session.name, "HID session created");
                Ok(session)
            }
            Err(e) => {
                let remote = remote.unwrap_or(BdAddr::NONE);
                Err(self.fail(remote, e))
            }
        }
    }

    fn resolve_and_hand_off(
        &mut self,
        control: &T::Channel,
        interrupt: &T::Channel,
        remote: Option<BdAddr>,
    ) -> Result<Session, PairingError> {
        let local = if self.local.is_specific() {
            self.local
        } else {
            control.local_identity()?
        };
        let remote = match remote {
            Some(remote) => remote,
            None => control.remote_identity()?,
        };

        let metadata = self
            .resolver
            .resolve(local, remote)?
            .with_idle_timeout(self.idle_timeout);

        self.state = PairingState::HandingOff;
        self.handoff.create_session(control, interrupt, &metadata)?;

        Ok(Session {
            remote,
            name: metadata.name,
        })
    }

    /// Records a failed attempt and passes the error back.
    pub fn fail(&mut self, remote: BdAddr, error: PairingError) -> PairingError {
        self.state = PairingState::Failed;
        warn!(%remote, "pairing failed: {error}");
        error
    }
}
