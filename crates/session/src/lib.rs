//! HID session establishment.
//!
//! A [`PairingCoordinator`] takes a control and an interrupt channel to the
//! same peer, asks a [`DescriptorResolver`] for the device's metadata and
//! registers the pair with the kernel through a [`SessionHandoff`]. In the
//! connecting role it opens the channels itself; in the listening role a
//! [`PairingServer`] accepts them and matches halves by peer address.

pub mod coordinator;
pub mod error;
pub mod handoff;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod resolver;
pub mod server;

pub use coordinator::{PairingCoordinator, PairingState, Session};
pub use error::{HandoffError, PairingError, ResolutionError};
pub use handoff::{HidpHandoff, SessionHandoff};
pub use resolver::{DescriptorResolver, SdpResolver};
pub use server::{PairingPolicy, PairingServer, PendingPairs, ServerStats};
