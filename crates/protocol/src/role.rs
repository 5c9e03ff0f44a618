use std::fmt;

use crate::constants::{PSM_HIDP_CTRL, PSM_HIDP_INTR};

/// The two L2CAP channels that make up a HID session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    /// Command/status exchanges.
    Control,
    /// Asynchronous input reports.
    Interrupt,
}

impl ChannelRole {
    /// Both roles, in the order they are opened when connecting.
    pub const BOTH: [ChannelRole; 2] = [ChannelRole::Control, ChannelRole::Interrupt];

    /// Well-known PSM for this role.
    pub const fn psm(self) -> u16 {
        match self {
            ChannelRole::Control => PSM_HIDP_CTRL,
            ChannelRole::Interrupt => PSM_HIDP_INTR,
        }
    }

    /// The other channel of the pair.
    pub const fn partner(self) -> Self {
        match self {
            ChannelRole::Control => ChannelRole::Interrupt,
            ChannelRole::Interrupt => ChannelRole::Control,
        }
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRole::Control => write!(f, "control"),
            ChannelRole::Interrupt => write!(f, "interrupt"),
        }
    }
}
