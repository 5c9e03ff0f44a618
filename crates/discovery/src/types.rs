use std::fmt;

use hidd_protocol::{BdAddr, DeviceClass};
use hidd_session::{PairingError, Session};

/// One device that answered an inquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InquiryResponse {
    pub address: BdAddr,
    pub class: DeviceClass,
    pub clock_offset: u16,
}

impl InquiryResponse {
    pub fn new(address: BdAddr, class: DeviceClass) -> Self {
        Self {
            address,
            class,
            clock_offset: 0,
        }
    }

    /// Whether this responder is a HID peripheral worth connecting to.
    pub fn is_hid(&self) -> bool {
        self.class.is_hid_peripheral()
    }
}

impl fmt::Display for InquiryResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (class {})", self.address, self.class)
    }
}

/// What one discovery run did.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Every responder, HID or not.
    pub found: Vec<InquiryResponse>,
    /// HID candidates, in the order they were tried.
    pub attempted: Vec<BdAddr>,
    pub paired: Vec<Session>,
    pub failed: Vec<(BdAddr, PairingError)>,
}

impl DiscoveryReport {
    /// True when no attempted candidate failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
