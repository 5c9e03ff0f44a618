pub mod driver;
pub mod hci;
pub mod types;

// Re-export primary types.
pub use driver::DiscoveryDriver;
pub use hci::{AdapterInfo, HciInquiry};
pub use types::{DiscoveryReport, InquiryResponse};

use hidd_protocol::BdAddr;

/// Errors for discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("inquiry found no devices")]
    NoDevices,

    #[error("no Bluetooth adapter {0}")]
    NoAdapter(String),

    #[error("HCI error: {0}")]
    Hci(#[from] std::io::Error),

    #[error("inquiry length {0} outside 1..=60")]
    InvalidLength(u8),

    #[error("malformed inquiry result: {0}")]
    Malformed(String),
}

/// A bounded inquiry scan.
pub trait Inquiry {
    /// Scans from adapter `local` for `length` units of 1.28 s and returns
    /// every responder once, in the order they answered.
    fn scan(&self, local: BdAddr, length: u8) -> Result<Vec<InquiryResponse>, DiscoveryError>;
}

impl<F> Inquiry for F
where
    F: Fn(BdAddr, u8) -> Result<Vec<InquiryResponse>, DiscoveryError>,
{
    fn scan(&self, local: BdAddr, length: u8) -> Result<Vec<InquiryResponse>, DiscoveryError> {
        self(local, length)
    }
}
