//! Shared types for the Bluetooth HID session daemon.
//!
//! Everything here is plain data: device addresses, the two HID channel
//! roles and their well-known PSMs, the class-of-device triplet reported by
//! an inquiry, and the metadata handed to the kernel HID driver.

pub mod address;
pub mod class;
pub mod constants;
pub mod metadata;
pub mod role;

// Re-export primary types for convenience.
pub use address::{AdapterSelector, AddressParseError, BdAddr};
pub use class::DeviceClass;
pub use metadata::SessionMetadata;
pub use role::ChannelRole;
