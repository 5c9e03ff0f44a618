//! Service Discovery Protocol client for HID devices.
//!
//! Before the kernel can drive a HID peer it needs the device's report
//! descriptor and a few identifiers, all of which live in the peer's SDP
//! records. This crate implements just enough SDP to fetch them: the data
//! element codec, the ServiceSearchAttribute transaction with continuation
//! handling, and extraction of the HID and PnP Information records.
//!
//! # Wire format
//!
//! ```text
//! PDU:       [1: pdu id][2 BE: transaction][2 BE: parameter length][params]
//! Element:   [5 bits type | 3 bits size index][optional length][data]
//! ```

pub mod client;
pub mod element;
pub mod error;
pub mod hid;
pub mod pdu;
pub mod record;

pub use client::SdpClient;
pub use element::{DataElement, Uuid};
pub use error::SdpError;
pub use hid::{hid_metadata, query_hid_device};
pub use record::ServiceRecord;

use std::time::Duration;

/// How long to wait for a single SDP response.
pub const SDP_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Receive buffer size; the default L2CAP MTU for SDP.
pub const SDP_RECV_BUFFER: usize = 672;

/// Maximum attribute bytes requested per response fragment.
pub const SDP_MAX_ATTR_BYTES: u16 = 0xffff;
