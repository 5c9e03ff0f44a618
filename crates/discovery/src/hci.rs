//! Raw HCI socket access: adapter enumeration and inquiry.
//!
//! The kernel exchanges fixed C layouts with user space here. The device
//! list and device info structs are declared `repr(C)`; the inquiry buffer
//! is a packed header followed by packed 14-byte responses, so it is
//! encoded and decoded by hand.

use std::ffi::c_void;
use std::os::fd::{AsFd, OwnedFd};

use hidd_protocol::constants::MAX_INQUIRY_LENGTH;
use hidd_protocol::{AdapterSelector, BdAddr, DeviceClass};
use hidd_transport::sys;
use tracing::{debug, info};

use crate::types::InquiryResponse;
use crate::{DiscoveryError, Inquiry};

/// `_IOR('H', 210, int)`
pub const HCIGETDEVLIST: u32 = 0x8004_48d2;
/// `_IOR('H', 211, int)`
pub const HCIGETDEVINFO: u32 = 0x8004_48d3;
/// `_IOR('H', 240, int)`
pub const HCIINQUIRY: u32 = 0x8004_48f0;

const HCI_MAX_DEV: usize = 16;
/// Bit index of the "device up" flag in `hci_dev_info.flags`.
const HCI_UP: u32 = 0;

/// General inquiry access code 0x9E8B33, little-endian.
pub const GIAC_LAP: [u8; 3] = [0x33, 0x8b, 0x9e];
/// Inquiry flags; zero keeps the kernel's inquiry cache.
const IREQ_FLAGS: u16 = 0;
/// `num_rsp` of zero asks the kernel for up to this many responses.
const MAX_RESPONSES: usize = 255;

/// `struct hci_inquiry_req`: dev_id, flags, lap[3], length, num_rsp, padded.
pub const INQUIRY_REQUEST_LEN: usize = 10;
/// `struct inquiry_info`, packed.
pub const INQUIRY_INFO_LEN: usize = 14;

#[repr(C)]
#[derive(Clone, Copy, Default)]
#[allow(dead_code)]
struct HciDevReq {
    dev_id: u16,
    dev_opt: u32,
}

#[repr(C)]
struct HciDevListReq {
    dev_num: u16,
    dev_req: [HciDevReq; HCI_MAX_DEV],
}

#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct HciDevStats {
    err_rx: u32,
    err_tx: u32,
    cmd_tx: u32,
    evt_rx: u32,
    acl_tx: u32,
    acl_rx: u32,
    sco_tx: u32,
    sco_rx: u32,
    byte_rx: u32,
    byte_tx: u32,
}

#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct HciDevInfo {
    dev_id: u16,
    name: [u8; 8],
    bdaddr: [u8; 6],
    flags: u32,
    dev_type: u8,
    features: [u8; 8],
    pkt_type: u32,
    link_policy: u32,
    link_mode: u32,
    acl_mtu: u16,
    acl_pkts: u16,
    sco_mtu: u16,
    sco_pkts: u16,
    stat: HciDevStats,
}

/// A local Bluetooth adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub id: u16,
    /// Kernel name, e.g. `hci0`.
    pub name: String,
    pub address: BdAddr,
    pub up: bool,
}

impl AdapterInfo {
    fn from_raw(info: &HciDevInfo) -> Self {
        let end = info.name.iter().position(|b| *b == 0).unwrap_or(info.name.len());
        Self {
            id: info.dev_id,
            name: String::from_utf8_lossy(&info.name[..end]).into_owned(),
            address: BdAddr::from_le_bytes(info.bdaddr),
            up: info.flags & (1 << HCI_UP) != 0,
        }
    }
}

fn hci_socket() -> Result<OwnedFd, DiscoveryError> {
    Ok(sys::socket(libc::SOCK_RAW, sys::BTPROTO_HCI)?)
}

fn device_info(ctl: &OwnedFd, id: u16) -> Result<AdapterInfo, DiscoveryError> {
    let mut info = HciDevInfo {
        dev_id: id,
        ..HciDevInfo::default()
    };
    // SAFETY: `info` is a properly laid out hci_dev_info.
    unsafe { sys::ioctl(ctl.as_fd(), HCIGETDEVINFO, (&raw mut info).cast::<c_void>()) }?;
    Ok(AdapterInfo::from_raw(&info))
}

/// Every adapter the kernel knows about, up or not.
pub fn adapters() -> Result<Vec<AdapterInfo>, DiscoveryError> {
    let ctl = hci_socket()?;
    let mut list = HciDevListReq {
        dev_num: HCI_MAX_DEV as u16,
        dev_req: [HciDevReq::default(); HCI_MAX_DEV],
    };
    // SAFETY: `list` has room for `dev_num` entries.
    unsafe { sys::ioctl(ctl.as_fd(), HCIGETDEVLIST, (&raw mut list).cast::<c_void>()) }?;

    let count = usize::from(list.dev_num).min(HCI_MAX_DEV);
    list.dev_req[..count]
        .iter()
        .map(|req| device_info(&ctl, req.dev_id))
        .collect()
}

/// Picks the adapter a selector names. `Any` means the first adapter that
/// is up.
pub fn resolve_adapter(selector: AdapterSelector) -> Result<AdapterInfo, DiscoveryError> {
    match selector {
        AdapterSelector::Index(id) => device_info(&hci_socket()?, id)
            .map_err(|_| DiscoveryError::NoAdapter(format!("hci{id}"))),
        AdapterSelector::Address(addr) => adapters()?
            .into_iter()
            .find(|a| a.address == addr)
            .ok_or_else(|| DiscoveryError::NoAdapter(addr.to_string())),
        AdapterSelector::Any => adapters()?
            .into_iter()
            .find(|a| a.up)
            .ok_or_else(|| DiscoveryError::NoAdapter("available".into())),
    }
}

/// Builds the ioctl buffer for an inquiry on adapter `dev_id`: the request
/// header followed by room for every possible response.
pub fn encode_inquiry_request(dev_id: u16, length: u8) -> Result<Vec<u8>, DiscoveryError> {
    if !(1..=MAX_INQUIRY_LENGTH).contains(&length) {
        return Err(DiscoveryError::InvalidLength(length));
    }
    let mut buf = vec![0u8; INQUIRY_REQUEST_LEN + MAX_RESPONSES * INQUIRY_INFO_LEN];
    buf[0..2].copy_from_slice(&dev_id.to_ne_bytes());
    buf[2..4].copy_from_slice(&IREQ_FLAGS.to_ne_bytes());
    buf[4..7].copy_from_slice(&GIAC_LAP);
    buf[7] = length;
    buf[8] = 0; // num_rsp: unlimited
    Ok(buf)
}

/// Reads the responses the kernel wrote back into an inquiry buffer.
pub fn parse_inquiry_response(buf: &[u8]) -> Result<Vec<InquiryResponse>, DiscoveryError> {
    let count = usize::from(
        *buf.get(8)
            .ok_or_else(|| DiscoveryError::Malformed("short inquiry header".into()))?,
    );
    let body = buf
        .get(INQUIRY_REQUEST_LEN..INQUIRY_REQUEST_LEN + count * INQUIRY_INFO_LEN)
        .ok_or_else(|| {
            DiscoveryError::Malformed(format!("{count} responses do not fit the buffer"))
        })?;

    Ok(body
        .chunks_exact(INQUIRY_INFO_LEN)
        .map(|info| {
            let mut address = [0u8; 6];
            address.copy_from_slice(&info[0..6]);
            // info[6..9]: page scan repetition, period and mode
            InquiryResponse {
                address: BdAddr::from_le_bytes(address),
                class: DeviceClass::new([info[9], info[10], info[11]]),
                clock_offset: u16::from_le_bytes([info[12], info[13]]),
            }
        })
        .collect())
}

/// Inquiry through the kernel's `HCIINQUIRY` ioctl. Blocks for the whole
/// scan.
#[derive(Debug, Default, Clone, Copy)]
pub struct HciInquiry;

impl Inquiry for HciInquiry {
    fn scan(&self, local: BdAddr, length: u8) -> Result<Vec<InquiryResponse>, DiscoveryError> {
        let selector = if local.is_specific() {
            AdapterSelector::Address(local)
        } else {
            AdapterSelector::Any
        };
        let adapter = resolve_adapter(selector)?;
        let mut buf = encode_inquiry_request(adapter.id, length)?;
        info!(adapter = %adapter.name, length, "scanning for devices");

        let ctl = hci_socket()?;
        // SAFETY: `buf` holds a request header plus room for the largest
        // response count the header permits.
        unsafe { sys::ioctl(ctl.as_fd(), HCIINQUIRY, buf.as_mut_ptr().cast::<c_void>()) }?;

        let found = parse_inquiry_response(&buf)?;
        debug!(count = found.len(), "inquiry complete");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_layouts_match_kernel() {
        assert_eq!(std::mem::size_of::<HciDevReq>(), 8);
        assert_eq!(std::mem::offset_of!(HciDevListReq, dev_req), 4);
        assert_eq!(std::mem::size_of::<HciDevInfo>(), 92);
        assert_eq!(std::mem::offset_of!(HciDevInfo, flags), 16);
        assert_eq!(std::mem::offset_of!(HciDevInfo, pkt_type), 32);
        assert_eq!(std::mem::offset_of!(HciDevInfo, stat), 52);
    }

    #[test]
    fn adapter_from_raw_info() {
        let mut raw = HciDevInfo {
            dev_id: 1,
            flags: 1 << HCI_UP,
            bdaddr: [0x66, 0x55, 0x44, 0x33, 0x22, 0x11],
            ..HciDevInfo::default()
        };
        raw.name[..4].copy_from_slice(b"hci1");

        let info = AdapterInfo::from_raw(&raw);
        assert_eq!(info.name, "hci1");
        assert_eq!(info.address.to_string(), "11:22:33:44:55:66");
        assert!(info.up);
    }

    #[test]
    fn request_header_layout() {
        let buf = encode_inquiry_request(2, 8).unwrap();
        assert_eq!(buf.len(), INQUIRY_REQUEST_LEN + 255 * INQUIRY_INFO_LEN);
        assert_eq!(u16::from_ne_bytes([buf[0], buf[1]]), 2);
        assert_eq!(u16::from_ne_bytes([buf[2], buf[3]]), 0);
        assert_eq!(&buf[4..7], &[0x33, 0x8b, 0x9e]);
        assert_eq!(buf[7], 8);
        assert_eq!(buf[8], 0);
    }

    #[test]
    fn inquiry_length_within_kernel_limit() {
        assert!(encode_inquiry_request(0, 1).is_ok());
        assert_eq!(encode_inquiry_request(0, 60).unwrap()[7], 60);
        for bad in [0, 61, 255] {
            assert!(matches!(
                encode_inquiry_request(0, bad),
                Err(DiscoveryError::InvalidLength(n)) if n == bad
            ));
        }
    }

    #[test]
    fn parses_packed_responses() {
        let mut buf = encode_inquiry_request(0, 8).unwrap();
        buf[8] = 2;
        let first = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, // bdaddr
            0x01, 0x00, 0x00, // scan modes
            0x40, 0x25, 0x00, // class
            0x34, 0x12, // clock offset
        ];
        let second = [
            0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x01, 0x00, 0x00, 0x0c, 0x01, 0x5a, 0, 0,
        ];
        buf[10..24].copy_from_slice(&first);
        buf[24..38].copy_from_slice(&second);

        let found = parse_inquiry_response(&buf).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].address.to_string(), "06:05:04:03:02:01");
        assert!(found[0].is_hid());
        assert_eq!(found[0].clock_offset, 0x1234);
        assert_eq!(found[1].class, DeviceClass::new([0x0c, 0x01, 0x5a]));
        assert!(!found[1].is_hid());
    }

    #[test]
    fn rejects_count_beyond_buffer() {
        let mut buf = vec![0u8; INQUIRY_REQUEST_LEN + INQUIRY_INFO_LEN];
        buf[8] = 2;
        assert!(matches!(
            parse_inquiry_response(&buf),
            Err(DiscoveryError::Malformed(_))
        ));
        assert!(parse_inquiry_response(&[0; 4]).is_err());
    }
}
