//! Session handoff to the kernel HID driver.
//!
//! The driver takes its own references to both channel sockets; after a
//! successful `HIDPCONNADD` the daemon's copies are closed and the report
//! traffic never passes through user space.

use std::ffi::c_char;
use std::marker::PhantomData;
use std::os::fd::{AsFd, OwnedFd, RawFd};

use hidd_protocol::SessionMetadata;
use hidd_protocol::constants::HIDP_NAME_LEN;
use hidd_transport::{Channel, sys};
use tracing::debug;

use crate::error::HandoffError;

/// `_IOW('H', 200, int)`
pub const HIDPCONNADD: u32 = 0x4004_48c8;

/// Registers an established channel pair with the HID driver.
pub trait SessionHandoff {
    /// Blocks until the driver accepts or rejects the session. The caller
    /// keeps ownership of both channels and closes them afterwards.
    fn create_session<C: Channel>(
        &self,
        control: &C,
        interrupt: &C,
        metadata: &SessionMetadata,
    ) -> Result<(), HandoffError>;
}

/// Kernel `struct hidp_connadd_req`.
#[repr(C)]
#[derive(Debug)]
pub struct HidpConnAddReq {
    pub ctrl_sock: libc::c_int,
    pub intr_sock: libc::c_int,
    pub parser: u16,
    pub rd_size: u16,
    pub rd_data: *mut u8,
    pub country: u8,
    pub subclass: u8,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
    pub flags: u32,
    pub idle_to: u32,
    pub name: [c_char; HIDP_NAME_LEN],
}

/// A filled-in request borrowing the descriptor bytes it points at.
#[derive(Debug)]
pub struct ConnAddRequest<'a> {
    raw: HidpConnAddReq,
    _descriptor: PhantomData<&'a [u8]>,
}

impl<'a> ConnAddRequest<'a> {
    pub fn new(
        ctrl_sock: RawFd,
        intr_sock: RawFd,
        metadata: &'a SessionMetadata,
    ) -> Result<Self, HandoffError> {
        let rd_size = u16::try_from(metadata.descriptor.len())
            .map_err(|_| HandoffError::DescriptorTooLarge(metadata.descriptor.len()))?;

        let mut name = [0 as c_char; HIDP_NAME_LEN];
        for (dst, src) in name.iter_mut().zip(metadata.driver_name().bytes()) {
            *dst = src as c_char;
        }

        let rd_data = if metadata.descriptor.is_empty() {
            std::ptr::null_mut()
        } else {
            // The driver only reads through this pointer.
            metadata.descriptor.as_ptr().cast_mut()
        };

        Ok(Self {
            raw: HidpConnAddReq {
                ctrl_sock,
                intr_sock,
                parser: metadata.parser,
                rd_size,
                rd_data,
                country: metadata.country,
                subclass: metadata.subclass,
                vendor: metadata.vendor,
                product: metadata.product,
                version: metadata.version,
                flags: metadata.flags,
                idle_to: metadata.idle_timeout_secs(),
                name,
            },
            _descriptor: PhantomData,
        })
    }

    pub fn raw(&self) -> &HidpConnAddReq {
        &self.raw
    }
}

/// Hands sessions to the kernel through a raw HIDP control socket.
#[derive(Debug)]
pub struct HidpHandoff {
    ctl: OwnedFd,
}

impl HidpHandoff {
    /// Opens the HIDP control socket. Fails when the kernel lacks HIDP
    /// support or the process lacks `CAP_NET_ADMIN`.
    pub fn open() -> Result<Self, HandoffError> {
        let ctl = sys::socket(libc::SOCK_RAW, sys::BTPROTO_HIDP)
            .map_err(HandoffError::ControlSocket)?;
        Ok(Self { ctl })
    }
}

impl SessionHandoff for HidpHandoff {
    fn create_session<C: Channel>(
        &self,
        control: &C,
        interrupt: &C,
        metadata: &SessionMetadata,
    ) -> Result<(), HandoffError> {
        let ctrl_sock = control
            .raw_fd()
            .ok_or(HandoffError::ChannelClosed(control.role()))?;
        let intr_sock = interrupt
            .raw_fd()
            .ok_or(HandoffError::ChannelClosed(interrupt.role()))?;

        let mut request = ConnAddRequest::new(ctrl_sock, intr_sock, metadata)?;
        // SAFETY: `request` is a valid hidp_connadd_req whose descriptor
        // pointer stays alive, via the borrow of `metadata`, for the call.
        unsafe {
            sys::ioctl(
                self.ctl.as_fd(),
                HIDPCONNADD,
                (&raw mut request.raw).cast(),
            )
        }
        .map_err(HandoffError::Rejected)?;

        debug!(name = %metadata.name, ctrl_sock, intr_sock, "HIDP session added");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn name_bytes(req: &HidpConnAddReq) -> Vec<u8> {
        req.name
            .iter()
            .take_while(|c| **c != 0)
            .map(|c| *c as u8)
            .collect()
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn layout_matches_kernel() {
        assert_eq!(std::mem::size_of::<HidpConnAddReq>(), 168);
        assert_eq!(std::mem::offset_of!(HidpConnAddReq, rd_data), 16);
        assert_eq!(std::mem::offset_of!(HidpConnAddReq, country), 24);
        assert_eq!(std::mem::offset_of!(HidpConnAddReq, flags), 32);
        assert_eq!(std::mem::offset_of!(HidpConnAddReq, name), 40);
    }

    #[test]
    fn fills_request_from_metadata() {
        let meta = SessionMetadata {
            name: "TestPad".into(),
            idle_timeout: Duration::from_secs(1800),
            descriptor: vec![0x05, 0x01, 0x09, 0x05],
            vendor: 0x054c,
            product: 0x05c4,
            version: 0x0100,
            country: 0x21,
            subclass: 0x08,
            ..SessionMetadata::default()
        };

        let request = ConnAddRequest::new(7, 8, &meta).unwrap();
        let raw = request.raw();
        assert_eq!((raw.ctrl_sock, raw.intr_sock), (7, 8));
        assert_eq!(raw.rd_size, 4);
        assert_eq!(raw.rd_data.cast_const(), meta.descriptor.as_ptr());
        assert_eq!(raw.idle_to, 1800);
        assert_eq!(raw.flags, 0);
        assert_eq!(raw.parser, 0x0100);
        assert_eq!((raw.vendor, raw.product, raw.version), (0x054c, 0x05c4, 0x0100));
        assert_eq!((raw.country, raw.subclass), (0x21, 0x08));
        assert_eq!(name_bytes(raw), b"TestPad");
    }

    #[test]
    fn empty_descriptor_is_null() {
        let meta = SessionMetadata::default();
        let request = ConnAddRequest::new(1, 2, &meta).unwrap();
        assert_eq!(request.raw().rd_size, 0);
        assert!(request.raw().rd_data.is_null());
    }

    #[test]
    fn long_name_keeps_terminator() {
        let meta = SessionMetadata {
            name: "é".repeat(100),
            ..SessionMetadata::default()
        };
        let request = ConnAddRequest::new(1, 2, &meta).unwrap();
        let name = name_bytes(request.raw());
        assert_eq!(name.len(), 126);
        assert!(std::str::from_utf8(&name).is_ok());
        assert_eq!(request.raw().name[HIDP_NAME_LEN - 1], 0);
    }

    #[test]
    fn oversized_descriptor_is_rejected() {
        let meta = SessionMetadata {
            descriptor: vec![0; 70_000],
            ..SessionMetadata::default()
        };
        assert!(matches!(
            ConnAddRequest::new(1, 2, &meta),
            Err(HandoffError::DescriptorTooLarge(70_000))
        ));
    }
}
