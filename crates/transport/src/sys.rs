//! Thin wrappers over the Linux Bluetooth socket API.
//!
//! Only what the daemon needs: L2CAP sockets for the HID channels and SDP,
//! raw HCI and HIDP sockets for inquiry and session creation, and an ioctl
//! shim. Everything returns `io::Result` carrying `errno`.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::time::Duration;

use hidd_protocol::BdAddr;
use libc::{c_int, c_void, socklen_t};

pub const BTPROTO_L2CAP: c_int = 0;
pub const BTPROTO_HCI: c_int = 1;
pub const BTPROTO_HIDP: c_int = 6;

const SOL_L2CAP: c_int = 6;
const L2CAP_OPTIONS: c_int = 0x01;
const L2CAP_LM: c_int = 0x03;

/// Link mode: prefer to be master of the baseband link.
pub const L2CAP_LM_MASTER: c_int = 0x0001;

/// `struct sockaddr_l2`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct SockaddrL2 {
    l2_family: libc::sa_family_t,
    l2_psm: u16,
    l2_bdaddr: [u8; 6],
    l2_cid: u16,
    l2_bdaddr_type: u8,
}

impl SockaddrL2 {
    fn new(addr: BdAddr, psm: u16) -> Self {
        Self {
            l2_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            l2_psm: psm.to_le(),
            l2_bdaddr: addr.to_le_bytes(),
            ..Self::default()
        }
    }
}

/// `struct l2cap_options`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct L2capOptions {
    omtu: u16,
    imtu: u16,
    flush_to: u16,
    mode: u8,
    fcs: u8,
    max_tx: u8,
    txwin_size: u16,
}

fn cvt(ret: c_int) -> io::Result<c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

fn cvt_size(ret: isize) -> io::Result<usize> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

/// Opens an `AF_BLUETOOTH` socket. `SOCK_CLOEXEC` is always added.
pub fn socket(ty: c_int, protocol: c_int) -> io::Result<OwnedFd> {
    let fd = cvt(unsafe { libc::socket(libc::AF_BLUETOOTH, ty | libc::SOCK_CLOEXEC, protocol) })?;
    // SAFETY: `fd` was just returned by socket(2) and nothing else owns it.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

pub fn bind_l2cap(fd: BorrowedFd<'_>, addr: BdAddr, psm: u16) -> io::Result<()> {
    let sa = SockaddrL2::new(addr, psm);
    cvt(unsafe {
        libc::bind(
            fd.as_raw_fd(),
            (&sa as *const SockaddrL2).cast::<libc::sockaddr>(),
            mem::size_of::<SockaddrL2>() as socklen_t,
        )
    })?;
    Ok(())
}

pub fn connect_l2cap(fd: BorrowedFd<'_>, addr: BdAddr, psm: u16) -> io::Result<()> {
    let sa = SockaddrL2::new(addr, psm);
    cvt(unsafe {
        libc::connect(
            fd.as_raw_fd(),
            (&sa as *const SockaddrL2).cast::<libc::sockaddr>(),
            mem::size_of::<SockaddrL2>() as socklen_t,
        )
    })?;
    Ok(())
}

pub fn listen(fd: BorrowedFd<'_>, backlog: u32) -> io::Result<()> {
    let backlog = c_int::try_from(backlog).unwrap_or(c_int::MAX);
    cvt(unsafe { libc::listen(fd.as_raw_fd(), backlog) })?;
    Ok(())
}

/// Accepts one connection. The new socket is blocking regardless of the
/// listener's mode.
pub fn accept_l2cap(fd: BorrowedFd<'_>) -> io::Result<(OwnedFd, BdAddr)> {
    let mut sa = SockaddrL2::default();
    let mut len = mem::size_of::<SockaddrL2>() as socklen_t;
    let nfd = cvt(unsafe {
        libc::accept4(
            fd.as_raw_fd(),
            (&mut sa as *mut SockaddrL2).cast::<libc::sockaddr>(),
            &mut len,
            libc::SOCK_CLOEXEC,
        )
    })?;
    // SAFETY: `nfd` was just returned by accept4(2) and nothing else owns it.
    let owned = unsafe { OwnedFd::from_raw_fd(nfd) };
    Ok((owned, BdAddr::from_le_bytes(sa.l2_bdaddr)))
}

/// Address the socket is bound to (getsockname).
pub fn local_l2cap(fd: BorrowedFd<'_>) -> io::Result<BdAddr> {
    let mut sa = SockaddrL2::default();
    let mut len = mem::size_of::<SockaddrL2>() as socklen_t;
    cvt(unsafe {
        libc::getsockname(
            fd.as_raw_fd(),
            (&mut sa as *mut SockaddrL2).cast::<libc::sockaddr>(),
            &mut len,
        )
    })?;
    Ok(BdAddr::from_le_bytes(sa.l2_bdaddr))
}

/// Address of the connected peer (getpeername).
pub fn peer_l2cap(fd: BorrowedFd<'_>) -> io::Result<BdAddr> {
    let mut sa = SockaddrL2::default();
    let mut len = mem::size_of::<SockaddrL2>() as socklen_t;
    cvt(unsafe {
        libc::getpeername(
            fd.as_raw_fd(),
            (&mut sa as *mut SockaddrL2).cast::<libc::sockaddr>(),
            &mut len,
        )
    })?;
    Ok(BdAddr::from_le_bytes(sa.l2_bdaddr))
}

/// Sets both MTUs and the flush timeout, keeping the kernel's other
/// channel options.
pub fn set_l2cap_options(fd: BorrowedFd<'_>, mtu: u16, flush_to: u16) -> io::Result<()> {
    let mut opts = L2capOptions::default();
    let mut len = mem::size_of::<L2capOptions>() as socklen_t;
    cvt(unsafe {
        libc::getsockopt(
            fd.as_raw_fd(),
            SOL_L2CAP,
            L2CAP_OPTIONS,
            (&mut opts as *mut L2capOptions).cast::<c_void>(),
            &mut len,
        )
    })?;

    opts.imtu = mtu;
    opts.omtu = mtu;
    opts.flush_to = flush_to;

    cvt(unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            SOL_L2CAP,
            L2CAP_OPTIONS,
            (&opts as *const L2capOptions).cast::<c_void>(),
            mem::size_of::<L2capOptions>() as socklen_t,
        )
    })?;
    Ok(())
}

pub fn set_link_mode(fd: BorrowedFd<'_>, mode: c_int) -> io::Result<()> {
    cvt(unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            SOL_L2CAP,
            L2CAP_LM,
            (&mode as *const c_int).cast::<c_void>(),
            mem::size_of::<c_int>() as socklen_t,
        )
    })?;
    Ok(())
}

/// Bounds how long a blocking receive may wait.
pub fn set_recv_timeout(fd: BorrowedFd<'_>, timeout: Duration) -> io::Result<()> {
    let tv = libc::timeval {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    };
    cvt(unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_RCVTIMEO,
            (&tv as *const libc::timeval).cast::<c_void>(),
            mem::size_of::<libc::timeval>() as socklen_t,
        )
    })?;
    Ok(())
}

/// Sends one datagram.
pub fn send(fd: BorrowedFd<'_>, buf: &[u8]) -> io::Result<usize> {
    cvt_size(unsafe {
        libc::send(
            fd.as_raw_fd(),
            buf.as_ptr().cast::<c_void>(),
            buf.len(),
            libc::MSG_NOSIGNAL,
        )
    })
}

/// Receives one datagram into `buf`, returning its length.
pub fn recv(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    cvt_size(unsafe { libc::recv(fd.as_raw_fd(), buf.as_mut_ptr().cast::<c_void>(), buf.len(), 0) })
}

/// Issues an ioctl whose argument is a pointer.
///
/// # Safety
///
/// `arg` must point to memory laid out as `request` expects, valid for
/// reads and writes of that size for the duration of the call.
pub unsafe fn ioctl(fd: BorrowedFd<'_>, request: u32, arg: *mut c_void) -> io::Result<c_int> {
    // SAFETY: upheld by the caller.
    cvt(unsafe { libc::ioctl(fd.as_raw_fd(), request as _, arg) })
}
