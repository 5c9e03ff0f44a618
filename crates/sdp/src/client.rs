//! Blocking SDP client over an L2CAP connection to PSM 1.

use std::os::fd::{AsFd, OwnedFd};

use hidd_protocol::BdAddr;
use hidd_protocol::constants::PSM_SDP;
use hidd_transport::sys;
use tracing::{debug, trace};

use crate::element::Uuid;
use crate::error::{SdpError, malformed};
use crate::pdu::{parse_search_attr_response, search_attr_request};
use crate::record::{ServiceRecord, parse_records};
use crate::{SDP_MAX_ATTR_BYTES, SDP_RECV_BUFFER, SDP_RESPONSE_TIMEOUT};

/// Upper bound on continuation round trips for one search.
const MAX_FRAGMENTS: usize = 64;

/// An open SDP session with one peer. The connection closes on drop.
#[derive(Debug)]
pub struct SdpClient {
    fd: OwnedFd,
    transaction: u16,
    buf: Vec<u8>,
}

impl SdpClient {
    /// Connects from adapter `local` to `remote`'s SDP server.
    pub fn connect(local: BdAddr, remote: BdAddr) -> Result<Self, SdpError> {
        let fd = sys::socket(libc::SOCK_SEQPACKET, sys::BTPROTO_L2CAP)?;
        sys::bind_l2cap(fd.as_fd(), local, 0)?;
        sys::set_recv_timeout(fd.as_fd(), SDP_RESPONSE_TIMEOUT)?;
        sys::connect_l2cap(fd.as_fd(), remote, PSM_SDP)?;
        debug!(%remote, "SDP session open");

        Ok(Self {
            fd,
            transaction: 0,
            buf: vec![0; SDP_RECV_BUFFER],
        })
    }

    /// Fetches every attribute of every record of service class `uuid`.
    pub fn search_attributes(&mut self, uuid: Uuid) -> Result<Vec<ServiceRecord>, SdpError> {
        let Self {
            fd,
            transaction,
            buf,
        } = self;

        collect_records(uuid, transaction, |request| {
            sys::send(fd.as_fd(), request)?;
            let n = sys::recv(fd.as_fd(), buf)?;
            Ok(buf[..n].to_vec())
        })
    }
}

/// Runs one search to completion, following continuation state. `exchange`
/// sends a request PDU and returns the response PDU.
pub(crate) fn collect_records<F>(
    uuid: Uuid,
    transaction: &mut u16,
    mut exchange: F,
) -> Result<Vec<ServiceRecord>, SdpError>
where
    F: FnMut(&[u8]) -> Result<Vec<u8>, SdpError>,
{
    let mut lists = Vec::new();
    let mut continuation = Vec::new();

    for _ in 0..MAX_FRAGMENTS {
        *transaction = transaction.wrapping_add(1);
        let request = search_attr_request(*transaction, uuid, SDP_MAX_ATTR_BYTES, &continuation);
        let response = exchange(&request)?;
        let fragment = parse_search_attr_response(&response, *transaction)?;
        trace!(
            bytes = fragment.attribute_lists.len(),
            more = !fragment.continuation.is_empty(),
            "SDP fragment"
        );

        lists.extend_from_slice(&fragment.attribute_lists);
        if fragment.continuation.is_empty() {
            return parse_records(&lists);
        }
        continuation = fragment.continuation;
    }

    Err(malformed(format!("more than {MAX_FRAGMENTS} response fragments")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::DataElement;
    use crate::pdu::search_attr_response;

    fn one_record() -> Vec<u8> {
        let outer = DataElement::Sequence(vec![DataElement::Sequence(vec![
            DataElement::Uint16(0x0100),
            DataElement::Text(b"Gamepad".to_vec()),
        ])]);
        let mut out = Vec::new();
        outer.encode(&mut out);
        out
    }

    fn tid(request: &[u8]) -> u16 {
        u16::from_be_bytes([request[1], request[2]])
    }

    #[test]
    fn reassembles_fragments() {
        let lists = one_record();
        let (first, second) = lists.split_at(4);
        let mut sent = Vec::new();
        let mut transaction = 0;

        let records = collect_records(Uuid::Uuid16(0x1124), &mut transaction, |req| {
            sent.push(req.to_vec());
            Ok(match sent.len() {
                1 => search_attr_response(tid(req), first, &[0x04, 0x00]),
                _ => search_attr_response(tid(req), second, &[]),
            })
        })
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text(0x0100), Some(&b"Gamepad"[..]));
        assert_eq!(sent.len(), 2);
        // Second request echoes the continuation state.
        assert_eq!(&sent[1][sent[1].len() - 3..], &[0x02, 0x04, 0x00]);
        assert_eq!(transaction, 2);
    }

    #[test]
    fn stops_runaway_continuation() {
        let mut transaction = 0;
        let result = collect_records(Uuid::Uuid16(0x1124), &mut transaction, |req| {
            Ok(search_attr_response(tid(req), &[], &[0x01]))
        });
        assert!(matches!(result, Err(SdpError::Malformed(_))));
    }

    #[test]
    fn propagates_exchange_failure() {
        let mut transaction = 0;
        let result = collect_records(Uuid::Uuid16(0x1124), &mut transaction, |_| {
            Err(SdpError::Io(std::io::ErrorKind::TimedOut.into()))
        });
        assert!(matches!(result, Err(SdpError::Io(_))));
    }
}
