//! ServiceSearchAttribute request and response PDUs.

use crate::element::{DataElement, Uuid};
use crate::error::{SdpError, malformed};

pub const SDP_ERROR_RSP: u8 = 0x01;
pub const SDP_SVC_SEARCH_ATTR_REQ: u8 = 0x06;
pub const SDP_SVC_SEARCH_ATTR_RSP: u8 = 0x07;

/// PDU id, transaction id and parameter length.
pub const PDU_HEADER_LEN: usize = 5;

/// Continuation state is at most 16 bytes.
pub const MAX_CONTINUATION_LEN: usize = 16;

/// Attribute id range covering every attribute.
const ALL_ATTRIBUTES: u32 = 0x0000_ffff;

/// Builds a ServiceSearchAttribute request for every attribute of every
/// record whose class list contains `uuid`.
pub fn search_attr_request(
    transaction: u16,
    uuid: Uuid,
    max_bytes: u16,
    continuation: &[u8],
) -> Vec<u8> {
    let mut params = Vec::new();
    DataElement::Sequence(vec![DataElement::Uuid(uuid)]).encode(&mut params);
    params.extend_from_slice(&max_bytes.to_be_bytes());
    DataElement::Sequence(vec![DataElement::Uint32(ALL_ATTRIBUTES)]).encode(&mut params);
    let continuation = &continuation[..continuation.len().min(MAX_CONTINUATION_LEN)];
    params.push(continuation.len() as u8);
    params.extend_from_slice(continuation);

    let mut pdu = Vec::with_capacity(PDU_HEADER_LEN + params.len());
    pdu.push(SDP_SVC_SEARCH_ATTR_REQ);
    pdu.extend_from_slice(&transaction.to_be_bytes());
    pdu.extend_from_slice(&(params.len() as u16).to_be_bytes());
    pdu.extend_from_slice(&params);
    pdu
}

/// One response PDU's share of the attribute lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchAttrFragment {
    pub attribute_lists: Vec<u8>,
    /// Empty when this was the last fragment.
    pub continuation: Vec<u8>,
}

/// Parses a ServiceSearchAttribute response belonging to `transaction`.
pub fn parse_search_attr_response(
    pdu: &[u8],
    transaction: u16,
) -> Result<SearchAttrFragment, SdpError> {
    if pdu.len() < PDU_HEADER_LEN {
        return Err(malformed(format!("PDU of {} bytes", pdu.len())));
    }
    let pdu_id = pdu[0];
    let actual = u16::from_be_bytes([pdu[1], pdu[2]]);
    let param_len = usize::from(u16::from_be_bytes([pdu[3], pdu[4]]));
    let params = pdu
        .get(PDU_HEADER_LEN..PDU_HEADER_LEN + param_len)
        .ok_or_else(|| malformed("parameter length exceeds PDU"))?;

    if actual != transaction {
        return Err(SdpError::TransactionMismatch {
            expected: transaction,
            actual,
        });
    }

    match pdu_id {
        SDP_SVC_SEARCH_ATTR_RSP => {}
        SDP_ERROR_RSP => {
            let code = params
                .get(..2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
                .unwrap_or(0);
            return Err(SdpError::Remote(code));
        }
        other => return Err(SdpError::UnexpectedPdu(other)),
    }

    let count = params
        .get(..2)
        .map(|b| usize::from(u16::from_be_bytes([b[0], b[1]])))
        .ok_or_else(|| malformed("missing attribute list byte count"))?;
    let lists = params
        .get(2..2 + count)
        .ok_or_else(|| malformed("attribute lists exceed parameters"))?;

    let cont_len = usize::from(
        *params
            .get(2 + count)
            .ok_or_else(|| malformed("missing continuation state"))?,
    );
    if cont_len > MAX_CONTINUATION_LEN {
        return Err(malformed(format!("continuation state of {cont_len} bytes")));
    }
    let continuation = params
        .get(3 + count..3 + count + cont_len)
        .ok_or_else(|| malformed("truncated continuation state"))?;

    Ok(SearchAttrFragment {
        attribute_lists: lists.to_vec(),
        continuation: continuation.to_vec(),
    })
}

#[cfg(test)]
pub(crate) fn search_attr_response(transaction: u16, lists: &[u8], continuation: &[u8]) -> Vec<u8> {
    let mut params = Vec::new();
    params.extend_from_slice(&(lists.len() as u16).to_be_bytes());
    params.extend_from_slice(lists);
    params.push(continuation.len() as u8);
    params.extend_from_slice(continuation);

    let mut pdu = vec![SDP_SVC_SEARCH_ATTR_RSP];
    pdu.extend_from_slice(&transaction.to_be_bytes());
    pdu.extend_from_slice(&(params.len() as u16).to_be_bytes());
    pdu.extend_from_slice(&params);
    pdu
}
