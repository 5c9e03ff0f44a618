//! SDP data element codec.
//!
//! Every element starts with a one-byte header: the high five bits carry the
//! type, the low three a size index. Indices 0..=4 are fixed sizes of 1, 2,
//! 4, 8 and 16 bytes (0 means no data for nil); 5..=7 are followed by an
//! explicit big-endian length of 1, 2 or 4 bytes.

use crate::error::{SdpError, malformed};

const TYPE_NIL: u8 = 0;
const TYPE_UINT: u8 = 1;
const TYPE_INT: u8 = 2;
const TYPE_UUID: u8 = 3;
const TYPE_TEXT: u8 = 4;
const TYPE_BOOL: u8 = 5;
const TYPE_SEQUENCE: u8 = 6;
const TYPE_ALTERNATIVE: u8 = 7;
const TYPE_URL: u8 = 8;

/// Nesting limit for sequences; peers are not trusted to be sane.
const MAX_DEPTH: usize = 16;

/// A Bluetooth UUID as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uuid {
    Uuid16(u16),
    Uuid32(u32),
    Uuid128([u8; 16]),
}

impl Uuid {
    /// The 16-bit alias, if this UUID has one.
    pub fn as_u16(&self) -> Option<u16> {
        match *self {
            Uuid::Uuid16(v) => Some(v),
            Uuid::Uuid32(v) => u16::try_from(v).ok(),
            Uuid::Uuid128(_) => None,
        }
    }
}

/// A decoded SDP data element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataElement {
    Nil,
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Uint128([u8; 16]),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128([u8; 16]),
    Uuid(Uuid),
    /// Raw bytes; SDP text has no mandated encoding and HID descriptors
    /// travel as text elements.
    Text(Vec<u8>),
    Bool(bool),
    Sequence(Vec<DataElement>),
    Alternative(Vec<DataElement>),
    Url(Vec<u8>),
}

impl DataElement {
    /// Unsigned integer value of width 64 bits or less.
    pub fn as_uint(&self) -> Option<u64> {
        match *self {
            DataElement::Uint8(v) => Some(v.into()),
            DataElement::Uint16(v) => Some(v.into()),
            DataElement::Uint32(v) => Some(v.into()),
            DataElement::Uint64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        self.as_uint().and_then(|v| u16::try_from(v).ok())
    }

    pub fn as_u8(&self) -> Option<u8> {
        self.as_uint().and_then(|v| u8::try_from(v).ok())
    }

    pub fn as_text(&self) -> Option<&[u8]> {
        match self {
            DataElement::Text(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Children of a sequence or alternative.
    pub fn as_sequence(&self) -> Option<&[DataElement]> {
        match self {
            DataElement::Sequence(items) | DataElement::Alternative(items) => Some(items),
            _ => None,
        }
    }

    /// Decodes one element from the front of `buf`, returning it with the
    /// number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(DataElement, usize), SdpError> {
        decode_at_depth(buf, 0)
    }

    /// Appends the wire form of this element to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            DataElement::Nil => out.push(TYPE_NIL << 3),
            DataElement::Uint8(v) => fixed(out, TYPE_UINT, &v.to_be_bytes()),
            DataElement::Uint16(v) => fixed(out, TYPE_UINT, &v.to_be_bytes()),
            DataElement::Uint32(v) => fixed(out, TYPE_UINT, &v.to_be_bytes()),
            DataElement::Uint64(v) => fixed(out, TYPE_UINT, &v.to_be_bytes()),
            DataElement::Uint128(v) => fixed(out, TYPE_UINT, v),
            DataElement::Int8(v) => fixed(out, TYPE_INT, &v.to_be_bytes()),
            DataElement::Int16(v) => fixed(out, TYPE_INT, &v.to_be_bytes()),
            DataElement::Int32(v) => fixed(out, TYPE_INT, &v.to_be_bytes()),
            DataElement::Int64(v) => fixed(out, TYPE_INT, &v.to_be_bytes()),
            DataElement::Int128(v) => fixed(out, TYPE_INT, v),
            DataElement::Uuid(Uuid::Uuid16(v)) => fixed(out, TYPE_UUID, &v.to_be_bytes()),
            DataElement::Uuid(Uuid::Uuid32(v)) => fixed(out, TYPE_UUID, &v.to_be_bytes()),
            DataElement::Uuid(Uuid::Uuid128(v)) => fixed(out, TYPE_UUID, v),
            DataElement::Bool(v) => fixed(out, TYPE_BOOL, &[u8::from(*v)]),
            DataElement::Text(bytes) => variable(out, TYPE_TEXT, bytes),
            DataElement::Url(bytes) => variable(out, TYPE_URL, bytes),
            DataElement::Sequence(items) => {
                let body = encode_all(items);
                variable(out, TYPE_SEQUENCE, &body);
            }
            DataElement::Alternative(items) => {
                let body = encode_all(items);
                variable(out, TYPE_ALTERNATIVE, &body);
            }
        }
    }
}

fn encode_all(items: &[DataElement]) -> Vec<u8> {
    let mut body = Vec::new();
    for item in items {
        item.encode(&mut body);
    }
    body
}

fn fixed(out: &mut Vec<u8>, kind: u8, data: &[u8]) {
    let index = match data.len() {
        1 => 0,
        2 => 1,
        4 => 2,
        8 => 3,
        _ => 4,
    };
    out.push(kind << 3 | index);
    out.extend_from_slice(data);
}

fn variable(out: &mut Vec<u8>, kind: u8, data: &[u8]) {
    let len = data.len();
    if let Ok(len) = u8::try_from(len) {
        out.push(kind << 3 | 5);
        out.push(len);
    } else if let Ok(len) = u16::try_from(len) {
        out.push(kind << 3 | 6);
        out.extend_from_slice(&len.to_be_bytes());
    } else {
        out.push(kind << 3 | 7);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
    out.extend_from_slice(data);
}

fn read_len(buf: &[u8], width: usize) -> Result<usize, SdpError> {
    let bytes = buf
        .get(1..1 + width)
        .ok_or_else(|| malformed("truncated element length"))?;
    Ok(bytes.iter().fold(0usize, |acc, b| acc << 8 | usize::from(*b)))
}

fn decode_at_depth(buf: &[u8], depth: usize) -> Result<(DataElement, usize), SdpError> {
    if depth > MAX_DEPTH {
        return Err(malformed("elements nested too deeply"));
    }

    let header = *buf.first().ok_or_else(|| malformed("empty element"))?;
    let kind = header >> 3;
    let index = header & 0x07;

    let (header_len, len): (usize, usize) = match index {
        0 if kind == TYPE_NIL => (1, 0),
        0 => (1, 1),
        1 => (1, 2),
        2 => (1, 4),
        3 => (1, 8),
        4 => (1, 16),
        5 => (2, read_len(buf, 1)?),
        6 => (3, read_len(buf, 2)?),
        _ => (5, read_len(buf, 4)?),
    };

    let body = header_len
        .checked_add(len)
        .and_then(|end| buf.get(header_len..end))
        .ok_or_else(|| malformed(format!("element claims {len} bytes, {} left", buf.len())))?;

    let element = match kind {
        TYPE_NIL if index == 0 => DataElement::Nil,
        TYPE_UINT => match body.len() {
            1 => DataElement::Uint8(body[0]),
            2 => DataElement::Uint16(u16::from_be_bytes([body[0], body[1]])),
            4 => DataElement::Uint32(u32::from_be_bytes(array(body)?)),
            8 => DataElement::Uint64(u64::from_be_bytes(array(body)?)),
            16 => DataElement::Uint128(array(body)?),
            n => return Err(malformed(format!("unsigned integer of {n} bytes"))),
        },
        TYPE_INT => match body.len() {
            1 => DataElement::Int8(body[0] as i8),
            2 => DataElement::Int16(i16::from_be_bytes([body[0], body[1]])),
            4 => DataElement::Int32(i32::from_be_bytes(array(body)?)),
            8 => DataElement::Int64(i64::from_be_bytes(array(body)?)),
            16 => DataElement::Int128(array(body)?),
            n => return Err(malformed(format!("signed integer of {n} bytes"))),
        },
        TYPE_UUID => match body.len() {
            2 => DataElement::Uuid(Uuid::Uuid16(u16::from_be_bytes([body[0], body[1]]))),
            4 => DataElement::Uuid(Uuid::Uuid32(u32::from_be_bytes(array(body)?))),
            16 => DataElement::Uuid(Uuid::Uuid128(array(body)?)),
            n => return Err(malformed(format!("UUID of {n} bytes"))),
        },
        TYPE_TEXT => DataElement::Text(body.to_vec()),
        TYPE_BOOL if body.len() == 1 => DataElement::Bool(body[0] != 0),
        TYPE_SEQUENCE => DataElement::Sequence(decode_children(body, depth)?),
        TYPE_ALTERNATIVE => DataElement::Alternative(decode_children(body, depth)?),
        TYPE_URL => DataElement::Url(body.to_vec()),
        _ => return Err(malformed(format!("bad element header 0x{header:02x}"))),
    };

    Ok((element, header_len + len))
}

fn decode_children(mut body: &[u8], depth: usize) -> Result<Vec<DataElement>, SdpError> {
    let mut items = Vec::new();
    while !body.is_empty() {
        let (item, used) = decode_at_depth(body, depth + 1)?;
        items.push(item);
        body = &body[used..];
    }
    Ok(items)
}

fn array<const N: usize>(body: &[u8]) -> Result<[u8; N], SdpError> {
    body.try_into()
        .map_err(|_| malformed(format!("expected {N} bytes, got {}", body.len())))
}
