//! Service records assembled from attribute lists.

use std::collections::BTreeMap;

use crate::element::DataElement;
use crate::error::{SdpError, malformed};

/// One service record: attribute id to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRecord {
    attributes: BTreeMap<u16, DataElement>,
}

impl ServiceRecord {
    pub fn get(&self, id: u16) -> Option<&DataElement> {
        self.attributes.get(&id)
    }

    pub fn u16(&self, id: u16) -> Option<u16> {
        self.get(id).and_then(DataElement::as_u16)
    }

    pub fn u8(&self, id: u16) -> Option<u8> {
        self.get(id).and_then(DataElement::as_u8)
    }

    pub fn text(&self, id: u16) -> Option<&[u8]> {
        self.get(id).and_then(DataElement::as_text)
    }

    pub fn insert(&mut self, id: u16, value: DataElement) {
        self.attributes.insert(id, value);
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    fn from_element(elem: &DataElement) -> Result<Self, SdpError> {
        let items = elem
            .as_sequence()
            .ok_or_else(|| malformed("attribute list is not a sequence"))?;
        if items.len() % 2 != 0 {
            return Err(malformed("attribute list has an odd element count"));
        }

        let mut record = ServiceRecord::default();
        for pair in items.chunks_exact(2) {
            let id = match pair[0] {
                DataElement::Uint16(id) => id,
                ref other => return Err(malformed(format!("attribute id {other:?}"))),
            };
            record.insert(id, pair[1].clone());
        }
        Ok(record)
    }
}

/// Parses the reassembled AttributeLists of a ServiceSearchAttribute
/// response: a sequence of per-record attribute lists.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<ServiceRecord>, SdpError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let (outer, used) = DataElement::decode(bytes)?;
    if used != bytes.len() {
        return Err(malformed(format!(
            "{} trailing bytes after attribute lists",
            bytes.len() - used
        )));
    }

    outer
        .as_sequence()
        .ok_or_else(|| malformed("attribute lists are not a sequence"))?
        .iter()
        .map(ServiceRecord::from_element)
        .collect()
}
