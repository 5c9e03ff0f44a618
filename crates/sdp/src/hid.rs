//! HID and PnP Information record extraction.

use hidd_protocol::{BdAddr, SessionMetadata};
use tracing::{debug, warn};

use crate::client::SdpClient;
use crate::element::{DataElement, Uuid};
use crate::error::SdpError;
use crate::record::ServiceRecord;

pub const HID_SERVICE_CLASS: u16 = 0x1124;
pub const PNP_INFO_SERVICE_CLASS: u16 = 0x1200;

const ATTR_SERVICE_NAME: u16 = 0x0100;
const ATTR_SERVICE_DESCRIPTION: u16 = 0x0101;
const ATTR_PROVIDER_NAME: u16 = 0x0102;

const ATTR_HID_PARSER_VERSION: u16 = 0x0201;
const ATTR_HID_DEVICE_SUBCLASS: u16 = 0x0202;
const ATTR_HID_COUNTRY_CODE: u16 = 0x0203;
const ATTR_HID_DESCRIPTOR_LIST: u16 = 0x0206;

const ATTR_PNP_VENDOR_ID: u16 = 0x0201;
const ATTR_PNP_PRODUCT_ID: u16 = 0x0202;
const ATTR_PNP_VERSION: u16 = 0x0203;

/// Descriptor type tag of a report descriptor in the HID descriptor list.
const REPORT_DESCRIPTOR_TYPE: u8 = 0x22;

/// Provider and description are joined unless they share this prefix.
const NAME_PREFIX_LEN: usize = 5;

/// Queries `remote` for its PnP and HID records and builds the session
/// metadata. A device without a PnP record gets zero vendor, product and
/// version; one without a HID record yields [`SdpError::NotFound`].
pub fn query_hid_device(local: BdAddr, remote: BdAddr) -> Result<SessionMetadata, SdpError> {
    let mut client = SdpClient::connect(local, remote)?;

    let pnp = match client.search_attributes(Uuid::Uuid16(PNP_INFO_SERVICE_CLASS)) {
        Ok(records) => records.into_iter().next(),
        Err(e) => {
            warn!(%remote, "PnP information query failed: {e}");
            None
        }
    };
    if pnp.is_none() {
        debug!(%remote, "no PnP information record");
    }

    let hid = client
        .search_attributes(Uuid::Uuid16(HID_SERVICE_CLASS))?
        .into_iter()
        .next()
        .ok_or(SdpError::NotFound(HID_SERVICE_CLASS))?;

    Ok(hid_metadata(&hid, pnp.as_ref()))
}

/// Builds session metadata from a HID record and an optional PnP record.
/// The idle timeout is left at its default for the caller to fill in.
pub fn hid_metadata(hid: &ServiceRecord, pnp: Option<&ServiceRecord>) -> SessionMetadata {
    let mut meta = SessionMetadata {
        name: device_name(hid),
        descriptor: report_descriptor(hid),
        ..SessionMetadata::default()
    };

    if let Some(parser) = hid.u16(ATTR_HID_PARSER_VERSION) {
        meta.parser = parser;
    }
    if let Some(subclass) = hid.u8(ATTR_HID_DEVICE_SUBCLASS) {
        meta.subclass = subclass;
    }
    if let Some(country) = hid.u8(ATTR_HID_COUNTRY_CODE) {
        meta.country = country;
    }

    if let Some(pnp) = pnp {
        meta.vendor = pnp.u16(ATTR_PNP_VENDOR_ID).unwrap_or(0);
        meta.product = pnp.u16(ATTR_PNP_PRODUCT_ID).unwrap_or(0);
        meta.version = pnp.u16(ATTR_PNP_VERSION).unwrap_or(0);
    }

    meta
}

fn clean_text(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| *b != 0 && !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

fn device_name(hid: &ServiceRecord) -> String {
    let text = |id| hid.text(id).map(clean_text).filter(|t| !t.is_empty());

    let name = match (text(ATTR_PROVIDER_NAME), text(ATTR_SERVICE_DESCRIPTION)) {
        (Some(provider), Some(desc)) if !same_prefix(provider, desc) => {
            let mut joined = provider.to_vec();
            joined.push(b' ');
            joined.extend_from_slice(desc);
            joined
        }
        (_, Some(desc)) => desc.to_vec(),
        _ => text(ATTR_SERVICE_NAME).map(<[u8]>::to_vec).unwrap_or_default(),
    };

    String::from_utf8_lossy(&name).into_owned()
}

fn same_prefix(a: &[u8], b: &[u8]) -> bool {
    a.iter().take(NAME_PREFIX_LEN).eq(b.iter().take(NAME_PREFIX_LEN))
}

fn report_descriptor(hid: &ServiceRecord) -> Vec<u8> {
    let Some(list) = hid.get(ATTR_HID_DESCRIPTOR_LIST).and_then(DataElement::as_sequence) else {
        return Vec::new();
    };

    let entries: Vec<(Option<u8>, &[u8])> = list
        .iter()
        .filter_map(DataElement::as_sequence)
        .filter_map(|entry| {
            let kind = entry.first().and_then(DataElement::as_u8);
            let data = entry.get(1).and_then(DataElement::as_text)?;
            Some((kind, data))
        })
        .collect();

    entries
        .iter()
        .find(|(kind, _)| *kind == Some(REPORT_DESCRIPTOR_TYPE))
        .or_else(|| entries.first())
        .map(|(_, data)| data.to_vec())
        .unwrap_or_default()
}
