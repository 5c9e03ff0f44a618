//! Descriptor resolution seam.

use hidd_protocol::{BdAddr, SessionMetadata};
use hidd_sdp::SdpError;
use tracing::debug;

use crate::error::ResolutionError;

/// Maps a peer to the metadata the HID driver needs.
///
/// Implementations block until the answer is known.
pub trait DescriptorResolver {
    fn resolve(&self, local: BdAddr, remote: BdAddr) -> Result<SessionMetadata, ResolutionError>;
}

impl<F> DescriptorResolver for F
where
    F: Fn(BdAddr, BdAddr) -> Result<SessionMetadata, ResolutionError>,
{
    fn resolve(&self, local: BdAddr, remote: BdAddr) -> Result<SessionMetadata, ResolutionError> {
        self(local, remote)
    }
}

/// Resolves metadata by querying the peer's SDP server.
#[derive(Debug, Default, Clone, Copy)]
pub struct SdpResolver;

impl DescriptorResolver for SdpResolver {
    fn resolve(&self, local: BdAddr, remote: BdAddr) -> Result<SessionMetadata, ResolutionError> {
        let meta = hidd_sdp::query_hid_device(local, remote).map_err(|e| match e {
            SdpError::NotFound(_) => ResolutionError::NoHidService(remote),
            other => ResolutionError::Query {
                remote,
                reason: other.to_string(),
            },
        })?;

        debug!(
            %remote,
            name = %meta.name,
            descriptor_len = meta.descriptor.len(),
            vendor = meta.vendor,
            product = meta.product,
            "resolved HID record"
        );
        Ok(meta)
    }
}
