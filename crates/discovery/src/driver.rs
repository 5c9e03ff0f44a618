//! Scan, filter HID peripherals, pair each one.

use hidd_session::{DescriptorResolver, PairingCoordinator, SessionHandoff};
use hidd_transport::Transport;
use tracing::{debug, info, warn};

use crate::types::DiscoveryReport;
use crate::{DiscoveryError, Inquiry};

/// Runs one inquiry and feeds every HID responder, in scan order, to a
/// connecting-role coordinator.
pub struct DiscoveryDriver<Q> {
    inquiry: Q,
    length: u8,
}

impl<Q: Inquiry> DiscoveryDriver<Q> {
    /// `length` is the inquiry duration in units of 1.28 s.
    pub fn new(inquiry: Q, length: u8) -> Self {
        Self { inquiry, length }
    }

    /// Scans once and pairs the HID candidates one after the other. A
    /// failed candidate is recorded and the next one tried. An empty scan
    /// is an error; a scan without HID devices is not.
    pub fn run<T, R, H>(
        &self,
        coordinator: &mut PairingCoordinator<T, R, H>,
    ) -> Result<DiscoveryReport, DiscoveryError>
    where
        T: Transport,
        R: DescriptorResolver,
        H: SessionHandoff,
    {
        let found = self.inquiry.scan(coordinator.local(), self.length)?;
        if found.is_empty() {
            return Err(DiscoveryError::NoDevices);
        }
        info!(count = found.len(), "devices found");

        let mut report = DiscoveryReport {
            found,
            ..DiscoveryReport::default()
        };

        let candidates: Vec<_> = report.found.iter().filter(|r| r.is_hid()).copied().collect();
        for response in &report.found {
            if !response.is_hid() {
                debug!(%response, "skipping non-HID device");
            }
        }

        for candidate in candidates {
            info!(%candidate, "trying HID candidate");
            report.attempted.push(candidate.address);

            match coordinator.connect(candidate.address) {
                Ok(session) => report.paired.push(session),
                Err(e) => report.failed.push((candidate.address, e)),
            }
            coordinator.reset();
        }

        if !report.failed.is_empty() {
            warn!(
                attempted = report.attempted.len(),
                failed = report.failed.len(),
                "some HID candidates could not be paired"
            );
        }
        Ok(report)
    }
}
