use std::time::Duration;

use crate::constants::HIDP_NAME_LEN;

/// HID parser version assumed when the device record doesn't state one.
pub const DEFAULT_PARSER_VERSION: u16 = 0x0100;

/// Everything the kernel HID driver needs besides the two channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    /// Human-readable device name.
    pub name: String,
    /// Idle time after which the driver disconnects the device.
    pub idle_timeout: Duration,
    /// Raw HID report descriptor. May be empty.
    pub descriptor: Vec<u8>,
    /// Reserved session flags; always zero today.
    pub flags: u32,
    pub parser: u16,
    pub subclass: u8,
    pub country: u8,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            idle_timeout: Duration::ZERO,
            descriptor: Vec::new(),
            flags: 0,
            parser: DEFAULT_PARSER_VERSION,
            subclass: 0,
            country: 0,
            vendor: 0,
            product: 0,
            version: 0,
        }
    }
}

impl SessionMetadata {
    /// Returns the metadata with the idle timeout replaced.
    pub fn with_idle_timeout(self, idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            ..self
        }
    }

    /// Idle timeout in whole seconds, saturated to the driver's 32-bit field.
    pub fn idle_timeout_secs(&self) -> u32 {
        u32::try_from(self.idle_timeout.as_secs()).unwrap_or(u32::MAX)
    }

    /// The name cut to fit the driver's fixed field (leaving room for the
    /// terminating NUL) without splitting a UTF-8 sequence.
    pub fn driver_name(&self) -> &str {
        let max = HIDP_NAME_LEN - 1;
        if self.name.len() <= max {
            return &self.name;
        }
        let mut end = max;
        while !self.name.is_char_boundary(end) {
            end -= 1;
        }
        &self.name[..end]
    }
}
