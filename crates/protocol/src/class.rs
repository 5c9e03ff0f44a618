use std::fmt;

/// Class-of-device triplet as reported by an inquiry, in wire order.
///
/// Byte 0 carries the minor class, byte 1 the major class plus the low
/// service bits, byte 2 the remaining service bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceClass(pub [u8; 3]);

impl DeviceClass {
    pub const fn new(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 3] {
        self.0
    }

    /// True for a peripheral in limited discoverable mode with no other
    /// service bits set, the signature of a HID device waiting to be paired.
    pub const fn is_hid_peripheral(&self) -> bool {
        self.0[1] == 0x25 && self.0[2] == 0x00
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}{:02x}{:02x}", self.0[2], self.0[1], self.0[0])
    }
}

impl fmt::Debug for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceClass({self})")
    }
}
