use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors produced when parsing an address or adapter selector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("invalid Bluetooth address: {0:?}")]
    Address(String),

    #[error("invalid adapter: {0:?} (expected hciN or a Bluetooth address)")]
    Adapter(String),
}

/// A 48-bit Bluetooth device address.
///
/// Bytes are kept in the little-endian order used on the wire and by the
/// kernel socket API; [`fmt::Display`] prints them most significant first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BdAddr([u8; 6]);

impl BdAddr {
    /// Wildcard address: "any local adapter".
    pub const ANY: BdAddr = BdAddr([0; 6]);

    /// "No address selected".
    pub const NONE: BdAddr = BdAddr([0xff; 6]);

    /// Builds an address from little-endian (wire order) bytes.
    pub const fn from_le_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Builds an address from bytes in display order (most significant first).
    pub const fn from_be_bytes(bytes: [u8; 6]) -> Self {
        Self([bytes[5], bytes[4], bytes[3], bytes[2], bytes[1], bytes[0]])
    }

    /// Returns the bytes in wire order.
    pub const fn to_le_bytes(self) -> [u8; 6] {
        self.0
    }

    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// True for a concrete device address (neither wildcard nor unset).
    pub fn is_specific(&self) -> bool {
        !self.is_any() && !self.is_none()
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

impl fmt::Debug for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BdAddr({self})")
    }
}

impl FromStr for BdAddr {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressParseError::Address(s.to_string());

        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for slot in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::from_be_bytes(bytes))
    }
}

impl Serialize for BdAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BdAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Which local adapter to use, as given on the command line or in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdapterSelector {
    /// Let the kernel pick (binds to [`BdAddr::ANY`]).
    #[default]
    Any,
    /// Adapter by index, written `hciN`.
    Index(u16),
    /// Adapter by its own address.
    Address(BdAddr),
}

impl fmt::Display for AdapterSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterSelector::Any => write!(f, "any"),
            AdapterSelector::Index(id) => write!(f, "hci{id}"),
            AdapterSelector::Address(addr) => write!(f, "{addr}"),
        }
    }
}

impl FromStr for AdapterSelector {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("any") {
            return Ok(AdapterSelector::Any);
        }
        if let Some(index) = s
            .get(..3)
            .filter(|prefix| prefix.eq_ignore_ascii_case("hci"))
            .map(|_| &s[3..])
        {
            return index
                .parse::<u16>()
                .map(AdapterSelector::Index)
                .map_err(|_| AddressParseError::Adapter(s.to_string()));
        }
        s.parse::<BdAddr>()
            .map(AdapterSelector::Address)
            .map_err(|_| AddressParseError::Adapter(s.to_string()))
    }
}

impl Serialize for AdapterSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AdapterSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
