//! Ethernet addressing and frame sizes
//!
//! The RNDIS function presents a plain 802.3 adapter; frames cross the
//! bulk endpoints without FCS.

use core::fmt;

/// Default largest frame handed across the data path
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1536;

/// Hardware address reported through the 802.3 address OIDs
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// 00:00:5e:00:53:01, from the range RFC 7042 reserves for documentation
    pub const DEFAULT: MacAddress = MacAddress([0x00, 0x00, 0x5e, 0x00, 0x53, 0x01]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, octet) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", octet)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

impl Default for MacAddress {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_mac_formatting() {
        assert_eq!(format!("{}", MacAddress::DEFAULT), "00:00:5e:00:53:01");
        assert_eq!(
            format!("{:?}", MacAddress::new([0xde, 0xad, 0xbe, 0xef, 0, 1])),
            "MacAddress(de:ad:be:ef:00:01)"
        );
    }

    #[test]
    fn test_mac_from_octets() {
        let mac = MacAddress::from([0x02, 0, 0, 0, 0, 1]);
        assert_eq!(mac, MacAddress::new([0x02, 0, 0, 0, 0, 1]));
        assert_eq!(mac.octets(), [0x02, 0, 0, 0, 0, 1]);
        assert_eq!(MacAddress::default(), MacAddress::DEFAULT);
    }
}
