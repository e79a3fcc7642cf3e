//! NDIS vocabulary carried by Remote NDIS
//!
//! RNDIS tunnels NDIS requests over USB unchanged, so completions carry
//! NDIS status codes and queries/sets name NDIS object identifiers. Only
//! what a connectionless 802.3 function answers is defined here.

use core::fmt;

/// Status field of RNDIS completion messages
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RndisStatus {
    Success = 0x0000_0000,
    Pending = 0x0000_0103,
    NotRecognized = 0x0001_0001,
    /// Generic failure, also the answer for OIDs the device does not know
    Failure = 0xC000_0001,
    Resources = 0xC000_009A,
    /// OID known but the operation is not offered
    NotSupported = 0xC000_00BB,
    InvalidLength = 0xC001_0014,
    /// Set payload malformed or too short
    InvalidData = 0xC001_0015,
    BufferTooShort = 0xC001_0016,
    InvalidOid = 0xC001_0017,
}

impl RndisStatus {
    const ALL: [RndisStatus; 10] = [
        Self::Success,
        Self::Pending,
        Self::NotRecognized,
        Self::Failure,
        Self::Resources,
        Self::NotSupported,
        Self::InvalidLength,
        Self::InvalidData,
        Self::BufferTooShort,
        Self::InvalidOid,
    ];

    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// `None` for codes outside this set.
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| status.as_u32() == value)
    }
}

impl fmt::Display for RndisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({:#010x})", self, self.as_u32())
    }
}

/// Object identifiers, grouped the way NDIS numbers them
pub mod oid {
    /// Mandatory and optional general OIDs (0x0001xxxx), general
    /// statistics (0x0002xxxx)
    pub mod general {
        pub const OID_GEN_SUPPORTED_LIST: u32 = 0x0001_0101;
        pub const OID_GEN_HARDWARE_STATUS: u32 = 0x0001_0102;
        pub const OID_GEN_MEDIA_SUPPORTED: u32 = 0x0001_0103;
        pub const OID_GEN_MEDIA_IN_USE: u32 = 0x0001_0104;
        pub const OID_GEN_MAXIMUM_LOOKAHEAD: u32 = 0x0001_0105;
        pub const OID_GEN_MAXIMUM_FRAME_SIZE: u32 = 0x0001_0106;
        pub const OID_GEN_LINK_SPEED: u32 = 0x0001_0107;
        pub const OID_GEN_TRANSMIT_BUFFER_SPACE: u32 = 0x0001_0108;
        pub const OID_GEN_RECEIVE_BUFFER_SPACE: u32 = 0x0001_0109;
        pub const OID_GEN_TRANSMIT_BLOCK_SIZE: u32 = 0x0001_010A;
        pub const OID_GEN_RECEIVE_BLOCK_SIZE: u32 = 0x0001_010B;
        pub const OID_GEN_VENDOR_ID: u32 = 0x0001_010C;
        pub const OID_GEN_VENDOR_DESCRIPTION: u32 = 0x0001_010D;
        pub const OID_GEN_CURRENT_PACKET_FILTER: u32 = 0x0001_010E;
        pub const OID_GEN_CURRENT_LOOKAHEAD: u32 = 0x0001_010F;
        pub const OID_GEN_DRIVER_VERSION: u32 = 0x0001_0110;
        pub const OID_GEN_MAXIMUM_TOTAL_SIZE: u32 = 0x0001_0111;
        pub const OID_GEN_PROTOCOL_OPTIONS: u32 = 0x0001_0112;
        pub const OID_GEN_MAC_OPTIONS: u32 = 0x0001_0113;
        pub const OID_GEN_MEDIA_CONNECT_STATUS: u32 = 0x0001_0114;
        pub const OID_GEN_MAXIMUM_SEND_PACKETS: u32 = 0x0001_0115;
        pub const OID_GEN_VENDOR_DRIVER_VERSION: u32 = 0x0001_0116;
        pub const OID_GEN_PHYSICAL_MEDIUM: u32 = 0x0001_0202;
        /// Host-side registry parameter pushed to the device
        pub const OID_GEN_RNDIS_CONFIG_PARAMETER: u32 = 0x0001_021B;

        pub const OID_GEN_XMIT_OK: u32 = 0x0002_0101;
        pub const OID_GEN_RCV_OK: u32 = 0x0002_0102;
        pub const OID_GEN_XMIT_ERROR: u32 = 0x0002_0103;
        pub const OID_GEN_RCV_ERROR: u32 = 0x0002_0104;
        pub const OID_GEN_RCV_NO_BUFFER: u32 = 0x0002_0105;
    }

    /// 802.3 operational (0x0101xxxx) and statistics (0x0102xxxx) OIDs
    pub mod ethernet {
        pub const OID_802_3_PERMANENT_ADDRESS: u32 = 0x0101_0101;
        pub const OID_802_3_CURRENT_ADDRESS: u32 = 0x0101_0102;
        pub const OID_802_3_MULTICAST_LIST: u32 = 0x0101_0103;
        pub const OID_802_3_MAXIMUM_LIST_SIZE: u32 = 0x0101_0104;
        pub const OID_802_3_MAC_OPTIONS: u32 = 0x0101_0105;

        pub const OID_802_3_RCV_ERROR_ALIGNMENT: u32 = 0x0102_0101;
        pub const OID_802_3_XMIT_ONE_COLLISION: u32 = 0x0102_0102;
        pub const OID_802_3_XMIT_MORE_COLLISIONS: u32 = 0x0102_0103;
    }

    /// Power management (0xFD01xxxx). None are answered; wake-up sets fail.
    pub mod pnp {
        pub const OID_PNP_CAPABILITIES: u32 = 0xFD01_0100;
        pub const OID_PNP_SET_POWER: u32 = 0xFD01_0101;
        pub const OID_PNP_QUERY_POWER: u32 = 0xFD01_0102;
        pub const OID_PNP_ADD_WAKE_UP_PATTERN: u32 = 0xFD01_0103;
        pub const OID_PNP_REMOVE_WAKE_UP_PATTERN: u32 = 0xFD01_0104;
        pub const OID_PNP_ENABLE_WAKE_UP: u32 = 0xFD01_0106;
    }
}

bitflags::bitflags! {
    /// Receive filter the host sets through OID_GEN_CURRENT_PACKET_FILTER
    ///
    /// Empty means the host is not receiving. Bits outside this set are
    /// kept as given.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PacketFilter: u32 {
        const DIRECTED = 1 << 0;
        const MULTICAST = 1 << 1;
        const ALL_MULTICAST = 1 << 2;
        const BROADCAST = 1 << 3;
        const SOURCE_ROUTING = 1 << 4;
        const PROMISCUOUS = 1 << 5;
        const SMT = 1 << 6;
        const ALL_LOCAL = 1 << 7;
        const GROUP = 1 << 12;
        const ALL_FUNCTIONAL = 1 << 13;
        const FUNCTIONAL = 1 << 14;
        const MAC_FRAME = 1 << 15;
    }
}

/// Answer to OID_GEN_MEDIA_SUPPORTED / MEDIA_IN_USE / PHYSICAL_MEDIUM
///
/// For PHYSICAL_MEDIUM the value 0 reads as "unspecified", which makes the
/// host treat the link as plain Ethernet.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NdisMedium {
    #[default]
    Medium802_3 = 0,
}

/// Answer to OID_GEN_HARDWARE_STATUS. The function is always ready once
/// enumerated.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NdisHardwareStatus {
    #[default]
    Ready = 0,
}

/// Link state, answered through OID_GEN_MEDIA_CONNECT_STATUS
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NdisMediaState {
    Connected = 0,
    #[default]
    Disconnected = 1,
}
