//! RNDIS function configuration
//!
//! Values a board chooses once at bring-up: frame and buffer sizes, vendor
//! identity reported through the vendor OIDs, link speed and the bulk
//! endpoint packet size that drives zero-length-packet termination.

use crate::error::{Result, RndisError};
use crate::ethernet::{MacAddress, DEFAULT_MAX_FRAME_SIZE};
use crate::message::{DATA_PACKET_HEADER_SIZE, INITIALIZE_CMPLT_SIZE, QUERY_CMPLT_SIZE};
use crate::oid::SUPPORTED_OIDS;

/// Bulk endpoint max packet size
#[cfg(feature = "usb-hs")]
pub const DEFAULT_MAX_PACKET_SIZE: usize = 512;
#[cfg(not(feature = "usb-hs"))]
pub const DEFAULT_MAX_PACKET_SIZE: usize = 64;

/// Link speed in bit/s (USB-HS 480 Mbit/s, USB-FS 12 Mbit/s)
#[cfg(feature = "usb-hs")]
pub const DEFAULT_LINK_SPEED: u32 = 480_000_000;
#[cfg(not(feature = "usb-hs"))]
pub const DEFAULT_LINK_SPEED: u32 = 12_000_000;

/// Encapsulated response buffer size
pub const DEFAULT_RESPONSE_BUFFER_SIZE: usize = 156;

pub const DEFAULT_VENDOR_ID: u32 = 0x0000_FFFF;
pub const DEFAULT_VENDOR_DESCRIPTION: &str = "USB RNDIS Ethernet";

/// Answered through OID_GEN_VENDOR_DRIVER_VERSION; not configurable
pub const DRIVER_VERSION: u32 = 0x0001;

#[derive(Debug, Clone)]
pub struct RndisConfig {
    /// Largest Ethernet frame carried per data packet
    pub max_frame_size: usize,
    /// Capacity of the encapsulated response buffer
    pub response_buffer_size: usize,
    /// Reported through OID_GEN_VENDOR_ID
    pub vendor_id: u32,
    /// Reported through OID_GEN_VENDOR_DESCRIPTION (NUL appended on the wire)
    pub vendor_description: &'static str,
    /// Link speed in bit/s; OID_GEN_LINK_SPEED reports it in 100 bit/s units
    pub link_speed: u32,
    /// Bulk endpoint max packet size
    pub max_packet_size: usize,
    /// Hardware address reported as both permanent and current address
    pub mac: MacAddress,
}

impl Default for RndisConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            response_buffer_size: DEFAULT_RESPONSE_BUFFER_SIZE,
            vendor_id: DEFAULT_VENDOR_ID,
            vendor_description: DEFAULT_VENDOR_DESCRIPTION,
            link_speed: DEFAULT_LINK_SPEED,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            mac: MacAddress::DEFAULT,
        }
    }
}

impl RndisConfig {
    pub fn with_mac(mut self, mac: impl Into<MacAddress>) -> Self {
        self.mac = mac.into();
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn with_response_buffer_size(mut self, size: usize) -> Self {
        self.response_buffer_size = size;
        self
    }

    pub fn with_vendor(mut self, id: u32, description: &'static str) -> Self {
        self.vendor_id = id;
        self.vendor_description = description;
        self
    }

    pub fn with_link_speed(mut self, bits_per_second: u32) -> Self {
        self.link_speed = bits_per_second;
        self
    }

    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Size of each data-path slot: one data packet header plus a full frame.
    pub fn transfer_size(&self) -> usize {
        self.max_frame_size + DATA_PACKET_HEADER_SIZE
    }

    /// Check that every control response fits the response buffer and the
    /// data path has usable sizes.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 {
            return Err(RndisError::InvalidConfig("max frame size is zero"));
        }
        if self.max_packet_size == 0 {
            return Err(RndisError::InvalidConfig("max packet size is zero"));
        }
        if u32::try_from(self.transfer_size()).is_err() {
            return Err(RndisError::InvalidConfig("max frame size exceeds u32"));
        }
        if self.response_buffer_size < INITIALIZE_CMPLT_SIZE {
            return Err(RndisError::InvalidConfig("response buffer smaller than initialize completion"));
        }
        if self.response_buffer_size < QUERY_CMPLT_SIZE + SUPPORTED_OIDS.len() * 4 {
            return Err(RndisError::InvalidConfig("response buffer cannot hold supported OID list"));
        }
        if self.response_buffer_size < QUERY_CMPLT_SIZE + self.vendor_description.len() + 1 {
            return Err(RndisError::InvalidConfig("response buffer cannot hold vendor description"));
        }
        Ok(())
    }
}
