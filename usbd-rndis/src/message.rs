//! RNDIS message layouts
//!
//! Every RNDIS message starts with the same 8-byte header:
//!
//! ```text
//! +0  MessageType    u32
//! +4  MessageLength  u32   (header + variable payload)
//! ```
//!
//! followed by a fixed, type-specific body. All fields are little-endian
//! 32-bit words at fixed offsets with no padding. Control messages travel
//! over the default pipe as encapsulated commands/responses; data packets
//! wrap one Ethernet frame each on the bulk endpoints.
//!
//! Decoding never aliases a buffer as a struct: each field is read at its
//! offset with a bounds check.

use crate::error::{Result, RndisError};

// ============================================================================
// Message types
// ============================================================================

pub const REMOTE_NDIS_PACKET_MSG: u32 = 0x00000001;
pub const REMOTE_NDIS_INITIALIZE_MSG: u32 = 0x00000002;
pub const REMOTE_NDIS_HALT_MSG: u32 = 0x00000003;
pub const REMOTE_NDIS_QUERY_MSG: u32 = 0x00000004;
pub const REMOTE_NDIS_SET_MSG: u32 = 0x00000005;
pub const REMOTE_NDIS_RESET_MSG: u32 = 0x00000006;
pub const REMOTE_NDIS_INDICATE_STATUS_MSG: u32 = 0x00000007;
pub const REMOTE_NDIS_KEEPALIVE_MSG: u32 = 0x00000008;

/// Completion bit OR'ed into the request type
pub const RNDIS_COMPLETION: u32 = 0x80000000;

pub const REMOTE_NDIS_INITIALIZE_CMPLT: u32 = REMOTE_NDIS_INITIALIZE_MSG | RNDIS_COMPLETION;
pub const REMOTE_NDIS_QUERY_CMPLT: u32 = REMOTE_NDIS_QUERY_MSG | RNDIS_COMPLETION;
pub const REMOTE_NDIS_SET_CMPLT: u32 = REMOTE_NDIS_SET_MSG | RNDIS_COMPLETION;
pub const REMOTE_NDIS_RESET_CMPLT: u32 = REMOTE_NDIS_RESET_MSG | RNDIS_COMPLETION;
pub const REMOTE_NDIS_KEEPALIVE_CMPLT: u32 = REMOTE_NDIS_KEEPALIVE_MSG | RNDIS_COMPLETION;

// ============================================================================
// Protocol constants
// ============================================================================

pub const RNDIS_MAJOR_VERSION: u32 = 1;
pub const RNDIS_MINOR_VERSION: u32 = 0;

/// RNDIS medium reported in the initialize completion (802.3)
pub const RNDIS_MEDIUM_802_3: u32 = 0;

bitflags::bitflags! {
    /// Device flags reported in the initialize completion
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceFlags: u32 {
        const CONNECTIONLESS = 0x00000001;
        const CONNECTION_ORIENTED = 0x00000002;
    }
}

// ============================================================================
// Layout sizes
// ============================================================================

pub const GENERIC_HEADER_SIZE: usize = 8;
pub const INITIALIZE_MSG_SIZE: usize = 24;
pub const INITIALIZE_CMPLT_SIZE: usize = 52;
pub const HALT_MSG_SIZE: usize = 12;
pub const QUERY_MSG_SIZE: usize = 28;
pub const QUERY_CMPLT_SIZE: usize = 24;
pub const SET_MSG_SIZE: usize = 28;
pub const SET_CMPLT_SIZE: usize = 16;
pub const RESET_MSG_SIZE: usize = 12;
pub const RESET_CMPLT_SIZE: usize = 16;
pub const KEEPALIVE_MSG_SIZE: usize = 12;
pub const KEEPALIVE_CMPLT_SIZE: usize = 16;
pub const DATA_PACKET_HEADER_SIZE: usize = 44;
pub const CONFIG_PARAMETER_SIZE: usize = 20;

/// Query/set information buffers and data-packet payloads are located
/// relative to the first field after the generic header.
pub const BODY_OFFSET: usize = GENERIC_HEADER_SIZE;

/// `DataOffset` written into outbound data packets
pub const DATA_PACKET_DATA_OFFSET: u32 = (DATA_PACKET_HEADER_SIZE - GENERIC_HEADER_SIZE) as u32;

/// `InformationBufferOffset` written into query completions
pub const QUERY_CMPLT_INFO_OFFSET: u32 = (QUERY_CMPLT_SIZE - GENERIC_HEADER_SIZE) as u32;

// ============================================================================
// Field access
// ============================================================================

fn check_len(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(RndisError::Truncated { needed, actual: buf.len() });
    }
    Ok(())
}

/// Read a little-endian u32 at `offset`.
pub fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    check_len(buf, offset + 4)?;
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[offset..offset + 4]);
    Ok(u32::from_le_bytes(word))
}

/// Write a little-endian u32 at `offset`.
pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) -> Result<()> {
    check_len(buf, offset + 4)?;
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

fn write_words(buf: &mut [u8], words: &[u32]) -> Result<usize> {
    let len = words.len() * 4;
    check_len(buf, len)?;
    for (i, word) in words.iter().enumerate() {
        buf[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    Ok(len)
}

/// Locate a buffer given as (offset, length) relative to the first body
/// field. `None` when the region falls outside `msg`.
fn body_region(msg: &[u8], offset: u32, length: u32) -> Option<&[u8]> {
    let start = BODY_OFFSET.checked_add(offset as usize)?;
    let end = start.checked_add(length as usize)?;
    msg.get(start..end)
}

fn as_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Message type tag of an encoded message.
pub fn message_type(buf: &[u8]) -> Result<u32> {
    read_u32(buf, 0)
}

/// Declared total length of an encoded message.
pub fn message_length(buf: &[u8]) -> Result<u32> {
    read_u32(buf, 4)
}

// ============================================================================
// Requests
// ============================================================================

/// REMOTE_NDIS_INITIALIZE_MSG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeMsg {
    pub request_id: u32,
    pub major_version: u32,
    pub minor_version: u32,
    pub max_transfer_size: u32,
}

/// REMOTE_NDIS_HALT_MSG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HaltMsg {
    pub request_id: u32,
}

/// REMOTE_NDIS_QUERY_MSG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryMsg<'a> {
    pub request_id: u32,
    pub oid: u32,
    pub info_buffer_length: u32,
    pub info_buffer_offset: u32,
    pub device_vc_handle: u32,
    /// Input buffer, `None` if the declared region lies outside the message
    pub information: Option<&'a [u8]>,
}

/// REMOTE_NDIS_SET_MSG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMsg<'a> {
    pub request_id: u32,
    pub oid: u32,
    pub info_buffer_length: u32,
    pub info_buffer_offset: u32,
    pub device_vc_handle: u32,
    /// Value being set, `None` if the declared region lies outside the message
    pub information: Option<&'a [u8]>,
}

/// REMOTE_NDIS_RESET_MSG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetMsg {
    pub reserved: u32,
}

/// REMOTE_NDIS_KEEPALIVE_MSG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveMsg {
    pub request_id: u32,
}

// ============================================================================
// Completions
// ============================================================================

/// REMOTE_NDIS_INITIALIZE_CMPLT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeCmplt {
    pub request_id: u32,
    pub status: u32,
    pub major_version: u32,
    pub minor_version: u32,
    pub device_flags: DeviceFlags,
    pub medium: u32,
    pub max_packets_per_transfer: u32,
    pub max_transfer_size: u32,
    pub packet_alignment_factor: u32,
    pub af_list_offset: u32,
    pub af_list_size: u32,
}

/// REMOTE_NDIS_QUERY_CMPLT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryCmplt<'a> {
    pub request_id: u32,
    pub status: u32,
    pub info_buffer_offset: u32,
    pub information: &'a [u8],
}

/// REMOTE_NDIS_SET_CMPLT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetCmplt {
    pub request_id: u32,
    pub status: u32,
}

/// REMOTE_NDIS_RESET_CMPLT (carries no request id)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetCmplt {
    pub status: u32,
    pub addressing_reset: u32,
}

/// REMOTE_NDIS_KEEPALIVE_CMPLT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveCmplt {
    pub request_id: u32,
    pub status: u32,
}

// ============================================================================
// Data packet
// ============================================================================

/// REMOTE_NDIS_PACKET_MSG header; the frame follows at
/// `BODY_OFFSET + data_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataPacketHeader {
    pub message_length: u32,
    pub data_offset: u32,
    pub data_length: u32,
    pub oob_data_offset: u32,
    pub oob_data_length: u32,
    pub num_oob_data_elements: u32,
    pub per_packet_info_offset: u32,
    pub per_packet_info_length: u32,
}

impl DataPacketHeader {
    /// Header for a frame of `payload_len` bytes placed right after it.
    pub fn for_payload(payload_len: usize) -> Self {
        Self {
            message_length: as_u32(DATA_PACKET_HEADER_SIZE + payload_len),
            data_offset: DATA_PACKET_DATA_OFFSET,
            data_length: as_u32(payload_len),
            ..Self::default()
        }
    }

    /// Decode the header fields; the message type is returned separately so
    /// callers decide how to treat a foreign type.
    pub fn decode(buf: &[u8]) -> Result<(u32, Self)> {
        check_len(buf, DATA_PACKET_HEADER_SIZE)?;
        let header = Self {
            message_length: read_u32(buf, 4)?,
            data_offset: read_u32(buf, 8)?,
            data_length: read_u32(buf, 12)?,
            oob_data_offset: read_u32(buf, 16)?,
            oob_data_length: read_u32(buf, 20)?,
            num_oob_data_elements: read_u32(buf, 24)?,
            per_packet_info_offset: read_u32(buf, 28)?,
            per_packet_info_length: read_u32(buf, 32)?,
        };
        Ok((read_u32(buf, 0)?, header))
    }

    /// Encode the header (VcHandle and Reserved zeroed).
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        write_words(
            buf,
            &[
                REMOTE_NDIS_PACKET_MSG,
                self.message_length,
                self.data_offset,
                self.data_length,
                self.oob_data_offset,
                self.oob_data_length,
                self.num_oob_data_elements,
                self.per_packet_info_offset,
                self.per_packet_info_length,
                0,
                0,
            ],
        )
    }

    /// Byte range of the frame within the packet.
    pub fn payload_range(&self) -> Option<core::ops::Range<usize>> {
        let start = BODY_OFFSET.checked_add(self.data_offset as usize)?;
        let end = start.checked_add(self.data_length as usize)?;
        Some(start..end)
    }
}

// ============================================================================
// Config parameter
// ============================================================================

/// RNDIS_CONFIG_PARAMETER_INFO carried by a set of
/// OID_GEN_RNDIS_CONFIG_PARAMETER. Offsets are relative to the start of
/// this structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigParameter {
    pub name_offset: u32,
    pub name_length: u32,
    pub parameter_type: u32,
    pub value_offset: u32,
    pub value_length: u32,
}

impl ConfigParameter {
    pub fn decode(buf: &[u8]) -> Result<Self> {
        check_len(buf, CONFIG_PARAMETER_SIZE)?;
        Ok(Self {
            name_offset: read_u32(buf, 0)?,
            name_length: read_u32(buf, 4)?,
            parameter_type: read_u32(buf, 8)?,
            value_offset: read_u32(buf, 12)?,
            value_length: read_u32(buf, 16)?,
        })
    }
}

// ============================================================================
// Tagged message
// ============================================================================

/// Any RNDIS control or data message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RndisMessage<'a> {
    Initialize(InitializeMsg),
    InitializeComplete(InitializeCmplt),
    Halt(HaltMsg),
    Query(QueryMsg<'a>),
    QueryComplete(QueryCmplt<'a>),
    Set(SetMsg<'a>),
    SetComplete(SetCmplt),
    Reset(ResetMsg),
    ResetComplete(ResetCmplt),
    Keepalive(KeepaliveMsg),
    KeepaliveComplete(KeepaliveCmplt),
    DataPacket(DataPacketHeader, &'a [u8]),
}

impl<'a> RndisMessage<'a> {
    /// Decode a message by its type tag.
    ///
    /// Only the fixed layout is checked; `MessageLength` is not compared
    /// with `buf.len()`.
    pub fn decode(buf: &'a [u8]) -> Result<Self> {
        let ty = message_type(buf)?;
        let msg = match ty {
            REMOTE_NDIS_INITIALIZE_MSG => {
                check_len(buf, INITIALIZE_MSG_SIZE)?;
                Self::Initialize(InitializeMsg {
                    request_id: read_u32(buf, 8)?,
                    major_version: read_u32(buf, 12)?,
                    minor_version: read_u32(buf, 16)?,
                    max_transfer_size: read_u32(buf, 20)?,
                })
            }
            REMOTE_NDIS_INITIALIZE_CMPLT => {
                check_len(buf, INITIALIZE_CMPLT_SIZE)?;
                Self::InitializeComplete(InitializeCmplt {
                    request_id: read_u32(buf, 8)?,
                    status: read_u32(buf, 12)?,
                    major_version: read_u32(buf, 16)?,
                    minor_version: read_u32(buf, 20)?,
                    device_flags: DeviceFlags::from_bits_retain(read_u32(buf, 24)?),
                    medium: read_u32(buf, 28)?,
                    max_packets_per_transfer: read_u32(buf, 32)?,
                    max_transfer_size: read_u32(buf, 36)?,
                    packet_alignment_factor: read_u32(buf, 40)?,
                    af_list_offset: read_u32(buf, 44)?,
                    af_list_size: read_u32(buf, 48)?,
                })
            }
            REMOTE_NDIS_HALT_MSG => {
                check_len(buf, HALT_MSG_SIZE)?;
                Self::Halt(HaltMsg { request_id: read_u32(buf, 8)? })
            }
            REMOTE_NDIS_QUERY_MSG | REMOTE_NDIS_SET_MSG => {
                check_len(buf, QUERY_MSG_SIZE)?;
                let request_id = read_u32(buf, 8)?;
                let oid = read_u32(buf, 12)?;
                let info_buffer_length = read_u32(buf, 16)?;
                let info_buffer_offset = read_u32(buf, 20)?;
                let device_vc_handle = read_u32(buf, 24)?;
                let information = body_region(buf, info_buffer_offset, info_buffer_length);
                if ty == REMOTE_NDIS_QUERY_MSG {
                    Self::Query(QueryMsg {
                        request_id,
                        oid,
                        info_buffer_length,
                        info_buffer_offset,
                        device_vc_handle,
                        information,
                    })
                } else {
                    Self::Set(SetMsg {
                        request_id,
                        oid,
                        info_buffer_length,
                        info_buffer_offset,
                        device_vc_handle,
                        information,
                    })
                }
            }
            REMOTE_NDIS_QUERY_CMPLT => {
                check_len(buf, QUERY_CMPLT_SIZE)?;
                let info_len = read_u32(buf, 16)?;
                let info_offset = read_u32(buf, 20)?;
                let information = body_region(buf, info_offset, info_len).ok_or(
                    RndisError::Truncated {
                        needed: BODY_OFFSET + info_offset as usize + info_len as usize,
                        actual: buf.len(),
                    },
                )?;
                Self::QueryComplete(QueryCmplt {
                    request_id: read_u32(buf, 8)?,
                    status: read_u32(buf, 12)?,
                    info_buffer_offset: info_offset,
                    information,
                })
            }
            REMOTE_NDIS_SET_CMPLT => {
                check_len(buf, SET_CMPLT_SIZE)?;
                Self::SetComplete(SetCmplt {
                    request_id: read_u32(buf, 8)?,
                    status: read_u32(buf, 12)?,
                })
            }
            REMOTE_NDIS_RESET_MSG => {
                check_len(buf, RESET_MSG_SIZE)?;
                Self::Reset(ResetMsg { reserved: read_u32(buf, 8)? })
            }
            REMOTE_NDIS_RESET_CMPLT => {
                check_len(buf, RESET_CMPLT_SIZE)?;
                Self::ResetComplete(ResetCmplt {
                    status: read_u32(buf, 8)?,
                    addressing_reset: read_u32(buf, 12)?,
                })
            }
            REMOTE_NDIS_KEEPALIVE_MSG => {
                check_len(buf, KEEPALIVE_MSG_SIZE)?;
                Self::Keepalive(KeepaliveMsg { request_id: read_u32(buf, 8)? })
            }
            REMOTE_NDIS_KEEPALIVE_CMPLT => {
                check_len(buf, KEEPALIVE_CMPLT_SIZE)?;
                Self::KeepaliveComplete(KeepaliveCmplt {
                    request_id: read_u32(buf, 8)?,
                    status: read_u32(buf, 12)?,
                })
            }
            REMOTE_NDIS_PACKET_MSG => {
                let (_, header) = DataPacketHeader::decode(buf)?;
                let payload = header
                    .payload_range()
                    .and_then(|range| buf.get(range))
                    .ok_or(RndisError::Truncated {
                        needed: BODY_OFFSET + header.data_offset as usize + header.data_length as usize,
                        actual: buf.len(),
                    })?;
                Self::DataPacket(header, payload)
            }
            other => return Err(RndisError::UnknownMessage(other)),
        };
        Ok(msg)
    }

    /// Encode into `buf`, returning the number of bytes written.
    ///
    /// Variable payloads (query/set information, frame data) are placed
    /// directly after the fixed layout.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Self::Initialize(m) => write_words(
                buf,
                &[
                    REMOTE_NDIS_INITIALIZE_MSG,
                    INITIALIZE_MSG_SIZE as u32,
                    m.request_id,
                    m.major_version,
                    m.minor_version,
                    m.max_transfer_size,
                ],
            ),
            Self::InitializeComplete(m) => write_words(
                buf,
                &[
                    REMOTE_NDIS_INITIALIZE_CMPLT,
                    INITIALIZE_CMPLT_SIZE as u32,
                    m.request_id,
                    m.status,
                    m.major_version,
                    m.minor_version,
                    m.device_flags.bits(),
                    m.medium,
                    m.max_packets_per_transfer,
                    m.max_transfer_size,
                    m.packet_alignment_factor,
                    m.af_list_offset,
                    m.af_list_size,
                ],
            ),
            Self::Halt(m) => write_words(
                buf,
                &[REMOTE_NDIS_HALT_MSG, HALT_MSG_SIZE as u32, m.request_id],
            ),
            Self::Query(m) => {
                let info = m.information.unwrap_or(&[]);
                encode_request(buf, REMOTE_NDIS_QUERY_MSG, m.request_id, m.oid, m.device_vc_handle, info)
            }
            Self::Set(m) => {
                let info = m.information.unwrap_or(&[]);
                encode_request(buf, REMOTE_NDIS_SET_MSG, m.request_id, m.oid, m.device_vc_handle, info)
            }
            Self::QueryComplete(m) => {
                let total = encode_query_cmplt_header(buf, m.request_id, m.status, m.information.len())?;
                buf[QUERY_CMPLT_SIZE..total].copy_from_slice(m.information);
                Ok(total)
            }
            Self::SetComplete(m) => write_words(
                buf,
                &[REMOTE_NDIS_SET_CMPLT, SET_CMPLT_SIZE as u32, m.request_id, m.status],
            ),
            Self::Reset(m) => write_words(
                buf,
                &[REMOTE_NDIS_RESET_MSG, RESET_MSG_SIZE as u32, m.reserved],
            ),
            Self::ResetComplete(m) => write_words(
                buf,
                &[REMOTE_NDIS_RESET_CMPLT, RESET_CMPLT_SIZE as u32, m.status, m.addressing_reset],
            ),
            Self::Keepalive(m) => write_words(
                buf,
                &[REMOTE_NDIS_KEEPALIVE_MSG, KEEPALIVE_MSG_SIZE as u32, m.request_id],
            ),
            Self::KeepaliveComplete(m) => write_words(
                buf,
                &[REMOTE_NDIS_KEEPALIVE_CMPLT, KEEPALIVE_CMPLT_SIZE as u32, m.request_id, m.status],
            ),
            // Length and offset fields are recomputed from the payload.
            Self::DataPacket(_, payload) => {
                let total = DATA_PACKET_HEADER_SIZE + payload.len();
                check_len(buf, total)?;
                DataPacketHeader::for_payload(payload.len()).encode(buf)?;
                buf[DATA_PACKET_HEADER_SIZE..total].copy_from_slice(payload);
                Ok(total)
            }
        }
    }
}

/// Write the fixed part of a query completion whose information buffer
/// (`info_len` bytes) is already in place at `QUERY_CMPLT_SIZE`.
pub fn encode_query_cmplt_header(
    buf: &mut [u8],
    request_id: u32,
    status: u32,
    info_len: usize,
) -> Result<usize> {
    let total = QUERY_CMPLT_SIZE + info_len;
    check_len(buf, total)?;
    write_words(
        buf,
        &[
            REMOTE_NDIS_QUERY_CMPLT,
            as_u32(total),
            request_id,
            status,
            as_u32(info_len),
            QUERY_CMPLT_INFO_OFFSET,
        ],
    )?;
    Ok(total)
}

fn encode_request(
    buf: &mut [u8],
    ty: u32,
    request_id: u32,
    oid: u32,
    device_vc_handle: u32,
    info: &[u8],
) -> Result<usize> {
    let total = QUERY_MSG_SIZE + info.len();
    check_len(buf, total)?;
    let info_offset = if info.is_empty() { 0 } else { (QUERY_MSG_SIZE - BODY_OFFSET) as u32 };
    write_words(
        buf,
        &[
            ty,
            as_u32(total),
            request_id,
            oid,
            as_u32(info.len()),
            info_offset,
            device_vc_handle,
        ],
    )?;
    buf[QUERY_MSG_SIZE..total].copy_from_slice(info);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_offsets() {
        assert_eq!(DATA_PACKET_DATA_OFFSET, 36);
        assert_eq!(QUERY_CMPLT_INFO_OFFSET, 16);
        assert_eq!(REMOTE_NDIS_INITIALIZE_CMPLT, 0x8000_0002);
        assert_eq!(REMOTE_NDIS_KEEPALIVE_CMPLT, 0x8000_0008);
    }

    #[test]
    fn test_read_u32_bounds() {
        let buf = [1, 0, 0, 0, 2, 0];
        assert_eq!(read_u32(&buf, 0), Ok(1));
        assert_eq!(read_u32(&buf, 4), Err(RndisError::Truncated { needed: 8, actual: 6 }));
    }

    #[test]
    fn test_decode_initialize_fields() {
        let mut buf = [0u8; INITIALIZE_MSG_SIZE];
        write_words(&mut buf, &[REMOTE_NDIS_INITIALIZE_MSG, 24, 0x1234, 1, 0, 0x4000]).unwrap();
        match RndisMessage::decode(&buf).unwrap() {
            RndisMessage::Initialize(m) => {
                assert_eq!(m.request_id, 0x1234);
                assert_eq!(m.major_version, 1);
                assert_eq!(m.max_transfer_size, 0x4000);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_set_information_relative_to_request_id() {
        let mut buf = [0u8; 32];
        let n = RndisMessage::Set(SetMsg {
            request_id: 7,
            oid: 0x0001010E,
            info_buffer_length: 4,
            info_buffer_offset: 20,
            device_vc_handle: 0,
            information: Some(&[0x0B, 0, 0, 0]),
        })
        .encode(&mut buf)
        .unwrap();
        assert_eq!(n, 32);
        assert_eq!(read_u32(&buf, 20), Ok(20));
        match RndisMessage::decode(&buf).unwrap() {
            RndisMessage::Set(m) => {
                assert_eq!(m.information, Some(&[0x0B, 0, 0, 0][..]));
                assert_eq!(m.info_buffer_length, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_set_information_out_of_range() {
        let mut buf = [0u8; SET_MSG_SIZE];
        write_words(&mut buf, &[REMOTE_NDIS_SET_MSG, 28, 1, 0x0001010E, 4, 200, 0]).unwrap();
        match RndisMessage::decode(&buf).unwrap() {
            RndisMessage::Set(m) => assert_eq!(m.information, None),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_and_truncated() {
        let mut buf = [0u8; 12];
        write_words(&mut buf, &[0x42, 12, 0]).unwrap();
        assert_eq!(RndisMessage::decode(&buf), Err(RndisError::UnknownMessage(0x42)));

        write_words(&mut buf, &[REMOTE_NDIS_QUERY_MSG, 28, 0]).unwrap();
        assert_eq!(
            RndisMessage::decode(&buf),
            Err(RndisError::Truncated { needed: QUERY_MSG_SIZE, actual: 12 })
        );
        assert!(RndisMessage::decode(&buf[..2]).is_err());
    }

    #[test]
    fn test_data_packet_header_for_payload() {
        let header = DataPacketHeader::for_payload(100);
        assert_eq!(header.message_length, 144);
        assert_eq!(header.data_offset, 36);
        assert_eq!(header.data_length, 100);
        assert_eq!(header.payload_range(), Some(44..144));

        let mut buf = [0xFFu8; DATA_PACKET_HEADER_SIZE];
        header.encode(&mut buf).unwrap();
        assert_eq!(message_type(&buf), Ok(REMOTE_NDIS_PACKET_MSG));
        assert!(buf[36..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decode_data_packet_payload() {
        let mut buf = [0u8; DATA_PACKET_HEADER_SIZE + 3];
        RndisMessage::DataPacket(DataPacketHeader::default(), &[9, 8, 7])
            .encode(&mut buf)
            .unwrap();
        match RndisMessage::decode(&buf).unwrap() {
            RndisMessage::DataPacket(header, payload) => {
                assert_eq!(header.message_length, 47);
                assert_eq!(payload, &[9, 8, 7]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_config_parameter_decode() {
        let mut buf = [0u8; CONFIG_PARAMETER_SIZE];
        write_words(&mut buf, &[20, 16, 2, 36, 8]).unwrap();
        let param = ConfigParameter::decode(&buf).unwrap();
        assert_eq!(param.name_offset, 20);
        assert_eq!(param.value_length, 8);
        assert!(ConfigParameter::decode(&buf[..19]).is_err());
    }
}
