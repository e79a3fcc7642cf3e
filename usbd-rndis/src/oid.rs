//! OID registry
//!
//! The list the host reads through OID_GEN_SUPPORTED_LIST, plus a lookup
//! table mapping each answered OID to the function producing its value.
//! Values come from [`RndisState`] or [`RndisConfig`]; nothing here is
//! mutable.
//!
//! Lookup walks [`QUERY_TABLE`] in order and the first entry naming the OID
//! wins. OID_802_3_MULTICAST_LIST and OID_802_3_MAC_OPTIONS deliberately
//! answer NotSupported with a 4-byte zero payload while OID_GEN_MAC_OPTIONS
//! answers Success.

use crate::config::RndisConfig;
use crate::error::{Result, RndisError};
use crate::ndis::oid::{ethernet::*, general::*};
use crate::ndis::{NdisHardwareStatus, NdisMedium, RndisStatus};
use crate::state::RndisState;

/// OIDs reported by OID_GEN_SUPPORTED_LIST, in wire order
pub const SUPPORTED_OIDS: [u32; 29] = [
    // General OIDs
    OID_GEN_SUPPORTED_LIST,
    OID_GEN_HARDWARE_STATUS,
    OID_GEN_MEDIA_SUPPORTED,
    OID_GEN_MEDIA_IN_USE,
    OID_GEN_MAXIMUM_FRAME_SIZE,
    OID_GEN_LINK_SPEED,
    OID_GEN_TRANSMIT_BLOCK_SIZE,
    OID_GEN_RECEIVE_BLOCK_SIZE,
    OID_GEN_VENDOR_ID,
    OID_GEN_VENDOR_DESCRIPTION,
    OID_GEN_VENDOR_DRIVER_VERSION,
    OID_GEN_CURRENT_PACKET_FILTER,
    OID_GEN_MAXIMUM_TOTAL_SIZE,
    OID_GEN_MEDIA_CONNECT_STATUS,
    OID_GEN_PHYSICAL_MEDIUM,
    // General statistics
    OID_GEN_XMIT_OK,
    OID_GEN_RCV_OK,
    OID_GEN_XMIT_ERROR,
    OID_GEN_RCV_ERROR,
    OID_GEN_RCV_NO_BUFFER,
    // Host configuration
    OID_GEN_RNDIS_CONFIG_PARAMETER,
    // 802.3 OIDs
    OID_802_3_PERMANENT_ADDRESS,
    OID_802_3_CURRENT_ADDRESS,
    OID_802_3_MULTICAST_LIST,
    OID_802_3_MAXIMUM_LIST_SIZE,
    // 802.3 statistics
    OID_802_3_RCV_ERROR_ALIGNMENT,
    OID_802_3_XMIT_ONE_COLLISION,
    OID_802_3_XMIT_MORE_COLLISIONS,
    OID_802_3_MAC_OPTIONS,
];

/// Inputs available to a query producer
pub struct OidContext<'a> {
    pub state: &'a RndisState,
    pub config: &'a RndisConfig,
}

/// Outcome of one query: status for the completion and payload length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryAnswer {
    pub status: RndisStatus,
    pub len: usize,
}

impl QueryAnswer {
    pub const fn success(len: usize) -> Self {
        Self { status: RndisStatus::Success, len }
    }

    pub const fn failure() -> Self {
        Self { status: RndisStatus::Failure, len: 0 }
    }
}

type QueryFn = fn(&OidContext<'_>, &mut [u8]) -> Result<QueryAnswer>;

/// One row of the query table
pub struct OidEntry {
    pub oids: &'static [u32],
    query: QueryFn,
}

impl OidEntry {
    pub fn query(&self, ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
        (self.query)(ctx, out)
    }
}

/// Query table; order matters, first match wins.
pub static QUERY_TABLE: [OidEntry; 21] = [
    OidEntry { oids: &[OID_GEN_SUPPORTED_LIST], query: query_supported_list },
    OidEntry { oids: &[OID_GEN_HARDWARE_STATUS], query: query_hardware_status },
    OidEntry {
        oids: &[OID_GEN_MEDIA_SUPPORTED, OID_GEN_MEDIA_IN_USE, OID_GEN_PHYSICAL_MEDIUM],
        query: query_medium,
    },
    OidEntry {
        oids: &[OID_GEN_MAXIMUM_FRAME_SIZE, OID_GEN_TRANSMIT_BLOCK_SIZE, OID_GEN_RECEIVE_BLOCK_SIZE],
        query: query_max_frame_size,
    },
    OidEntry { oids: &[OID_GEN_VENDOR_ID], query: query_vendor_id },
    OidEntry { oids: &[OID_GEN_VENDOR_DRIVER_VERSION], query: query_driver_version },
    OidEntry { oids: &[OID_GEN_VENDOR_DESCRIPTION], query: query_vendor_description },
    OidEntry {
        oids: &[OID_802_3_CURRENT_ADDRESS, OID_802_3_PERMANENT_ADDRESS],
        query: query_mac_address,
    },
    OidEntry { oids: &[OID_GEN_LINK_SPEED], query: query_link_speed },
    OidEntry { oids: &[OID_GEN_CURRENT_PACKET_FILTER], query: query_packet_filter },
    OidEntry { oids: &[OID_GEN_MAXIMUM_TOTAL_SIZE], query: query_max_total_size },
    OidEntry { oids: &[OID_GEN_MEDIA_CONNECT_STATUS], query: query_media_connect_status },
    OidEntry { oids: &[OID_GEN_RNDIS_CONFIG_PARAMETER], query: query_zero },
    OidEntry { oids: &[OID_802_3_MAXIMUM_LIST_SIZE], query: query_max_list_size },
    OidEntry {
        oids: &[OID_802_3_MULTICAST_LIST, OID_802_3_MAC_OPTIONS],
        query: query_not_supported,
    },
    OidEntry {
        oids: &[
            OID_GEN_MAC_OPTIONS,
            OID_802_3_RCV_ERROR_ALIGNMENT,
            OID_802_3_XMIT_ONE_COLLISION,
            OID_802_3_XMIT_MORE_COLLISIONS,
        ],
        query: query_zero,
    },
    OidEntry { oids: &[OID_GEN_XMIT_OK], query: query_xmit_ok },
    OidEntry { oids: &[OID_GEN_RCV_OK], query: query_rcv_ok },
    OidEntry { oids: &[OID_GEN_RCV_ERROR], query: query_rcv_error },
    OidEntry { oids: &[OID_GEN_XMIT_ERROR], query: query_xmit_error },
    OidEntry { oids: &[OID_GEN_RCV_NO_BUFFER], query: query_zero },
];

/// Table row answering `oid`, if any.
pub fn lookup(oid: u32) -> Option<&'static OidEntry> {
    QUERY_TABLE.iter().find(|entry| entry.oids.contains(&oid))
}

/// Whether `oid` appears in the supported list.
pub fn is_supported(oid: u32) -> bool {
    SUPPORTED_OIDS.contains(&oid)
}

/// Answer a query into `out`. Unknown OIDs answer Failure with no payload.
pub fn query(oid: u32, ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    match lookup(oid) {
        Some(entry) => entry.query(ctx, out),
        None => Ok(QueryAnswer::failure()),
    }
}

// ============================================================================
// Producers
// ============================================================================

fn put_bytes(out: &mut [u8], bytes: &[u8]) -> Result<usize> {
    let capacity = out.len();
    let dst = out
        .get_mut(..bytes.len())
        .ok_or_else(|| RndisError::ResponseOverflow { needed: bytes.len(), capacity })?;
    dst.copy_from_slice(bytes);
    Ok(bytes.len())
}

fn put_u32(out: &mut [u8], value: u32) -> Result<QueryAnswer> {
    put_bytes(out, &value.to_le_bytes()).map(QueryAnswer::success)
}

fn query_supported_list(_ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    let needed = SUPPORTED_OIDS.len() * 4;
    if out.len() < needed {
        return Err(RndisError::ResponseOverflow { needed, capacity: out.len() });
    }
    for (i, oid) in SUPPORTED_OIDS.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&oid.to_le_bytes());
    }
    Ok(QueryAnswer::success(needed))
}

fn query_hardware_status(_ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, NdisHardwareStatus::Ready as u32)
}

fn query_medium(_ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, NdisMedium::Medium802_3 as u32)
}

fn query_max_frame_size(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, ctx.config.max_frame_size as u32)
}

fn query_vendor_id(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, ctx.config.vendor_id)
}

fn query_driver_version(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, ctx.state.driver_version())
}

/// Description followed by a NUL; the reported length includes it.
fn query_vendor_description(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    let desc = ctx.config.vendor_description.as_bytes();
    let len = put_bytes(out, desc)?;
    put_bytes(&mut out[len..], &[0])?;
    Ok(QueryAnswer::success(len + 1))
}

fn query_mac_address(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_bytes(out, &ctx.state.mac.octets()).map(QueryAnswer::success)
}

/// Reported in units of 100 bit/s.
fn query_link_speed(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, ctx.state.speed / 100)
}

fn query_packet_filter(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, ctx.state.packet_filter().bits())
}

fn query_max_total_size(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    let total = ctx.config.max_frame_size + ctx.config.response_buffer_size;
    put_u32(out, total as u32)
}

fn query_media_connect_status(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, ctx.state.link() as u32)
}

/// One multicast address.
fn query_max_list_size(_ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, 1)
}

fn query_not_supported(_ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    let answer = put_u32(out, 0)?;
    Ok(QueryAnswer { status: RndisStatus::NotSupported, ..answer })
}

fn query_zero(_ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, 0)
}

fn query_xmit_ok(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, ctx.state.stats.tx_ok)
}

fn query_rcv_ok(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, ctx.state.stats.rx_ok)
}

fn query_rcv_error(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, ctx.state.stats.rx_error)
}

fn query_xmit_error(ctx: &OidContext<'_>, out: &mut [u8]) -> Result<QueryAnswer> {
    put_u32(out, ctx.state.stats.tx_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndis::oid::pnp::OID_PNP_ADD_WAKE_UP_PATTERN;
    use crate::ndis::{NdisMediaState, PacketFilter};
    use crate::state::RndisPhase;

    fn answer(oid: u32, state: &RndisState, config: &RndisConfig) -> (QueryAnswer, [u8; 256]) {
        let mut out = [0xAAu8; 256];
        let ctx = OidContext { state, config };
        let answer = query(oid, &ctx, &mut out).unwrap();
        (answer, out)
    }

    fn word(out: &[u8]) -> u32 {
        u32::from_le_bytes([out[0], out[1], out[2], out[3]])
    }

    #[test]
    fn test_every_supported_oid_answers() {
        let config = RndisConfig::default();
        let state = RndisState::new(&config);
        for oid in SUPPORTED_OIDS {
            assert!(lookup(oid).is_some(), "no producer for {:#010x}", oid);
            let (a, _) = answer(oid, &state, &config);
            let expected = match oid {
                OID_802_3_MULTICAST_LIST | OID_802_3_MAC_OPTIONS => RndisStatus::NotSupported,
                _ => RndisStatus::Success,
            };
            assert_eq!(a.status, expected, "status for {:#010x}", oid);
            assert!(a.len > 0);
        }
    }

    #[test]
    fn test_supported_list_order() {
        let config = RndisConfig::default();
        let state = RndisState::new(&config);
        let (a, out) = answer(OID_GEN_SUPPORTED_LIST, &state, &config);
        assert_eq!(a.len, SUPPORTED_OIDS.len() * 4);
        assert_eq!(word(&out[0..]), OID_GEN_SUPPORTED_LIST);
        assert_eq!(word(&out[4..]), OID_GEN_HARDWARE_STATUS);
        assert_eq!(word(&out[a.len - 4..]), OID_802_3_MAC_OPTIONS);
    }

    #[test]
    fn test_fixed_values() {
        let config = RndisConfig::default();
        let state = RndisState::new(&config);

        let (a, out) = answer(OID_GEN_HARDWARE_STATUS, &state, &config);
        assert_eq!((a.len, word(&out)), (4, NdisHardwareStatus::Ready as u32));

        for oid in [OID_GEN_MEDIA_SUPPORTED, OID_GEN_MEDIA_IN_USE, OID_GEN_PHYSICAL_MEDIUM] {
            let (a, out) = answer(oid, &state, &config);
            assert_eq!((a.len, word(&out)), (4, NdisMedium::Medium802_3 as u32));
        }

        for oid in [OID_GEN_MAXIMUM_FRAME_SIZE, OID_GEN_TRANSMIT_BLOCK_SIZE, OID_GEN_RECEIVE_BLOCK_SIZE] {
            let (_, out) = answer(oid, &state, &config);
            assert_eq!(word(&out), config.max_frame_size as u32);
        }

        let (_, out) = answer(OID_GEN_VENDOR_ID, &state, &config);
        assert_eq!(word(&out), config.vendor_id);
        let (_, out) = answer(OID_GEN_VENDOR_DRIVER_VERSION, &state, &config);
        assert_eq!(word(&out), 0x0001);
        let (_, out) = answer(OID_GEN_LINK_SPEED, &state, &config);
        assert_eq!(word(&out), config.link_speed / 100);
        let (_, out) = answer(OID_GEN_MAXIMUM_TOTAL_SIZE, &state, &config);
        assert_eq!(word(&out), (config.max_frame_size + config.response_buffer_size) as u32);
        let (_, out) = answer(OID_802_3_MAXIMUM_LIST_SIZE, &state, &config);
        assert_eq!(word(&out), 1);
        let (_, out) = answer(OID_GEN_RNDIS_CONFIG_PARAMETER, &state, &config);
        assert_eq!(word(&out), 0);
    }

    #[test]
    fn test_vendor_description_includes_terminator() {
        let config = RndisConfig::default().with_vendor(0x1234, "Gadget");
        let state = RndisState::new(&config);
        let (a, out) = answer(OID_GEN_VENDOR_DESCRIPTION, &state, &config);
        assert_eq!(a.len, 7);
        assert_eq!(&out[..7], b"Gadget\0");
    }

    #[test]
    fn test_mac_address_oids() {
        let config = RndisConfig::default().with_mac([2, 0, 0, 0, 0, 9]);
        let state = RndisState::new(&config);
        for oid in [OID_802_3_CURRENT_ADDRESS, OID_802_3_PERMANENT_ADDRESS] {
            let (a, out) = answer(oid, &state, &config);
            assert_eq!(a.len, 6);
            assert_eq!(&out[..6], &[2, 0, 0, 0, 0, 9]);
        }
    }

    #[test]
    fn test_state_backed_values() {
        let config = RndisConfig::default();
        let mut state = RndisState::new(&config);
        state.transition(RndisPhase::Initialized).unwrap();
        state.set_packet_filter(PacketFilter::DIRECTED | PacketFilter::MULTICAST);
        state.set_link(NdisMediaState::Connected);
        state.stats.tx_ok = 5;
        state.stats.rx_ok = 6;
        state.stats.tx_error = 7;
        state.stats.rx_error = 8;

        let (_, out) = answer(OID_GEN_CURRENT_PACKET_FILTER, &state, &config);
        assert_eq!(word(&out), 0x3);
        let (_, out) = answer(OID_GEN_MEDIA_CONNECT_STATUS, &state, &config);
        assert_eq!(word(&out), NdisMediaState::Connected as u32);
        let (_, out) = answer(OID_GEN_XMIT_OK, &state, &config);
        assert_eq!(word(&out), 5);
        let (_, out) = answer(OID_GEN_RCV_OK, &state, &config);
        assert_eq!(word(&out), 6);
        let (_, out) = answer(OID_GEN_XMIT_ERROR, &state, &config);
        assert_eq!(word(&out), 7);
        let (_, out) = answer(OID_GEN_RCV_ERROR, &state, &config);
        assert_eq!(word(&out), 8);
        let (_, out) = answer(OID_GEN_RCV_NO_BUFFER, &state, &config);
        assert_eq!(word(&out), 0);
    }

    #[test]
    fn test_not_supported_keeps_payload() {
        let config = RndisConfig::default();
        let state = RndisState::new(&config);
        for oid in [OID_802_3_MULTICAST_LIST, OID_802_3_MAC_OPTIONS] {
            let (a, out) = answer(oid, &state, &config);
            assert_eq!(a, QueryAnswer { status: RndisStatus::NotSupported, len: 4 });
            assert_eq!(word(&out), 0);
        }
        let (a, _) = answer(OID_GEN_MAC_OPTIONS, &state, &config);
        assert_eq!(a, QueryAnswer::success(4));
    }

    #[test]
    fn test_unknown_oid_fails_without_payload() {
        let config = RndisConfig::default();
        let state = RndisState::new(&config);
        for oid in [OID_GEN_MAXIMUM_LOOKAHEAD, OID_GEN_CURRENT_LOOKAHEAD, OID_PNP_ADD_WAKE_UP_PATTERN, 0xDEAD_BEEF] {
            let (a, out) = answer(oid, &state, &config);
            assert_eq!(a, QueryAnswer::failure());
            assert_eq!(out[0], 0xAA);
        }
    }

    #[test]
    fn test_short_buffer_reports_capacity() {
        let config = RndisConfig::default();
        let state = RndisState::new(&config);
        let ctx = OidContext { state: &state, config: &config };
        let mut out = [0u8; 3];
        assert_eq!(
            query(OID_GEN_VENDOR_ID, &ctx, &mut out),
            Err(RndisError::ResponseOverflow { needed: 4, capacity: 3 })
        );
        assert_eq!(put_bytes(&mut out, &[7, 8]), Ok(2));
        assert_eq!(&out[..2], &[7, 8]);
    }

    #[test]
    fn test_overflow_reported() {
        let config = RndisConfig::default();
        let state = RndisState::new(&config);
        let ctx = OidContext { state: &state, config: &config };
        let mut out = [0u8; 8];
        assert_eq!(
            query(OID_GEN_SUPPORTED_LIST, &ctx, &mut out),
            Err(RndisError::ResponseOverflow { needed: 116, capacity: 8 })
        );
    }
}
