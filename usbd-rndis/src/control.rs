//! Control dispatcher and command handlers
//!
//! SEND_ENCAPSULATED_COMMAND hands a raw RNDIS control message to
//! [`ControlPlane::dispatch`]. The handler for its type writes a completion
//! into the [`ResponseSlot`] and tells the caller whether the host should be
//! notified; the host then pulls the completion with
//! GET_ENCAPSULATED_RESPONSE.
//!
//! The slot holds exactly one response. A command that arrives before the
//! host pulled the previous response replaces it and the old one is lost.

use alloc::vec;
use alloc::vec::Vec;

use log::{debug, info, warn};

use crate::config::RndisConfig;
use crate::error::{Result, RndisError};
use crate::message::{
    encode_query_cmplt_header, message_length, message_type, read_u32, write_u32, ConfigParameter,
    DeviceFlags, HaltMsg, InitializeCmplt, InitializeMsg, KeepaliveCmplt, KeepaliveMsg, QueryMsg,
    ResetCmplt, ResetMsg, RndisMessage, SetCmplt, SetMsg, QUERY_CMPLT_SIZE, RNDIS_MAJOR_VERSION,
    RNDIS_MEDIUM_802_3, RNDIS_MINOR_VERSION,
};
use crate::ndis::oid::ethernet::OID_802_3_MULTICAST_LIST;
use crate::ndis::oid::general::{
    OID_GEN_CURRENT_LOOKAHEAD, OID_GEN_CURRENT_PACKET_FILTER, OID_GEN_PROTOCOL_OPTIONS,
    OID_GEN_RNDIS_CONFIG_PARAMETER,
};
use crate::ndis::oid::pnp::{
    OID_PNP_ADD_WAKE_UP_PATTERN, OID_PNP_ENABLE_WAKE_UP, OID_PNP_REMOVE_WAKE_UP_PATTERN,
};
use crate::ndis::{PacketFilter, RndisStatus};
use crate::oid::{self, OidContext, QueryAnswer};
use crate::state::{RndisPhase, RndisState};

/// Whether the host must be told a response is waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Notify,
    Silent,
}

/// Single-entry mailbox for encapsulated responses
#[derive(Debug)]
pub struct ResponseSlot {
    buf: Vec<u8>,
    occupied: bool,
}

impl ResponseSlot {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            occupied: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// A response is stored and the host has not pulled it yet.
    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    /// Length from the stored response's MessageLength field, clamped to
    /// the slot capacity.
    pub fn declared_len(&self) -> usize {
        message_length(&self.buf)
            .map(|len| (len as usize).min(self.buf.len()))
            .unwrap_or(0)
    }

    /// Stored response without consuming it.
    pub fn peek(&self) -> Option<&[u8]> {
        if self.occupied {
            Some(&self.buf[..self.declared_len()])
        } else {
            None
        }
    }

    /// Hand the stored response to the host and empty the slot.
    pub fn take(&mut self) -> Result<&[u8]> {
        if !self.occupied {
            return Err(RndisError::NoResponse);
        }
        self.occupied = false;
        let len = self.declared_len();
        Ok(&self.buf[..len])
    }

    fn claim(&mut self) -> &mut [u8] {
        if self.occupied {
            warn!(
                "[RNDIS] Overwriting unread response of type {:#010x}",
                message_type(&self.buf).unwrap_or(0)
            );
        }
        self.occupied = true;
        &mut self.buf
    }
}

/// Dispatcher owning the response mailbox
#[derive(Debug)]
pub struct ControlPlane {
    response: ResponseSlot,
}

impl ControlPlane {
    pub fn new(config: &RndisConfig) -> Self {
        Self {
            response: ResponseSlot::new(config.response_buffer_size),
        }
    }

    pub fn response(&self) -> &ResponseSlot {
        &self.response
    }

    pub fn take_response(&mut self) -> Result<&[u8]> {
        self.response.take()
    }

    /// Decode `command` and run its handler.
    ///
    /// Unknown or truncated commands produce no response and no
    /// notification.
    pub fn dispatch(
        &mut self,
        command: &[u8],
        state: &mut RndisState,
        config: &RndisConfig,
    ) -> Result<Completion> {
        let msg = RndisMessage::decode(command).map_err(|err| {
            warn!("[RNDIS] Rejecting encapsulated command: {}", err);
            err
        })?;

        match msg {
            RndisMessage::Initialize(m) => self.initialize(m, state, config),
            RndisMessage::Halt(m) => self.halt(m, state),
            RndisMessage::Query(m) => self.query(m, state, config),
            RndisMessage::Set(m) => self.set(m, state),
            RndisMessage::Reset(m) => self.reset(m, state),
            RndisMessage::Keepalive(m) => self.keepalive(m),
            _ => {
                let ty = message_type(command)?;
                warn!("[RNDIS] No handler for message type {:#010x}", ty);
                Err(RndisError::UnknownMessage(ty))
            }
        }
    }

    fn initialize(
        &mut self,
        msg: InitializeMsg,
        state: &mut RndisState,
        config: &RndisConfig,
    ) -> Result<Completion> {
        info!(
            "[RNDIS] INITIALIZE id={} host v{}.{} max transfer {}",
            msg.request_id, msg.major_version, msg.minor_version, msg.max_transfer_size
        );

        let cmplt = InitializeCmplt {
            request_id: msg.request_id,
            status: RndisStatus::Success.as_u32(),
            major_version: RNDIS_MAJOR_VERSION,
            minor_version: RNDIS_MINOR_VERSION,
            device_flags: DeviceFlags::CONNECTIONLESS,
            medium: RNDIS_MEDIUM_802_3,
            max_packets_per_transfer: 1,
            max_transfer_size: config.transfer_size() as u32,
            packet_alignment_factor: 0,
            af_list_offset: 0,
            af_list_size: 0,
        };
        RndisMessage::InitializeComplete(cmplt).encode(self.response.claim())?;
        state.transition(RndisPhase::Initialized)?;
        Ok(Completion::Notify)
    }

    /// HALT has no completion on the wire; the slot only gets a zero length.
    fn halt(&mut self, msg: HaltMsg, state: &mut RndisState) -> Result<Completion> {
        info!("[RNDIS] HALT id={}", msg.request_id);
        write_u32(self.response.claim(), 4, 0)?;
        state.uninitialize();
        Ok(Completion::Silent)
    }

    fn query(&mut self, msg: QueryMsg<'_>, state: &RndisState, config: &RndisConfig) -> Result<Completion> {
        debug!("[RNDIS] QUERY id={} oid={:#010x}", msg.request_id, msg.oid);

        let ctx = OidContext { state, config };
        let buf = self.response.claim();
        let capacity = buf.len();

        let answer = match buf.get_mut(QUERY_CMPLT_SIZE..) {
            Some(info) => oid::query(msg.oid, &ctx, info),
            None => Err(RndisError::ResponseOverflow {
                needed: QUERY_CMPLT_SIZE,
                capacity,
            }),
        };
        let answer = match answer {
            Ok(answer) => answer,
            Err(err) => {
                warn!("[RNDIS] Query {:#010x} failed: {}", msg.oid, err);
                QueryAnswer::failure()
            }
        };
        if !oid::is_supported(msg.oid) {
            warn!("[RNDIS] Unhandled query OID {:#010x}", msg.oid);
        }

        encode_query_cmplt_header(buf, msg.request_id, answer.status.as_u32(), answer.len)?;
        Ok(Completion::Notify)
    }

    fn set(&mut self, msg: SetMsg<'_>, state: &mut RndisState) -> Result<Completion> {
        debug!("[RNDIS] SET id={} oid={:#010x}", msg.request_id, msg.oid);

        let status = match msg.oid {
            OID_GEN_RNDIS_CONFIG_PARAMETER => {
                log_config_parameter(&msg);
                RndisStatus::Success
            }
            OID_GEN_CURRENT_PACKET_FILTER => set_packet_filter(&msg, state),
            OID_GEN_CURRENT_LOOKAHEAD | OID_GEN_PROTOCOL_OPTIONS | OID_802_3_MULTICAST_LIST => {
                RndisStatus::Success
            }
            OID_PNP_ADD_WAKE_UP_PATTERN | OID_PNP_REMOVE_WAKE_UP_PATTERN | OID_PNP_ENABLE_WAKE_UP => {
                warn!("[RNDIS] Wake-up OID {:#010x} not supported", msg.oid);
                RndisStatus::Failure
            }
            other => {
                warn!("[RNDIS] Unhandled set OID {:#010x}", other);
                RndisStatus::Failure
            }
        };

        let cmplt = SetCmplt {
            request_id: msg.request_id,
            status: status.as_u32(),
        };
        RndisMessage::SetComplete(cmplt).encode(self.response.claim())?;
        Ok(Completion::Notify)
    }

    fn reset(&mut self, _msg: ResetMsg, state: &mut RndisState) -> Result<Completion> {
        info!("[RNDIS] RESET");
        let cmplt = ResetCmplt {
            status: RndisStatus::Success.as_u32(),
            addressing_reset: 1,
        };
        RndisMessage::ResetComplete(cmplt).encode(self.response.claim())?;
        state.uninitialize();
        Ok(Completion::Notify)
    }

    fn keepalive(&mut self, msg: KeepaliveMsg) -> Result<Completion> {
        debug!("[RNDIS] KEEPALIVE id={}", msg.request_id);
        let cmplt = KeepaliveCmplt {
            request_id: msg.request_id,
            status: RndisStatus::Success.as_u32(),
        };
        RndisMessage::KeepaliveComplete(cmplt).encode(self.response.claim())?;
        Ok(Completion::Notify)
    }
}

fn set_packet_filter(msg: &SetMsg<'_>, state: &mut RndisState) -> RndisStatus {
    let bits = match msg.information {
        Some(info) if msg.info_buffer_length >= 4 => read_u32(info, 0).ok(),
        _ => None,
    };
    match bits {
        Some(bits) => {
            info!("[RNDIS] Packet filter {:#010x}", bits);
            state.set_packet_filter(PacketFilter::from_bits_retain(bits));
            RndisStatus::Success
        }
        None => {
            warn!(
                "[RNDIS] Packet filter set with {}-byte buffer",
                msg.info_buffer_length
            );
            RndisStatus::InvalidData
        }
    }
}

fn log_config_parameter(msg: &SetMsg<'_>) {
    match msg.information.map(ConfigParameter::decode) {
        Some(Ok(param)) => warn!(
            "[RNDIS] Config parameter: name {}+{} type {} value {}+{}",
            param.name_offset,
            param.name_length,
            param.parameter_type,
            param.value_offset,
            param.value_length
        ),
        _ => warn!(
            "[RNDIS] Config parameter with {}-byte buffer",
            msg.info_buffer_length
        ),
    }
}
