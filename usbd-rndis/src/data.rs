//! Data packet framing
//!
//! Every bulk transfer carries one REMOTE_NDIS_PACKET_MSG wrapping one
//! Ethernet frame:
//!
//! ```text
//! +0   header (44 bytes, DataOffset = 36 relative to +8)
//! +44  frame  (DataLength bytes)
//! ```
//!
//! There is one receive and one transmit buffer, each sized for a header
//! plus a full frame, so at most one transfer is outstanding per direction.

use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;

use log::{debug, warn};

use crate::config::RndisConfig;
use crate::error::{Result, RndisError};
use crate::message::{DataPacketHeader, DATA_PACKET_HEADER_SIZE, REMOTE_NDIS_PACKET_MSG};
use crate::state::{EthStats, RndisState};
use crate::usbd::{EndpointAddress, UsbdBus};

/// Transmit buffer. A nonzero length means a bulk-IN transfer is in flight.
#[derive(Debug)]
pub struct TxSlot {
    buf: Vec<u8>,
    len: usize,
}

impl TxSlot {
    fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            len: 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.len == 0
    }

    /// Bytes submitted for the transfer in flight, 0 when idle.
    pub fn in_flight(&self) -> usize {
        self.len
    }

    /// Largest frame that fits after the header.
    pub fn payload_capacity(&self) -> usize {
        self.buf.len().saturating_sub(DATA_PACKET_HEADER_SIZE)
    }

    /// The packet in flight.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Receive buffer plus the location of the frame it holds, if any.
#[derive(Debug)]
pub struct RxSlot {
    buf: Vec<u8>,
    frame: Option<Range<usize>>,
}

impl RxSlot {
    fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            frame: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Received frame not yet consumed.
    pub fn frame(&self) -> Option<&[u8]> {
        self.frame.clone().and_then(|range| self.buf.get(range))
    }
}

#[derive(Debug)]
pub struct DataPath {
    rx: RxSlot,
    tx: TxSlot,
    bulk_out: EndpointAddress,
    bulk_in: EndpointAddress,
    max_packet_size: usize,
}

impl DataPath {
    pub fn new(config: &RndisConfig, bulk_out: EndpointAddress, bulk_in: EndpointAddress) -> Self {
        Self {
            rx: RxSlot::new(config.transfer_size()),
            tx: TxSlot::new(config.transfer_size()),
            bulk_out,
            bulk_in,
            max_packet_size: config.max_packet_size,
        }
    }

    pub fn rx(&self) -> &RxSlot {
        &self.rx
    }

    pub fn tx(&self) -> &TxSlot {
        &self.tx
    }

    pub fn rx_buffer_mut(&mut self) -> &mut [u8] {
        &mut self.rx.buf
    }

    /// Forget any pending frame and mark the transmit slot idle.
    pub fn reset(&mut self) {
        self.rx.frame = None;
        self.tx.len = 0;
    }

    /// Queue a bulk-OUT read of a full receive buffer.
    pub fn arm_read<B: UsbdBus>(&mut self, bus: &mut B) -> Result<()> {
        self.rx.frame = None;
        bus.start_read(self.bulk_out, &mut self.rx.buf)?;
        Ok(())
    }

    /// A bulk-OUT read finished with `nbytes` in the receive buffer.
    ///
    /// A valid data packet leaves its frame pending and returns it. Anything
    /// else is dropped and the read rearmed.
    pub fn bulk_out_complete<B: UsbdBus>(
        &mut self,
        bus: &mut B,
        nbytes: usize,
        stats: &mut EthStats,
    ) -> Result<Option<&[u8]>> {
        match self.frame_range(nbytes) {
            Some(range) => {
                debug!("[RNDIS] RX frame {} bytes", range.len());
                stats.rx_ok = stats.rx_ok.wrapping_add(1);
                self.rx.frame = Some(range);
                Ok(self.rx.frame())
            }
            None => {
                stats.rx_error = stats.rx_error.wrapping_add(1);
                self.arm_read(bus)?;
                Ok(None)
            }
        }
    }

    fn frame_range(&self, nbytes: usize) -> Option<Range<usize>> {
        let Some(packet) = self.rx.buf.get(..nbytes) else {
            warn!("[RNDIS] Bulk-OUT reported {} bytes, buffer holds {}", nbytes, self.rx.capacity());
            return None;
        };

        let (ty, header) = match DataPacketHeader::decode(packet) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("[RNDIS] Discarding bulk-OUT transfer: {}", err);
                return None;
            }
        };
        if ty != REMOTE_NDIS_PACKET_MSG {
            warn!("[RNDIS] Discarding bulk-OUT message type {:#010x}", ty);
            return None;
        }
        if header.message_length as usize != nbytes {
            warn!(
                "[RNDIS] Discarding data packet: length {} but {} bytes received",
                header.message_length, nbytes
            );
            return None;
        }

        let range = header.payload_range().filter(|range| range.end <= nbytes);
        if range.is_none() {
            warn!(
                "[RNDIS] Discarding data packet: frame {}+{} outside transfer",
                header.data_offset, header.data_length
            );
        }
        range
    }

    /// Copy the pending frame into `out` and rearm the read.
    ///
    /// `Ok(None)` when nothing is pending. If `out` is too small the frame
    /// stays pending.
    pub fn eth_rx<B: UsbdBus>(&mut self, bus: &mut B, out: &mut [u8]) -> Result<Option<usize>> {
        let Some(frame) = self.rx.frame() else {
            return Ok(None);
        };
        let len = frame.len();
        let actual = out.len();
        let dst = out
            .get_mut(..len)
            .ok_or_else(|| RndisError::Truncated { needed: len, actual })?;
        dst.copy_from_slice(frame);

        self.arm_read(bus)?;
        Ok(Some(len))
    }

    /// Drop the pending frame and rearm the read. No-op when nothing is
    /// pending, since the read is then already queued.
    pub fn rx_release<B: UsbdBus>(&mut self, bus: &mut B) -> Result<()> {
        if self.rx.frame.is_none() {
            return Ok(());
        }
        self.arm_read(bus)
    }

    /// Wrap the concatenated `segments` in a data packet and start the
    /// bulk-IN write.
    ///
    /// Dropped without error while the link is down. Frames longer than the
    /// slot are cut to fit.
    pub fn eth_tx<'a, B, I>(&mut self, bus: &mut B, state: &mut RndisState, segments: I) -> Result<()>
    where
        B: UsbdBus,
        I: IntoIterator<Item = &'a [u8]>,
    {
        if !state.is_connected() {
            debug!("[RNDIS] Link down, TX frame dropped");
            return Ok(());
        }
        if !self.tx.is_idle() {
            return Err(RndisError::Busy);
        }

        let capacity = self.tx.payload_capacity();
        let payload = &mut self.tx.buf[DATA_PACKET_HEADER_SIZE..];
        let mut len = 0;
        let mut requested = 0;
        for segment in segments {
            requested += segment.len();
            let n = segment.len().min(capacity - len);
            payload[len..len + n].copy_from_slice(&segment[..n]);
            len += n;
        }
        if requested > len {
            warn!("[RNDIS] TX frame of {} bytes truncated to {}", requested, len);
        }

        DataPacketHeader::for_payload(len).encode(&mut self.tx.buf)?;
        self.tx.len = DATA_PACKET_HEADER_SIZE + len;

        if let Err(err) = bus.start_write(self.bulk_in, &self.tx.buf[..self.tx.len]) {
            warn!("[RNDIS] Bulk-IN write refused: {}", err);
            self.tx.len = 0;
            state.stats.tx_error = state.stats.tx_error.wrapping_add(1);
            return Err(err.into());
        }
        debug!("[RNDIS] TX frame {} bytes", len);
        Ok(())
    }

    /// A bulk-IN write of `nbytes` finished.
    ///
    /// A transfer that is a nonzero multiple of the max packet size is
    /// terminated with a zero-length packet; the slot is freed when that
    /// completes.
    pub fn bulk_in_complete<B: UsbdBus>(
        &mut self,
        bus: &mut B,
        nbytes: usize,
        stats: &mut EthStats,
    ) -> Result<()> {
        if self.tx.is_idle() {
            debug!("[RNDIS] Bulk-IN completion with no transfer in flight");
            return Ok(());
        }

        if nbytes != 0 && nbytes % self.max_packet_size == 0 {
            debug!("[RNDIS] ZLP after {} bytes", nbytes);
            if let Err(err) = bus.start_write(self.bulk_in, &[]) {
                warn!("[RNDIS] ZLP refused: {}", err);
                self.tx.len = 0;
                stats.tx_error = stats.tx_error.wrapping_add(1);
                return Err(err.into());
            }
            return Ok(());
        }

        self.tx.len = 0;
        stats.tx_ok = stats.tx_ok.wrapping_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{read_u32, RndisMessage, DATA_PACKET_DATA_OFFSET};
    use crate::ndis::NdisMediaState;
    use crate::usbd::mock::MockBus;
    use crate::usbd::UsbdError;

    const OUT: EndpointAddress = 0x01;
    const IN: EndpointAddress = 0x81;

    fn setup() -> (DataPath, RndisState, MockBus) {
        let config = RndisConfig::default().with_max_packet_size(64);
        let mut state = RndisState::new(&config);
        state.set_link(NdisMediaState::Connected);
        (DataPath::new(&config, OUT, IN), state, MockBus::default())
    }

    fn load_packet(data: &mut DataPath, payload: &[u8]) -> usize {
        RndisMessage::DataPacket(DataPacketHeader::default(), payload)
            .encode(data.rx_buffer_mut())
            .unwrap()
    }

    #[test]
    fn test_receive_valid_packet() {
        let (mut data, mut state, mut bus) = setup();
        let payload = [0xA5u8; 60];
        let len = load_packet(&mut data, &payload);

        let frame = data.bulk_out_complete(&mut bus, len, &mut state.stats).unwrap();
        assert_eq!(frame, Some(&payload[..]));
        assert_eq!(state.stats.rx_ok, 1);
        // Not rearmed until the frame is consumed.
        assert!(bus.reads.is_empty());

        let mut out = [0u8; 128];
        assert_eq!(data.eth_rx(&mut bus, &mut out), Ok(Some(60)));
        assert_eq!(&out[..60], &payload[..]);
        assert_eq!(bus.reads, [(OUT, data.rx().capacity())]);
        assert_eq!(data.eth_rx(&mut bus, &mut out), Ok(None));
    }

    #[test]
    fn test_receive_length_mismatch_discarded() {
        let (mut data, mut state, mut bus) = setup();
        let len = load_packet(&mut data, &[1, 2, 3, 4]);

        let frame = data.bulk_out_complete(&mut bus, len + 1, &mut state.stats).unwrap();
        assert_eq!(frame, None);
        assert_eq!(data.rx().frame(), None);
        assert_eq!(state.stats.rx_error, 1);
        assert_eq!(bus.reads.len(), 1);
    }

    #[test]
    fn test_receive_wrong_type_discarded() {
        let (mut data, mut state, mut bus) = setup();
        let len = load_packet(&mut data, &[1, 2, 3, 4]);
        data.rx_buffer_mut()[0] = 0x02;

        assert_eq!(data.bulk_out_complete(&mut bus, len, &mut state.stats), Ok(None));
        assert_eq!(bus.reads.len(), 1);
    }

    #[test]
    fn test_receive_payload_outside_transfer_discarded() {
        let (mut data, mut state, mut bus) = setup();
        let len = load_packet(&mut data, &[1, 2, 3, 4]);
        // DataLength now runs past the end of the transfer.
        data.rx_buffer_mut()[12] = 0xFF;

        assert_eq!(data.bulk_out_complete(&mut bus, len, &mut state.stats), Ok(None));
        assert_eq!(state.stats.rx_error, 1);
    }

    #[test]
    fn test_receive_short_transfer_discarded() {
        let (mut data, mut state, mut bus) = setup();
        assert_eq!(data.bulk_out_complete(&mut bus, 10, &mut state.stats), Ok(None));
        assert_eq!(bus.reads.len(), 1);
    }

    #[test]
    fn test_eth_rx_small_buffer_keeps_frame() {
        let (mut data, mut state, mut bus) = setup();
        let len = load_packet(&mut data, &[7u8; 32]);
        data.bulk_out_complete(&mut bus, len, &mut state.stats).unwrap();

        let mut out = [0u8; 16];
        assert_eq!(
            data.eth_rx(&mut bus, &mut out),
            Err(RndisError::Truncated { needed: 32, actual: 16 })
        );
        assert!(data.rx().frame().is_some());
        assert!(bus.reads.is_empty());
    }

    #[test]
    fn test_rx_release() {
        let (mut data, mut state, mut bus) = setup();
        data.rx_release(&mut bus).unwrap();
        assert!(bus.reads.is_empty());

        let len = load_packet(&mut data, &[7u8; 32]);
        data.bulk_out_complete(&mut bus, len, &mut state.stats).unwrap();
        data.rx_release(&mut bus).unwrap();
        assert_eq!(data.rx().frame(), None);
        assert_eq!(bus.reads.len(), 1);
    }

    #[test]
    fn test_transmit_frames_segments() {
        let (mut data, mut state, mut bus) = setup();
        let head = [0x11u8; 14];
        let body = [0x22u8; 30];
        data.eth_tx(&mut bus, &mut state, [&head[..], &body[..]]).unwrap();

        assert_eq!(bus.writes.len(), 1);
        let (ep, packet) = &bus.writes[0];
        assert_eq!(*ep, IN);
        assert_eq!(packet.len(), DATA_PACKET_HEADER_SIZE + 44);
        assert_eq!(read_u32(packet, 0), Ok(REMOTE_NDIS_PACKET_MSG));
        assert_eq!(read_u32(packet, 4), Ok(88));
        assert_eq!(read_u32(packet, 8), Ok(DATA_PACKET_DATA_OFFSET));
        assert_eq!(read_u32(packet, 12), Ok(44));
        assert_eq!(&packet[44..58], &head[..]);
        assert_eq!(&packet[58..], &body[..]);
        assert_eq!(data.tx().in_flight(), 88);
    }

    #[test]
    fn test_transmit_while_busy() {
        let (mut data, mut state, mut bus) = setup();
        data.eth_tx(&mut bus, &mut state, [&[1u8; 10][..]]).unwrap();
        let before = data.tx().as_bytes().to_vec();

        assert_eq!(
            data.eth_tx(&mut bus, &mut state, [&[2u8; 20][..]]),
            Err(RndisError::Busy)
        );
        assert_eq!(data.tx().as_bytes(), &before[..]);
        assert_eq!(bus.writes.len(), 1);
    }

    #[test]
    fn test_transmit_link_down_dropped() {
        let (mut data, mut state, mut bus) = setup();
        state.set_link(NdisMediaState::Disconnected);
        assert_eq!(data.eth_tx(&mut bus, &mut state, [&[1u8; 10][..]]), Ok(()));
        assert!(bus.writes.is_empty());
        assert!(data.tx().is_idle());
    }

    #[test]
    fn test_transmit_oversized_truncated() {
        let (mut data, mut state, mut bus) = setup();
        let capacity = data.tx().payload_capacity();
        let big = vec![0x33u8; capacity + 100];
        data.eth_tx(&mut bus, &mut state, [&big[..]]).unwrap();

        let (_, packet) = &bus.writes[0];
        assert_eq!(packet.len(), DATA_PACKET_HEADER_SIZE + capacity);
        assert_eq!(read_u32(packet, 12), Ok(capacity as u32));
    }

    #[test]
    fn test_zlp_on_packet_multiple() {
        let (mut data, mut state, mut bus) = setup();
        // 44 + 84 = 128, two full 64-byte packets.
        data.eth_tx(&mut bus, &mut state, [&[0u8; 84][..]]).unwrap();

        data.bulk_in_complete(&mut bus, 128, &mut state.stats).unwrap();
        assert_eq!(bus.writes.len(), 2);
        assert!(bus.writes[1].1.is_empty());
        assert!(!data.tx().is_idle());
        assert_eq!(state.stats.tx_ok, 0);

        data.bulk_in_complete(&mut bus, 0, &mut state.stats).unwrap();
        assert!(data.tx().is_idle());
        assert_eq!(state.stats.tx_ok, 1);
        assert_eq!(bus.writes.len(), 2);
    }

    #[test]
    fn test_no_zlp_on_short_packet() {
        let (mut data, mut state, mut bus) = setup();
        data.eth_tx(&mut bus, &mut state, [&[0u8; 50][..]]).unwrap();

        data.bulk_in_complete(&mut bus, 94, &mut state.stats).unwrap();
        assert!(data.tx().is_idle());
        assert_eq!(bus.writes.len(), 1);
        assert_eq!(state.stats.tx_ok, 1);
    }

    #[test]
    fn test_refused_write_frees_slot() {
        let (mut data, mut state, mut bus) = setup();
        bus.refuse_writes = true;
        assert_eq!(
            data.eth_tx(&mut bus, &mut state, [&[0u8; 10][..]]),
            Err(RndisError::Bus(UsbdError::Stalled(IN)))
        );
        assert!(data.tx().is_idle());
        assert_eq!(state.stats.tx_error, 1);
    }

    #[test]
    fn test_reset_clears_slots() {
        let (mut data, mut state, mut bus) = setup();
        data.eth_tx(&mut bus, &mut state, [&[0u8; 10][..]]).unwrap();
        let len = load_packet(&mut data, &[1, 2, 3]);
        data.bulk_out_complete(&mut bus, len, &mut state.stats).unwrap();

        data.reset();
        assert!(data.tx().is_idle());
        assert_eq!(data.rx().frame(), None);
    }
}
