//! USB device stack interface
//!
//! The device stack owns the endpoints, queues transfers and reports their
//! completion. This module defines what the RNDIS function needs from it
//! ([`UsbdBus`]), the events and class requests it delivers, and
//! [`RndisDevice`], the single entry point that ties the control and data
//! paths to one device state.
//!
//! # Entry points
//!
//! | Stack event                          | Call                                   |
//! |--------------------------------------|----------------------------------------|
//! | bus reset / set configuration        | [`RndisDevice::on_event`]              |
//! | class request on the RNDIS interface | [`RndisDevice::handle_class_request`]  |
//! | transfer finished on an endpoint     | [`RndisDevice::on_endpoint_complete`]  |
//!
//! The network stack side uses [`RndisDevice::eth_rx`],
//! [`RndisDevice::rx_release`] and [`RndisDevice::eth_tx`].

use core::fmt;

use log::{debug, info, warn};
use spin::Mutex;

use crate::config::RndisConfig;
use crate::control::{Completion, ControlPlane};
use crate::data::DataPath;
use crate::error::{Result, RndisError};
use crate::ndis::NdisMediaState;
use crate::state::RndisState;

/// USB endpoint address (direction bit included)
pub type EndpointAddress = u8;

/// CDC SEND_ENCAPSULATED_COMMAND
pub const CDC_SEND_ENCAPSULATED_COMMAND: u8 = 0x00;
/// CDC GET_ENCAPSULATED_RESPONSE
pub const CDC_GET_ENCAPSULATED_RESPONSE: u8 = 0x01;

/// RESPONSE_AVAILABLE notification sent on the interrupt endpoint
pub const NOTIFY_RESPONSE_AVAILABLE: [u8; 8] = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbdError {
    /// A transfer is already queued on the endpoint
    EndpointBusy(EndpointAddress),
    /// Endpoint halted
    Stalled(EndpointAddress),
    /// Device is not in the configured state
    NotConfigured,
    /// Endpoint not owned by this function
    InvalidEndpoint(EndpointAddress),
}

impl fmt::Display for UsbdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndpointBusy(ep) => write!(f, "Endpoint {:#04x} busy", ep),
            Self::Stalled(ep) => write!(f, "Endpoint {:#04x} stalled", ep),
            Self::NotConfigured => write!(f, "Device not configured"),
            Self::InvalidEndpoint(ep) => write!(f, "Invalid endpoint {:#04x}", ep),
        }
    }
}

/// Transfer operations provided by the USB device stack
///
/// Both calls only queue the transfer. Its completion is reported later
/// through [`RndisDevice::on_endpoint_complete`] with the number of bytes
/// actually moved. The buffers passed in belong to the RNDIS function and
/// are neither moved nor resized until that completion, so a DMA engine
/// may hold on to their address.
pub trait UsbdBus {
    /// Queue a read of up to `buf.len()` bytes on OUT endpoint `ep`.
    fn start_read(&mut self, ep: EndpointAddress, buf: &mut [u8]) -> core::result::Result<(), UsbdError>;

    /// Queue a write of `data` on IN endpoint `ep`. An empty slice sends a
    /// zero-length packet.
    fn start_write(&mut self, ep: EndpointAddress, data: &[u8]) -> core::result::Result<(), UsbdError>;
}

/// Endpoints of the RNDIS function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RndisEndpoints {
    /// Bulk OUT: host to device data packets
    pub bulk_out: EndpointAddress,
    /// Bulk IN: device to host data packets
    pub bulk_in: EndpointAddress,
    /// Interrupt IN: response-available notifications
    pub notify: EndpointAddress,
}

impl Default for RndisEndpoints {
    fn default() -> Self {
        Self {
            bulk_out: 0x01,
            bulk_in: 0x81,
            notify: 0x82,
        }
    }
}

/// Device lifecycle events reported by the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbdEvent {
    /// Bus reset
    Reset,
    /// Host selected the configuration containing this function
    Configured,
}

/// Setup stage of a control transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

/// Data stage produced by a class request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlReply<'a> {
    /// Host-to-device request accepted, no data to return
    Ack,
    /// Device-to-host data stage
    Data(&'a [u8]),
}

/// RNDIS function bound to one set of endpoints
pub struct RndisDevice {
    config: RndisConfig,
    endpoints: RndisEndpoints,
    state: RndisState,
    control: ControlPlane,
    data: DataPath,
}

impl RndisDevice {
    /// Create the function. Fails if `config` does not validate.
    pub fn new(config: RndisConfig, endpoints: RndisEndpoints) -> Result<Self> {
        config.validate()?;

        info!(
            "[RNDIS] Function created: MAC {}, max frame {}, bulk OUT {:#04x} IN {:#04x}, notify {:#04x}",
            config.mac, config.max_frame_size, endpoints.bulk_out, endpoints.bulk_in, endpoints.notify
        );

        Ok(Self {
            state: RndisState::new(&config),
            control: ControlPlane::new(&config),
            data: DataPath::new(&config, endpoints.bulk_out, endpoints.bulk_in),
            endpoints,
            config,
        })
    }

    pub fn config(&self) -> &RndisConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &RndisEndpoints {
        &self.endpoints
    }

    pub fn state(&self) -> &RndisState {
        &self.state
    }

    pub fn control(&self) -> &ControlPlane {
        &self.control
    }

    pub fn data(&self) -> &DataPath {
        &self.data
    }

    /// Handle a device lifecycle event.
    pub fn on_event<B: UsbdBus>(&mut self, bus: &mut B, event: UsbdEvent) -> Result<()> {
        match event {
            UsbdEvent::Reset => {
                info!("[RNDIS] Bus reset");
                self.state.set_link(NdisMediaState::Disconnected);
                Ok(())
            }
            UsbdEvent::Configured => {
                info!("[RNDIS] Configured");
                self.data.reset();
                self.state.set_link(NdisMediaState::Connected);
                self.data.arm_read(bus)
            }
        }
    }

    /// Handle a class-specific control request addressed to the function.
    ///
    /// `data` is the host-to-device data stage. For a response pull the
    /// returned data stage is cut to `setup.length`.
    pub fn handle_class_request<B: UsbdBus>(
        &mut self,
        bus: &mut B,
        setup: &SetupPacket,
        data: &[u8],
    ) -> Result<ControlReply<'_>> {
        let length = setup.length as usize;
        match setup.request {
            CDC_SEND_ENCAPSULATED_COMMAND => {
                let command = &data[..data.len().min(length)];
                self.send_encapsulated_command(bus, command)?;
                Ok(ControlReply::Ack)
            }
            CDC_GET_ENCAPSULATED_RESPONSE => {
                let response = self.get_encapsulated_response()?;
                Ok(ControlReply::Data(&response[..response.len().min(length)]))
            }
            other => {
                warn!("[RNDIS] Unsupported class request {:#04x}", other);
                Err(RndisError::UnsupportedRequest(other))
            }
        }
    }

    /// Dispatch one encapsulated command and notify the host if the
    /// handler asks for it.
    pub fn send_encapsulated_command<B: UsbdBus>(&mut self, bus: &mut B, command: &[u8]) -> Result<()> {
        match self.control.dispatch(command, &mut self.state, &self.config)? {
            Completion::Notify => self.notify(bus),
            Completion::Silent => Ok(()),
        }
    }

    /// Pull the stored response, emptying the mailbox.
    pub fn get_encapsulated_response(&mut self) -> Result<&[u8]> {
        self.control.take_response()
    }

    fn notify<B: UsbdBus>(&mut self, bus: &mut B) -> Result<()> {
        bus.start_write(self.endpoints.notify, &NOTIFY_RESPONSE_AVAILABLE)?;
        Ok(())
    }

    /// Route a transfer completion by endpoint.
    ///
    /// Returns the received frame when a bulk-OUT transfer held a valid data
    /// packet. The frame stays in the receive buffer until
    /// [`eth_rx`](Self::eth_rx) or [`rx_release`](Self::rx_release) rearms
    /// the read.
    pub fn on_endpoint_complete<B: UsbdBus>(
        &mut self,
        bus: &mut B,
        ep: EndpointAddress,
        nbytes: usize,
    ) -> Result<Option<&[u8]>> {
        if ep == self.endpoints.bulk_out {
            self.data.bulk_out_complete(bus, nbytes, &mut self.state.stats)
        } else if ep == self.endpoints.bulk_in {
            self.data.bulk_in_complete(bus, nbytes, &mut self.state.stats)?;
            Ok(None)
        } else if ep == self.endpoints.notify {
            debug!("[RNDIS] Notification sent");
            Ok(None)
        } else {
            warn!("[RNDIS] Completion on foreign endpoint {:#04x}", ep);
            Err(RndisError::Bus(UsbdError::InvalidEndpoint(ep)))
        }
    }

    /// Receive buffer the stack fills for a queued bulk-OUT read.
    pub fn rx_buffer_mut(&mut self) -> &mut [u8] {
        self.data.rx_buffer_mut()
    }

    /// Frame received but not yet consumed.
    pub fn pending_frame(&self) -> Option<&[u8]> {
        self.data.rx().frame()
    }

    /// Copy the pending frame into `out` and rearm the bulk-OUT read.
    pub fn eth_rx<B: UsbdBus>(&mut self, bus: &mut B, out: &mut [u8]) -> Result<Option<usize>> {
        self.data.eth_rx(bus, out)
    }

    /// Drop the pending frame and rearm the bulk-OUT read.
    pub fn rx_release<B: UsbdBus>(&mut self, bus: &mut B) -> Result<()> {
        self.data.rx_release(bus)
    }

    /// Send one frame, given as consecutive segments, to the host.
    pub fn eth_tx<'a, B, I>(&mut self, bus: &mut B, segments: I) -> Result<()>
    where
        B: UsbdBus,
        I: IntoIterator<Item = &'a [u8]>,
    {
        self.data.eth_tx(bus, &mut self.state, segments)
    }

    pub fn is_tx_idle(&self) -> bool {
        self.data.tx().is_idle()
    }
}

struct Inner<B> {
    device: RndisDevice,
    bus: B,
}

/// Lock-protected device and bus, for stacks that call back from
/// interrupt context through a shared reference.
pub struct RndisInterface<B: UsbdBus> {
    inner: Mutex<Inner<B>>,
}

impl<B: UsbdBus> RndisInterface<B> {
    pub fn new(device: RndisDevice, bus: B) -> Self {
        Self {
            inner: Mutex::new(Inner { device, bus }),
        }
    }

    pub fn on_event(&self, event: UsbdEvent) -> Result<()> {
        let mut guard = self.inner.lock();
        let Inner { device, bus } = &mut *guard;
        device.on_event(bus, event)
    }

    /// Handle a class request. A response pull is copied into `out`;
    /// returns the data stage length.
    pub fn handle_class_request(&self, setup: &SetupPacket, data: &[u8], out: &mut [u8]) -> Result<usize> {
        let mut guard = self.inner.lock();
        let Inner { device, bus } = &mut *guard;
        match device.handle_class_request(bus, setup, data)? {
            ControlReply::Ack => Ok(0),
            ControlReply::Data(response) => {
                let len = response.len().min(out.len());
                out[..len].copy_from_slice(&response[..len]);
                Ok(len)
            }
        }
    }

    /// Route a completion. `deliver` sees a received frame while the lock is
    /// held; the frame remains pending until [`eth_rx`](Self::eth_rx).
    pub fn on_endpoint_complete<F>(&self, ep: EndpointAddress, nbytes: usize, deliver: F) -> Result<()>
    where
        F: FnOnce(&[u8]),
    {
        let mut guard = self.inner.lock();
        let Inner { device, bus } = &mut *guard;
        if let Some(frame) = device.on_endpoint_complete(bus, ep, nbytes)? {
            deliver(frame);
        }
        Ok(())
    }

    pub fn eth_rx(&self, out: &mut [u8]) -> Result<Option<usize>> {
        let mut guard = self.inner.lock();
        let Inner { device, bus } = &mut *guard;
        device.eth_rx(bus, out)
    }

    pub fn eth_tx<'a, I>(&self, segments: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut guard = self.inner.lock();
        let Inner { device, bus } = &mut *guard;
        device.eth_tx(bus, segments)
    }

    /// Run `f` with the device and bus locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut RndisDevice, &mut B) -> R) -> R {
        let mut guard = self.inner.lock();
        let Inner { device, bus } = &mut *guard;
        f(device, bus)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use alloc::vec::Vec;

    use super::{EndpointAddress, UsbdBus, UsbdError};

    /// Records every queued transfer.
    #[derive(Debug, Default)]
    pub struct MockBus {
        pub reads: Vec<(EndpointAddress, usize)>,
        pub writes: Vec<(EndpointAddress, Vec<u8>)>,
        pub refuse_writes: bool,
    }

    impl MockBus {
        pub fn writes_to(&self, ep: EndpointAddress) -> Vec<&[u8]> {
            self.writes
                .iter()
                .filter(|(addr, _)| *addr == ep)
                .map(|(_, data)| data.as_slice())
                .collect()
        }
    }

    impl UsbdBus for MockBus {
        fn start_read(&mut self, ep: EndpointAddress, buf: &mut [u8]) -> Result<(), UsbdError> {
            self.reads.push((ep, buf.len()));
            Ok(())
        }

        fn start_write(&mut self, ep: EndpointAddress, data: &[u8]) -> Result<(), UsbdError> {
            if self.refuse_writes {
                return Err(UsbdError::Stalled(ep));
            }
            self.writes.push((ep, data.to_vec()));
            Ok(())
        }
    }
}
