//! Device-side RNDIS function
//!
//! Presents a USB peripheral to the host as an 802.3 Ethernet adapter.
//! The control path answers encapsulated RNDIS commands (initialize, halt,
//! query, set, reset, keepalive) from one response mailbox; the data path
//! wraps and unwraps Ethernet frames in RNDIS data packets on the bulk
//! endpoints.
//!
//! The USB device stack is reached through [`UsbdBus`]; the network stack
//! sits on top of [`RndisDevice::eth_rx`] and [`RndisDevice::eth_tx`].
//!
//! ```text
//!   host ── EP0 class requests ──▶ control ──▶ oid / state
//!        ◀─ interrupt notify ────
//!        ── bulk OUT ───────────▶ data ──▶ network stack
//!        ◀─ bulk IN ─────────────      ◀──
//! ```

#![no_std]

extern crate alloc;

pub mod config;
pub mod control;
pub mod data;
pub mod error;
pub mod ethernet;
pub mod message;
pub mod ndis;
pub mod oid;
pub mod state;
pub mod usbd;

pub use config::RndisConfig;
pub use error::{Result, RndisError};
pub use ethernet::MacAddress;
pub use message::RndisMessage;
pub use ndis::{NdisMediaState, PacketFilter, RndisStatus};
pub use state::{RndisPhase, RndisState};
pub use usbd::{
    ControlReply, RndisDevice, RndisEndpoints, RndisInterface, SetupPacket, UsbdBus, UsbdError,
    UsbdEvent,
};
