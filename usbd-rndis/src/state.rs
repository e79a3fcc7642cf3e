//! RNDIS device state
//!
//! One `RndisState` exists per attached function. It is created at
//! bring-up and mutated only by the control handlers and by the transfer
//! engine's bus events.
//!
//! # Lifecycle
//!
//! ```text
//!                  INITIALIZE / SET filter=0
//!  Uninitialized ─────────────────────────────▶ Initialized
//!     ▲      │                                   │  ▲
//!     │      │ SET filter!=0                     │  │ SET filter=0
//!     │      ▼                                   ▼  │
//!     │   DataInitialized ◀──────────────────────┘  │
//!     │   (SET filter!=0)  ─────────────────────────┘
//!     │
//!     └── HALT / RESET (from any phase)
//! ```
//!
//! INITIALIZE alone never reaches DataInitialized; only a nonzero packet
//! filter does, in any phase.

use log::info;

use crate::config::{RndisConfig, DRIVER_VERSION};
use crate::error::{Result, RndisError};
use crate::ethernet::MacAddress;
use crate::ndis::{NdisMediaState, PacketFilter};

/// Initialization phase of the RNDIS function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RndisPhase {
    /// No INITIALIZE seen, or halted/reset since
    #[default]
    Uninitialized,
    /// INITIALIZE completed, host not receiving
    Initialized,
    /// Packet filter set, data path live
    DataInitialized,
}

impl RndisPhase {
    /// Whether the lifecycle allows moving from `self` to `to`.
    pub fn can_transition_to(self, to: RndisPhase) -> bool {
        match (self, to) {
            (_, RndisPhase::Uninitialized) | (_, RndisPhase::Initialized) => true,
            (RndisPhase::Uninitialized, RndisPhase::DataInitialized) => false,
            (_, RndisPhase::DataInitialized) => true,
        }
    }
}

/// Ethernet statistics reported through the xmit/rcv OIDs
///
/// Counters are 32-bit to match the 4-byte query answers and wrap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EthStats {
    /// Frames sent to the host
    pub tx_ok: u32,
    /// Frames received from the host
    pub rx_ok: u32,
    /// Frames the transfer engine refused to send
    pub tx_error: u32,
    /// Bulk-OUT transfers discarded for bad framing
    pub rx_error: u32,
}

/// Per-function device state
#[derive(Debug, Clone)]
pub struct RndisState {
    phase: RndisPhase,
    link: NdisMediaState,
    filter: PacketFilter,
    /// Link speed in bit/s
    pub speed: u32,
    driver_version: u32,
    pub mac: MacAddress,
    pub stats: EthStats,
}

impl RndisState {
    pub fn new(config: &RndisConfig) -> Self {
        Self {
            phase: RndisPhase::Uninitialized,
            link: NdisMediaState::Disconnected,
            filter: PacketFilter::empty(),
            speed: config.link_speed,
            driver_version: DRIVER_VERSION,
            mac: config.mac,
            stats: EthStats::default(),
        }
    }

    pub fn phase(&self) -> RndisPhase {
        self.phase
    }

    pub fn link(&self) -> NdisMediaState {
        self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link == NdisMediaState::Connected
    }

    pub fn packet_filter(&self) -> PacketFilter {
        self.filter
    }

    pub fn driver_version(&self) -> u32 {
        self.driver_version
    }

    fn enter(&mut self, to: RndisPhase) {
        if self.phase != to {
            info!("[RNDIS] Phase {:?} -> {:?}", self.phase, to);
        }
        self.phase = to;
    }

    /// Move to `to` if the lifecycle allows it.
    pub fn transition(&mut self, to: RndisPhase) -> Result<()> {
        if !self.phase.can_transition_to(to) {
            return Err(RndisError::InvalidTransition { from: self.phase, to });
        }
        self.enter(to);
        Ok(())
    }

    /// Record the host's packet filter and derive the phase from it,
    /// whatever the current phase.
    pub fn set_packet_filter(&mut self, filter: PacketFilter) {
        self.filter = filter;
        self.enter(if filter.is_empty() {
            RndisPhase::Initialized
        } else {
            RndisPhase::DataInitialized
        });
    }

    /// HALT and RESET both drop the function back to Uninitialized.
    pub fn uninitialize(&mut self) {
        self.enter(RndisPhase::Uninitialized);
    }

    pub fn set_link(&mut self, link: NdisMediaState) {
        if self.link != link {
            info!("[RNDIS] Link {:?}", link);
        }
        self.link = link;
    }
}
