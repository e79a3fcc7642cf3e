//! RNDIS function error types
//!
//! Protocol-level outcomes (success, failure, not-supported, invalid-data)
//! travel inside completion messages as [`RndisStatus`](crate::ndis::RndisStatus)
//! and never show up here. `RndisError` covers what is returned to the
//! local caller instead.

use core::fmt;

use crate::state::RndisPhase;
use crate::usbd::UsbdError;

pub type Result<T> = core::result::Result<T, RndisError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RndisError {
    /// Encapsulated command carried a message type with no handler.
    UnknownMessage(u32),
    /// A data transfer is already outstanding on the bulk-IN endpoint.
    Busy,
    /// Buffer shorter than the fixed layout being decoded.
    Truncated { needed: usize, actual: usize },
    /// Response does not fit the encapsulated response buffer.
    ResponseOverflow { needed: usize, capacity: usize },
    /// Class request other than send/get encapsulated.
    UnsupportedRequest(u8),
    /// Host pulled a response while the mailbox was empty.
    NoResponse,
    /// Lifecycle transition not allowed from the current phase.
    InvalidTransition { from: RndisPhase, to: RndisPhase },
    /// Configuration rejected by `RndisConfig::validate`.
    InvalidConfig(&'static str),
    /// Transfer engine refused to queue a transfer.
    Bus(UsbdError),
}

impl fmt::Display for RndisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMessage(ty) => write!(f, "Unknown RNDIS message type {:#010x}", ty),
            Self::Busy => write!(f, "Bulk-IN transfer already in flight"),
            Self::Truncated { needed, actual } => {
                write!(f, "Message truncated: need {} bytes, have {}", needed, actual)
            }
            Self::ResponseOverflow { needed, capacity } => {
                write!(f, "Response of {} bytes exceeds {}-byte buffer", needed, capacity)
            }
            Self::UnsupportedRequest(req) => write!(f, "Unsupported class request {:#04x}", req),
            Self::NoResponse => write!(f, "No encapsulated response available"),
            Self::InvalidTransition { from, to } => {
                write!(f, "Invalid phase transition {:?} -> {:?}", from, to)
            }
            Self::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Self::Bus(err) => write!(f, "Transfer engine error: {}", err),
        }
    }
}

impl From<UsbdError> for RndisError {
    fn from(err: UsbdError) -> Self {
        Self::Bus(err)
    }
}
