use std::io;
use thiserror::Error;

use crate::discovery::AdvertiserError;
use crate::protocol::applemidi::ControlDecodeError;
use crate::protocol::rtp_midi::RtpMidiDecodeError;

/// Errors that can occur during `AppleMIDI` operations
#[derive(Debug, Error)]
pub enum AppleMidiError {
    // ===== Caller Misuse =====
    /// Slot index is the local identity or beyond the table capacity
    #[error("invalid slot: {slot}")]
    InvalidSlot {
        /// The rejected slot index
        slot: usize,
    },

    /// Slot already hosts a session or a pending invitation
    #[error("slot {slot} is already allocated")]
    SlotBusy {
        /// The busy slot index
        slot: usize,
    },

    /// Slot does not host a session
    #[error("no session allocated at slot {slot}")]
    SlotNotAllocated {
        /// The free slot index
        slot: usize,
    },

    // ===== Resource Exhaustion =====
    /// Every remote slot is in use
    #[error("no free session slot")]
    NoFreeSlot,

    // ===== Protocol Errors =====
    /// Control command could not be decoded
    #[error("control command error: {0}")]
    ControlDecode(#[from] ControlDecodeError),

    /// RTP-MIDI payload could not be decoded
    #[error("RTP-MIDI error: {0}")]
    RtpMidiDecode(#[from] RtpMidiDecodeError),

    /// Datagram matches neither the control nor the RTP-MIDI shape
    #[error("unknown datagram, leading bytes 0x{leading:08x}")]
    UnknownDatagram {
        /// First (up to) four bytes, big-endian
        leading: u32,
    },

    /// Traffic from a synchronization source without a session
    #[error("unregistered peer with SSRC 0x{ssrc:08x}")]
    UnknownPeer {
        /// Synchronization source id of the sender
        ssrc: u32,
    },

    // ===== I/O Errors =====
    /// Network I/O error
    #[error("network error: {0}")]
    NetworkError(#[from] io::Error),

    /// Service advertisement failed
    #[error("advertiser error: {0}")]
    Advertiser(#[from] AdvertiserError),

    /// The server task is gone
    #[error("server closed")]
    ServerClosed,
}

impl AppleMidiError {
    /// Negative result code of the lifecycle API
    ///
    /// `-1` for an invalid slot, `-2` for a busy or unallocated slot, `-3` for
    /// anything else.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidSlot { .. } => -1,
            Self::SlotBusy { .. } | Self::SlotNotAllocated { .. } => -2,
            _ => -3,
        }
    }

    /// Check if this error is a dropped datagram rather than a caller mistake
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::ControlDecode(_)
                | Self::RtpMidiDecode(_)
                | Self::UnknownDatagram { .. }
                | Self::UnknownPeer { .. }
        )
    }
}

/// Result type alias for `AppleMIDI` operations
pub type Result<T> = std::result::Result<T, AppleMidiError>;
