use thiserror::Error;

use crate::protocol::cursor::Truncated;

/// RTP version 2, no padding, no extension, no CSRC
pub const RTP_FIRST_OCTET: u8 = 0x80;

/// Dynamic payload type used by `AppleMIDI`
pub const PAYLOAD_TYPE_MIDI: u8 = 0x61;

/// RTP header of an RTP-MIDI packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpMidiHeader {
    /// Sequence number (16 bits, wraps)
    pub sequence: u16,
    /// Coarse sender timestamp
    pub timestamp: u32,
    /// Synchronization source ID
    pub ssrc: u32,
}

impl RtpMidiHeader {
    /// Standard RTP header size
    pub const SIZE: usize = 12;

    /// Create a header
    #[must_use]
    pub fn new(sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            sequence,
            timestamp,
            ssrc,
        }
    }

    /// Whether `buf` starts like an RTP-MIDI packet
    ///
    /// The first octet must be exactly `RTP_FIRST_OCTET`; packets with
    /// padding, an extension or CSRC entries are not RTP-MIDI. The marker bit
    /// is ignored.
    #[must_use]
    pub fn matches(buf: &[u8]) -> bool {
        buf.len() >= 2 && buf[0] == RTP_FIRST_OCTET && buf[1] & 0x7F == PAYLOAD_TYPE_MIDI
    }

    /// Encode header to bytes
    #[must_use]
    pub fn encode(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];

        buf[0] = RTP_FIRST_OCTET;
        buf[1] = PAYLOAD_TYPE_MIDI;
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        buf
    }

    /// Decode header from bytes
    ///
    /// # Errors
    ///
    /// Returns `RtpMidiDecodeError` if the buffer is too small or does not
    /// carry the RTP-MIDI payload type.
    pub fn decode(buf: &[u8]) -> Result<Self, RtpMidiDecodeError> {
        if !Self::matches(buf) {
            return Err(RtpMidiDecodeError::NotRtpMidi);
        }
        if buf.len() < Self::SIZE {
            return Err(RtpMidiDecodeError::Truncated(Truncated {
                needed: Self::SIZE,
                have: buf.len(),
            }));
        }

        Ok(Self {
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

/// RTP-MIDI decode errors
#[derive(Debug, Error)]
pub enum RtpMidiDecodeError {
    #[error("not an RTP-MIDI packet")]
    NotRtpMidi,

    #[error(transparent)]
    Truncated(#[from] Truncated),

    #[error("data byte without a running status")]
    MissingStatus,

    #[error("status 0x{status:02x} needs {needed} data bytes, have {have}")]
    MissingData {
        status: u8,
        needed: usize,
        have: usize,
    },

    #[error("unexpected termination of SysEx message")]
    UnterminatedSysex,
}
