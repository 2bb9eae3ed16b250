use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::protocol::cursor::{ByteCursor, Truncated};

/// Leading half-word of every control command
pub const COMMAND_SIGNATURE: u16 = 0xFFFF;

/// Protocol version written into session commands
pub const PROTOCOL_VERSION: u32 = 2;

/// Upper bound of an encoded display name, terminating NUL included
pub const MAX_NAME_LEN: usize = 64;

/// Two-letter command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CommandCode {
    /// "IN"
    Invitation = 0x494E,
    /// "OK"
    InvitationAccepted = 0x4F4B,
    /// "NO"
    InvitationRejected = 0x4E4F,
    /// "BY"
    EndSession = 0x4259,
    /// "CK"
    Synchronization = 0x434B,
    /// "RS"
    ReceiverFeedback = 0x5253,
    /// "RL"
    BitrateReceiveLimit = 0x524C,
}

impl CommandCode {
    /// Parse from the wire value
    #[must_use]
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0x494E => Some(Self::Invitation),
            0x4F4B => Some(Self::InvitationAccepted),
            0x4E4F => Some(Self::InvitationRejected),
            0x4259 => Some(Self::EndSession),
            0x434B => Some(Self::Synchronization),
            0x5253 => Some(Self::ReceiverFeedback),
            0x524C => Some(Self::BitrateReceiveLimit),
            _ => None,
        }
    }

    /// Smallest datagram that carries every fixed field of this command
    #[must_use]
    pub fn min_len(self) -> usize {
        match self {
            Self::Invitation
            | Self::InvitationAccepted
            | Self::InvitationRejected
            | Self::EndSession => 16,
            Self::Synchronization => 36,
            Self::ReceiverFeedback | Self::BitrateReceiveLimit => 12,
        }
    }

    /// Two-letter mnemonic
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Invitation => "IN",
            Self::InvitationAccepted => "OK",
            Self::InvitationRejected => "NO",
            Self::EndSession => "BY",
            Self::Synchronization => "CK",
            Self::ReceiverFeedback => "RS",
            Self::BitrateReceiveLimit => "RL",
        }
    }
}

/// Body shared by IN / OK / NO / BY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionExchange {
    /// Protocol version (2 on send)
    pub version: u32,
    /// Invitation token
    pub token: u32,
    /// Sender's synchronization source id
    pub ssrc: u32,
    /// Display name (IN and OK only)
    pub name: Option<String>,
}

impl SessionExchange {
    /// Create a version-2 body
    #[must_use]
    pub fn new(token: u32, ssrc: u32, name: Option<&str>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            token,
            ssrc,
            name: name.map(str::to_string),
        }
    }
}

/// Body of the three-round clock synchronization command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synchronization {
    /// Sender's synchronization source id
    pub ssrc: u32,
    /// Round counter (0, 1, 2)
    pub count: u8,
    /// Timestamps in 100 µs ticks, one slot per round
    pub timestamps: [u64; 3],
}

/// `AppleMIDI` control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Session invitation
    Invitation(SessionExchange),
    /// Invitation accepted
    InvitationAccepted(SessionExchange),
    /// Invitation rejected
    InvitationRejected(SessionExchange),
    /// Session end
    EndSession(SessionExchange),
    /// Clock synchronization round
    Synchronization(Synchronization),
    /// Last RTP-MIDI sequence number the sender has received
    ReceiverFeedback {
        /// Sender's synchronization source id
        ssrc: u32,
        /// Acknowledged sequence number
        sequence: u16,
    },
    /// Receive bandwidth limit
    BitrateReceiveLimit {
        /// Sender's synchronization source id
        ssrc: u32,
        /// Limit in bits per second
        limit: u32,
    },
}

/// Control command decode errors
#[derive(Debug, Error)]
pub enum ControlDecodeError {
    #[error("missing 0xFFFF command signature")]
    MissingSignature,

    #[error("{} command too short: need {needed} bytes, have {have}", command.mnemonic())]
    TooShort {
        command: CommandCode,
        needed: usize,
        have: usize,
    },

    #[error("unknown command code: 0x{0:04x}")]
    UnknownCommand(u16),

    #[error(transparent)]
    Truncated(#[from] Truncated),
}

impl ControlCommand {
    /// Whether `buf` carries the control command signature
    #[must_use]
    pub fn is_control(buf: &[u8]) -> bool {
        buf.len() >= 4 && buf[0] == 0xFF && buf[1] == 0xFF
    }

    /// Command code
    #[must_use]
    pub fn code(&self) -> CommandCode {
        match self {
            Self::Invitation(_) => CommandCode::Invitation,
            Self::InvitationAccepted(_) => CommandCode::InvitationAccepted,
            Self::InvitationRejected(_) => CommandCode::InvitationRejected,
            Self::EndSession(_) => CommandCode::EndSession,
            Self::Synchronization(_) => CommandCode::Synchronization,
            Self::ReceiverFeedback { .. } => CommandCode::ReceiverFeedback,
            Self::BitrateReceiveLimit { .. } => CommandCode::BitrateReceiveLimit,
        }
    }

    /// Sender's synchronization source id
    #[must_use]
    pub fn ssrc(&self) -> u32 {
        match self {
            Self::Invitation(body)
            | Self::InvitationAccepted(body)
            | Self::InvitationRejected(body)
            | Self::EndSession(body) => body.ssrc,
            Self::Synchronization(sync) => sync.ssrc,
            Self::ReceiverFeedback { ssrc, .. } | Self::BitrateReceiveLimit { ssrc, .. } => *ssrc,
        }
    }

    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16 + MAX_NAME_LEN);
        buf.put_u16(COMMAND_SIGNATURE);
        buf.put_u16(self.code() as u16);

        match self {
            Self::Invitation(body) | Self::InvitationAccepted(body) => {
                Self::put_session(&mut buf, body);
                if let Some(name) = &body.name {
                    put_name(&mut buf, name);
                }
            }
            Self::InvitationRejected(body) | Self::EndSession(body) => {
                Self::put_session(&mut buf, body);
            }
            Self::Synchronization(sync) => {
                buf.put_u32(sync.ssrc);
                buf.put_u32(u32::from(sync.count) << 24);
                for ts in sync.timestamps {
                    buf.put_u64(ts);
                }
            }
            Self::ReceiverFeedback { ssrc, sequence } => {
                buf.put_u32(*ssrc);
                buf.put_u16(*sequence);
                buf.put_u16(0);
            }
            Self::BitrateReceiveLimit { ssrc, limit } => {
                buf.put_u32(*ssrc);
                buf.put_u32(*limit);
            }
        }

        buf.freeze()
    }

    fn put_session(buf: &mut BytesMut, body: &SessionExchange) {
        buf.put_u32(body.version);
        buf.put_u32(body.token);
        buf.put_u32(body.ssrc);
    }

    /// Decode from wire bytes
    ///
    /// # Errors
    ///
    /// Returns `ControlDecodeError` if the signature is missing, the code is
    /// unknown, or the datagram is shorter than the command's fixed layout.
    pub fn decode(buf: &[u8]) -> Result<Self, ControlDecodeError> {
        if !Self::is_control(buf) {
            return Err(ControlDecodeError::MissingSignature);
        }

        let mut cursor = ByteCursor::new(buf);
        cursor.read_u16()?;
        let raw_code = cursor.read_u16()?;
        let command =
            CommandCode::from_u16(raw_code).ok_or(ControlDecodeError::UnknownCommand(raw_code))?;

        if buf.len() < command.min_len() {
            return Err(ControlDecodeError::TooShort {
                command,
                needed: command.min_len(),
                have: buf.len(),
            });
        }

        let decoded = match command {
            CommandCode::Invitation => Self::Invitation(Self::read_session(&mut cursor, true)?),
            CommandCode::InvitationAccepted => {
                Self::InvitationAccepted(Self::read_session(&mut cursor, true)?)
            }
            CommandCode::InvitationRejected => {
                Self::InvitationRejected(Self::read_session(&mut cursor, false)?)
            }
            CommandCode::EndSession => Self::EndSession(Self::read_session(&mut cursor, false)?),
            CommandCode::Synchronization => {
                let ssrc = cursor.read_u32()?;
                #[allow(clippy::cast_possible_truncation)]
                let count = (cursor.read_u32()? >> 24) as u8;
                let timestamps = [cursor.read_u64()?, cursor.read_u64()?, cursor.read_u64()?];
                Self::Synchronization(Synchronization {
                    ssrc,
                    count,
                    timestamps,
                })
            }
            CommandCode::ReceiverFeedback => {
                let ssrc = cursor.read_u32()?;
                let sequence = cursor.read_u16()?;
                Self::ReceiverFeedback { ssrc, sequence }
            }
            CommandCode::BitrateReceiveLimit => {
                let ssrc = cursor.read_u32()?;
                let limit = cursor.read_u32()?;
                Self::BitrateReceiveLimit { ssrc, limit }
            }
        };

        Ok(decoded)
    }

    fn read_session(
        cursor: &mut ByteCursor<'_>,
        with_name: bool,
    ) -> Result<SessionExchange, ControlDecodeError> {
        let version = cursor.read_u32()?;
        let token = cursor.read_u32()?;
        let ssrc = cursor.read_u32()?;
        let name = if with_name {
            read_name(cursor.take_rest())
        } else {
            None
        };

        Ok(SessionExchange {
            version,
            token,
            ssrc,
            name,
        })
    }
}

/// Truncate a display name so that it plus its NUL fits `MAX_NAME_LEN`
#[must_use]
pub fn bounded_name(name: &str) -> &str {
    let limit = MAX_NAME_LEN - 1;
    if name.len() <= limit {
        return name;
    }
    let mut end = limit;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

fn put_name(buf: &mut BytesMut, name: &str) {
    let name = bounded_name(name);
    buf.put_slice(name.as_bytes());
    buf.put_u8(0);
}

fn read_name(raw: &[u8]) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let raw = &raw[..raw.len().min(MAX_NAME_LEN - 1)];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Some(String::from_utf8_lossy(&raw[..end]).into_owned())
}
