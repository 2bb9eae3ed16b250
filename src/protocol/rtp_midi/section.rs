//! MIDI command section (RFC 6295 §3)
//!
//! ```text
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |B|J|Z|P|LEN... | (LEN cont.)   |  MIDI list ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The journal (J) is never decoded; bytes past LEN are ignored.

use bytes::{BufMut, Bytes, BytesMut};

use super::header::{RtpMidiDecodeError, RtpMidiHeader};
use crate::midi::status::{SYSEX_END, SYSEX_START, expected_data_bytes, is_status};
use crate::protocol::cursor::{ByteCursor, Truncated};

const FLAG_LONG: u8 = 0x80;
const FLAG_JOURNAL: u8 = 0x40;
const FLAG_DELTA_FIRST: u8 = 0x20;
const FLAG_PHANTOM: u8 = 0x10;

/// Largest length the 12-bit LEN field can carry
pub const MAX_SECTION_LEN: usize = 0x0FFF;

/// Size of the long (B=1) section header
pub const LONG_HEADER_SIZE: usize = 2;

/// Parsed command section header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    /// B: two-octet header with 12-bit length
    pub long: bool,
    /// J: a journal follows the command list
    pub journal: bool,
    /// Z: the first command carries a delta time
    pub delta_first: bool,
    /// P: status byte of the first command was absent in the source stream
    pub phantom: bool,
    /// Length of the command list
    pub length: usize,
}

impl SectionHeader {
    /// Read the one- or two-octet header
    ///
    /// # Errors
    ///
    /// Returns `RtpMidiDecodeError::Truncated` if the header is cut short.
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, RtpMidiDecodeError> {
        let first = cursor.read_u8()?;
        let long = first & FLAG_LONG != 0;
        let mut length = usize::from(first & 0x0F);
        if long {
            length = (length << 8) | usize::from(cursor.read_u8()?);
        }

        Ok(Self {
            long,
            journal: first & FLAG_JOURNAL != 0,
            delta_first: first & FLAG_DELTA_FIRST != 0,
            phantom: first & FLAG_PHANTOM != 0,
            length,
        })
    }
}

/// Encode a long-form section header for `len` bytes of command list
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn long_header(len: usize) -> [u8; 2] {
    let len = len.min(MAX_SECTION_LEN);
    [FLAG_LONG | ((len >> 8) as u8 & 0x0F), len as u8]
}

/// Read the length out of an encoded long-form section header
#[must_use]
pub fn long_header_len(header: [u8; 2]) -> usize {
    (usize::from(header[0] & 0x0F) << 8) | usize::from(header[1])
}

/// Encode a complete RTP-MIDI packet around an already-formatted command list
#[must_use]
pub fn encode_packet(header: &RtpMidiHeader, commands: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(RtpMidiHeader::SIZE + LONG_HEADER_SIZE + commands.len());
    buf.put_slice(&header.encode());
    buf.put_slice(&long_header(commands.len()));
    buf.put_slice(commands);
    buf.freeze()
}

/// One command out of a command section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiCommand<'a> {
    /// Packet timestamp plus accumulated delta times
    pub timestamp: u32,
    /// Status byte (running status applied)
    pub status: u8,
    /// Data bytes following the status
    pub data: &'a [u8],
    /// Position of `data` within a SysEx spanning several packets
    pub continued_sysex_offset: usize,
}

/// Read a variable-length delta time (at most four octets)
///
/// # Errors
///
/// Returns `RtpMidiDecodeError::Truncated` if the list ends inside the value.
pub fn read_delta_time(cursor: &mut ByteCursor<'_>) -> Result<u32, RtpMidiDecodeError> {
    let mut delta = 0u32;
    for _ in 0..4 {
        let byte = cursor.read_u8()?;
        delta = (delta << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok(delta)
}

/// Decode a command section, emitting each command in order
///
/// `sysex_offset` is the per-peer count of SysEx bytes delivered so far; it
/// survives across packets while a SysEx continues and is reset otherwise.
/// The LEN field is clamped to the bytes actually present. Commands decoded
/// before an error have already been emitted.
///
/// # Errors
///
/// Returns `RtpMidiDecodeError` on a truncated header or command, a data
/// byte without running status, or a SysEx run with no terminator.
pub fn decode_command_section<'a, F>(
    section: &'a [u8],
    timestamp: u32,
    sysex_offset: &mut usize,
    mut emit: F,
) -> Result<usize, RtpMidiDecodeError>
where
    F: FnMut(MidiCommand<'a>),
{
    let mut cursor = ByteCursor::new(section);
    let header = SectionHeader::read(&mut cursor)?;
    let length = header.length.min(cursor.remaining());
    let mut list = ByteCursor::new(cursor.take(length)?);

    let mut timestamp = timestamp;
    let mut status = 0u8;
    let mut count = 0usize;

    while !list.is_empty() {
        if count > 0 || header.delta_first {
            timestamp = timestamp.wrapping_add(read_delta_time(&mut list)?);
        }

        match list.peek() {
            Some(byte) if is_status(byte) => {
                status = byte;
                list.read_u8()?;
            }
            Some(_) => {}
            None => return Err(Truncated { needed: 1, have: 0 }.into()),
        }
        if status == 0 {
            return Err(RtpMidiDecodeError::MissingStatus);
        }

        if status == SYSEX_END && list.remaining() > 1 {
            status = SYSEX_START;
        } else {
            *sysex_offset = 0;
        }

        if status == SYSEX_START {
            let run = (0..list.remaining())
                .take_while(|&i| list.peek_at(i).is_some_and(|b| !is_status(b)))
                .count();
            let data = list.take(run)?;
            emit(MidiCommand {
                timestamp,
                status,
                data,
                continued_sysex_offset: *sysex_offset,
            });
            *sysex_offset += run;
            count += 1;

            match list.peek() {
                Some(SYSEX_START) => {
                    list.read_u8()?;
                }
                Some(SYSEX_END) => {
                    list.read_u8()?;
                    status = SYSEX_END;
                    *sysex_offset = 0;
                    emit(MidiCommand {
                        timestamp,
                        status,
                        data: &[],
                        continued_sysex_offset: 0,
                    });
                }
                _ => return Err(RtpMidiDecodeError::UnterminatedSysex),
            }
        } else {
            let needed = expected_data_bytes(status);
            let have = list.remaining();
            let data = list
                .take(needed)
                .map_err(|_| RtpMidiDecodeError::MissingData {
                    status,
                    needed,
                    have,
                })?;
            emit(MidiCommand {
                timestamp,
                status,
                data,
                continued_sysex_offset: *sysex_offset,
            });
            count += 1;
        }
    }

    Ok(count)
}
