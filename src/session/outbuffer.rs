//! Outgoing RTP-MIDI packet coalescing

use bytes::{BufMut, Bytes, BytesMut};

use super::clock::is_due;
use crate::midi::status::{SYSEX_END, SYSEX_START};
use crate::protocol::rtp_midi::{LONG_HEADER_SIZE, RtpMidiHeader, long_header, long_header_len};

/// RTP header plus the long-form section header
pub const HEADER_RESERVE: usize = RtpMidiHeader::SIZE + LONG_HEADER_SIZE;

/// One RTP-MIDI packet under construction
///
/// The section header always uses the two-octet form so the length can be
/// patched in place as commands are appended. Commands after the first
/// are separated by a zero delta time.
#[derive(Debug)]
pub struct OutBuffer {
    buf: BytesMut,
    capacity: usize,
    last_flush: u32,
}

impl OutBuffer {
    /// Create an empty buffer holding at most `capacity` bytes per packet
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            last_flush: 0,
        }
    }

    /// Packet capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes buffered, header included
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// No packet in progress
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Messages at least this long bypass the buffer and are fragmented
    #[must_use]
    pub fn max_message_len(&self) -> usize {
        self.capacity.saturating_sub(HEADER_RESERVE)
    }

    /// Payload bytes per fragment, leaving room for the F7/F0 markers
    #[must_use]
    pub fn max_fragment_len(&self) -> usize {
        self.max_message_len().saturating_sub(2)
    }

    /// Length field of the packet in progress
    #[must_use]
    pub fn command_len(&self) -> usize {
        if self.buf.len() < HEADER_RESERVE {
            return 0;
        }
        long_header_len([
            self.buf[RtpMidiHeader::SIZE],
            self.buf[RtpMidiHeader::SIZE + 1],
        ])
    }

    /// Whether `len` more bytes can be appended without flushing first
    #[must_use]
    pub fn fits(&self, len: usize) -> bool {
        self.buf.len() + len < self.max_message_len()
    }

    /// Begin a packet with `header` and an empty command list
    pub fn start(&mut self, header: &RtpMidiHeader) {
        self.buf.clear();
        self.buf.put_slice(&header.encode());
        self.buf.put_slice(&long_header(0));
    }

    /// Append one command
    ///
    /// Returns `false` without writing anything if no packet was started.
    pub fn push(&mut self, bytes: &[u8]) -> bool {
        if self.buf.is_empty() {
            return false;
        }

        let mut len = self.command_len();
        if len > 0 {
            self.buf.put_u8(0x00);
            len += 1;
        }
        self.buf.put_slice(bytes);
        len += bytes.len();

        let header = long_header(len);
        self.buf[RtpMidiHeader::SIZE..HEADER_RESERVE].copy_from_slice(&header);
        true
    }

    /// Take the finished packet, leaving the buffer empty
    pub fn take(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            return None;
        }
        Some(self.buf.split().freeze())
    }

    /// Drop any packet in progress
    pub fn clear(&mut self) {
        self.buf.clear();
        self.last_flush = 0;
    }

    /// Whether the periodic flush is due at `now`
    #[must_use]
    pub fn flush_due(&self, now: u32, interval: u32) -> bool {
        is_due(self.last_flush, now, interval)
    }

    /// Record a periodic flush at `now`
    pub fn mark_flushed(&mut self, now: u32) {
        self.last_flush = now;
    }
}

/// Split an oversized SysEx stream into RTP-MIDI command lists
///
/// The first fragment is the head of the stream followed by an `F0`
/// continuation marker; later fragments start with `F7`, and all but the
/// last end with `F0`. Each fragment carries at most `max_fragment` bytes
/// of the stream.
#[must_use]
pub fn split_sysex(stream: &[u8], max_fragment: usize) -> Vec<Bytes> {
    let max_fragment = max_fragment.max(1);
    let mut fragments = Vec::with_capacity(stream.len() / max_fragment + 1);
    let mut pos = 0;

    while pos < stream.len() {
        let n = (stream.len() - pos).min(max_fragment);
        let mut fragment = BytesMut::with_capacity(n + 2);
        if pos > 0 {
            fragment.put_u8(SYSEX_END);
        }
        fragment.put_slice(&stream[pos..pos + n]);
        pos += n;
        if pos < stream.len() {
            fragment.put_u8(SYSEX_START);
        }
        fragments.push(fragment.freeze());
    }

    fragments
}
