//! Capability traits at the transport boundary

use std::fmt;
use std::io::Result;
use std::net::SocketAddr;

/// Logical port a datagram arrived on or must leave from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Session control port (handshake, sync, feedback)
    Control,
    /// MIDI payload port (control port + 1)
    Data,
}

impl Channel {
    /// Whether this is the data port
    #[must_use]
    pub fn is_data(self) -> bool {
        matches!(self, Self::Data)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control => write!(f, "control"),
            Self::Data => write!(f, "data"),
        }
    }
}

/// Outbound datagram transport
///
/// Implementations must not block; a failed send is logged by the engine
/// and never retried.
pub trait DatagramSender {
    /// Transmit `bytes` to `destination` from the socket bound to `channel`
    ///
    /// # Errors
    ///
    /// Returns the transport's I/O error.
    fn send_datagram(
        &mut self,
        channel: Channel,
        destination: SocketAddr,
        bytes: &[u8],
    ) -> Result<usize>;
}

impl<F> DatagramSender for F
where
    F: FnMut(Channel, SocketAddr, &[u8]) -> Result<usize>,
{
    fn send_datagram(
        &mut self,
        channel: Channel,
        destination: SocketAddr,
        bytes: &[u8],
    ) -> Result<usize> {
        self(channel, destination, bytes)
    }
}

/// One MIDI command decoded from an RTP-MIDI payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedMidi<'a> {
    /// Session slot of the sending peer
    pub slot: usize,
    /// Sender's synchronization source id
    pub ssrc: u32,
    /// Packet timestamp plus the command's delta time
    pub timestamp: u32,
    /// Status byte (running status applied)
    pub status: u8,
    /// Data bytes
    pub data: &'a [u8],
    /// Bytes of the current SysEx already delivered in earlier callbacks
    pub continued_sysex_offset: usize,
}

/// Receiver of decoded MIDI commands
pub trait MidiEventSink {
    /// Called once per decoded command, in packet order
    fn on_midi_message(&mut self, message: &ReceivedMidi<'_>);
}

impl<F> MidiEventSink for F
where
    F: FnMut(&ReceivedMidi<'_>),
{
    fn on_midi_message(&mut self, message: &ReceivedMidi<'_>) {
        self(message);
    }
}
