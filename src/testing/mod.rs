//! Test doubles for the engine's transport, sink and clock seams
//!
//! These let a session be driven entirely in memory: datagrams the engine
//! sends are recorded instead of transmitted, decoded MIDI is collected,
//! and time only moves when the test says so.


use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::net::{Channel, DatagramSender, MidiEventSink, ReceivedMidi};
use crate::protocol::applemidi::ControlCommand;
use crate::session::Clock;

/// One datagram handed to a [`RecordingSender`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    /// Local socket it left from
    pub channel: Channel,
    /// Destination endpoint
    pub destination: SocketAddr,
    /// Payload
    pub bytes: Vec<u8>,
}

impl SentDatagram {
    /// Decode the payload as a control command
    #[must_use]
    pub fn command(&self) -> Option<ControlCommand> {
        ControlCommand::decode(&self.bytes).ok()
    }
}

/// Sender that records every datagram
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Vec<SentDatagram>,
    fail: bool,
}

impl RecordingSender {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail with `ConnectionRefused`
    pub fn set_failing(&mut self, fail: bool) {
        self.fail = fail;
    }

    /// Datagrams sent so far
    #[must_use]
    pub fn sent(&self) -> &[SentDatagram] {
        &self.sent
    }

    /// Most recent datagram
    #[must_use]
    pub fn last(&self) -> Option<&SentDatagram> {
        self.sent.last()
    }

    /// Control commands sent so far, in order
    #[must_use]
    pub fn commands(&self) -> Vec<ControlCommand> {
        self.sent.iter().filter_map(SentDatagram::command).collect()
    }

    /// Take the recorded datagrams, leaving the log empty
    pub fn drain(&mut self) -> Vec<SentDatagram> {
        std::mem::take(&mut self.sent)
    }

    /// Forget everything recorded
    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl DatagramSender for RecordingSender {
    fn send_datagram(
        &mut self,
        channel: Channel,
        destination: SocketAddr,
        bytes: &[u8],
    ) -> io::Result<usize> {
        if self.fail {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "recording sender set to fail",
            ));
        }
        self.sent.push(SentDatagram {
            channel,
            destination,
            bytes: bytes.to_vec(),
        });
        Ok(bytes.len())
    }
}

/// Owned copy of a [`ReceivedMidi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMidi {
    /// Session slot of the sender
    pub slot: usize,
    /// Sender's synchronization source id
    pub ssrc: u32,
    /// Command timestamp
    pub timestamp: u32,
    /// Status byte
    pub status: u8,
    /// Data bytes
    pub data: Vec<u8>,
    /// SysEx bytes delivered before this fragment
    pub continued_sysex_offset: usize,
}

impl From<&ReceivedMidi<'_>> for RecordedMidi {
    fn from(midi: &ReceivedMidi<'_>) -> Self {
        Self {
            slot: midi.slot,
            ssrc: midi.ssrc,
            timestamp: midi.timestamp,
            status: midi.status,
            data: midi.data.to_vec(),
            continued_sysex_offset: midi.continued_sysex_offset,
        }
    }
}

/// Sink that keeps every decoded command
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Vec<RecordedMidi>,
}

impl RecordingSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received so far
    #[must_use]
    pub fn received(&self) -> &[RecordedMidi] {
        &self.received
    }

    /// Take the received commands
    pub fn drain(&mut self) -> Vec<RecordedMidi> {
        std::mem::take(&mut self.received)
    }

    /// Concatenate SysEx fragments back into one message
    ///
    /// Only the payload between the outer `F0` and `F7` is returned; the
    /// continuation markers are stripped.
    #[must_use]
    pub fn sysex_payload(&self) -> Vec<u8> {
        self.received
            .iter()
            .filter(|midi| midi.status == 0xF0)
            .flat_map(|midi| midi.data.iter().copied().filter(|&b| b < 0x80))
            .collect()
    }
}

impl MidiEventSink for RecordingSink {
    fn on_midi_message(&mut self, message: &ReceivedMidi<'_>) {
        self.received.push(message.into());
    }
}

/// Clock that only moves when told to
///
/// Clones share the same time, so a test can keep a handle after moving
/// the clock into an engine.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Start at `now` ticks
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now)),
        }
    }

    /// Jump to `now` ticks
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `ticks`
    pub fn advance(&self, ticks: u64) {
        self.now.fetch_add(ticks, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
