//! Running-status MIDI byte stream parser
//!
//! Status bytes that are not followed by a data byte (RTP or BLE framing,
//! timestamps) are skipped. Every data byte pair is reported against the
//! last real status, so running status needs no special handling.

use tracing::{debug, trace};

use super::status::is_status;
use crate::net::{MidiEventSink, ReceivedMidi};

/// Note Off status nibble
pub const NOTE_OFF: u8 = 0x8;
/// Note On status nibble
pub const NOTE_ON: u8 = 0x9;
/// Polyphonic key pressure status nibble
pub const POLY_PRESSURE: u8 = 0xA;
/// Control Change status nibble
pub const CONTROL_CHANGE: u8 = 0xB;
/// Program Change status nibble
pub const PROGRAM_CHANGE: u8 = 0xC;
/// Channel pressure status nibble
pub const CHANNEL_PRESSURE: u8 = 0xD;
/// Pitch Bend status nibble
pub const PITCH_BEND: u8 = 0xE;

/// One decoded channel command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEvent {
    /// Channel 0-15
    pub channel: u8,
    /// Upper status nibble (`NOTE_ON`, `CONTROL_CHANGE`, ...)
    pub kind: u8,
    /// First data byte
    pub data1: u8,
    /// Second data byte, 0 for one-byte commands
    pub data2: u8,
}

/// Callbacks invoked by [`MidiParser`]
///
/// All methods have empty defaults. `on_event` sees every command that
/// passes the channel filter and dispatches to the typed callbacks.
pub trait MidiAction {
    /// Every decoded command
    fn on_event(&mut self, event: &ChannelEvent) {
        match event.kind {
            NOTE_ON => self.on_note_on(event.channel, event.data1, event.data2),
            NOTE_OFF => self.on_note_off(event.channel, event.data1, event.data2),
            CONTROL_CHANGE => self.on_control_change(event.channel, event.data1, event.data2),
            PITCH_BEND => self.on_pitch_bend(
                event.channel,
                u16::from(event.data1) | (u16::from(event.data2) << 7),
            ),
            _ => trace!(kind = event.kind, "Unhandled MIDI status"),
        }
    }

    /// Note On
    fn on_note_on(&mut self, _channel: u8, _note: u8, _velocity: u8) {}

    /// Note Off
    fn on_note_off(&mut self, _channel: u8, _note: u8, _velocity: u8) {}

    /// Control Change
    fn on_control_change(&mut self, _channel: u8, _controller: u8, _value: u8) {}

    /// Pitch Bend, 14-bit value with 0x2000 as center
    fn on_pitch_bend(&mut self, _channel: u8, _value: u16) {}
}

/// Byte stream parser feeding a [`MidiAction`]
#[derive(Debug)]
pub struct MidiParser<A> {
    action: A,
    filter_channel: Option<u8>,
}

impl<A: MidiAction> MidiParser<A> {
    /// Create a parser that reports every channel
    pub fn new(action: A) -> Self {
        Self {
            action,
            filter_channel: None,
        }
    }

    /// Only report commands for `channel` (`None` reports all)
    #[must_use]
    pub fn with_filter_channel(mut self, channel: Option<u8>) -> Self {
        self.filter_channel = channel.map(|c| c & 0x0F);
        self
    }

    /// Change the receive channel filter
    pub fn set_filter_channel(&mut self, channel: Option<u8>) {
        self.filter_channel = channel.map(|c| c & 0x0F);
    }

    /// Current receive channel filter
    #[must_use]
    pub fn filter_channel(&self) -> Option<u8> {
        self.filter_channel
    }

    /// Access the callback target
    pub fn action(&self) -> &A {
        &self.action
    }

    /// Mutable access to the callback target
    pub fn action_mut(&mut self) -> &mut A {
        &mut self.action
    }

    /// Consume the parser, returning the callback target
    pub fn into_action(self) -> A {
        self.action
    }

    /// Parse one buffer
    ///
    /// Parser state does not carry over between calls.
    pub fn parse(&mut self, msg: &[u8]) {
        trace!(len = msg.len(), "parse");

        let mut pos = 0;
        let mut kind = 0u8;
        let mut channel = 0u8;

        while pos < msg.len() {
            while pos < msg.len() && is_status(msg[pos]) {
                if msg.get(pos + 1).is_some_and(|&b| !is_status(b)) {
                    kind = msg[pos] >> 4;
                    channel = msg[pos] & 0x0F;
                }
                pos += 1;
            }

            if let Some(&data1) = msg.get(pos) {
                let data2 = match msg.get(pos + 1) {
                    Some(&b) if !is_status(b) => {
                        pos += 1;
                        b
                    }
                    _ => 0,
                };
                self.dispatch(ChannelEvent {
                    channel,
                    kind,
                    data1,
                    data2,
                });
            }
            pos += 1;
        }
    }

    fn dispatch(&mut self, event: ChannelEvent) {
        if self.filter_channel.is_some_and(|c| c != event.channel) {
            return;
        }
        debug!(
            channel = event.channel,
            kind = event.kind,
            data1 = event.data1,
            data2 = event.data2,
            "MIDI command"
        );
        self.action.on_event(&event);
    }
}

/// Event sink that runs every decoded RTP-MIDI command through a
/// [`MidiParser`]
///
/// SysEx fragments are not channel commands and are skipped.
#[derive(Debug)]
pub struct ParserSink<A> {
    parser: MidiParser<A>,
}

impl<A: MidiAction> ParserSink<A> {
    /// Wrap a parser
    pub fn new(parser: MidiParser<A>) -> Self {
        Self { parser }
    }

    /// Access the wrapped parser
    pub fn parser(&self) -> &MidiParser<A> {
        &self.parser
    }

    /// Mutable access to the wrapped parser
    pub fn parser_mut(&mut self) -> &mut MidiParser<A> {
        &mut self.parser
    }
}

impl<A: MidiAction> MidiEventSink for ParserSink<A> {
    fn on_midi_message(&mut self, message: &ReceivedMidi<'_>) {
        if message.status >= 0xF0 {
            return;
        }
        let mut buf = [0u8; 3];
        buf[0] = message.status;
        let len = message.data.len().min(2);
        buf[1..=len].copy_from_slice(&message.data[..len]);
        self.parser.parse(&buf[..=len]);
    }
}
