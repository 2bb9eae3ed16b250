use super::parser::*;
use crate::net::{MidiEventSink, ReceivedMidi};

#[derive(Debug, Default)]
struct Recorder {
    events: Vec<ChannelEvent>,
    notes_on: Vec<(u8, u8, u8)>,
    notes_off: Vec<(u8, u8, u8)>,
    controls: Vec<(u8, u8, u8)>,
    bends: Vec<(u8, u16)>,
}

impl MidiAction for Recorder {
    fn on_event(&mut self, event: &ChannelEvent) {
        self.events.push(*event);
        match event.kind {
            NOTE_ON => self.on_note_on(event.channel, event.data1, event.data2),
            NOTE_OFF => self.on_note_off(event.channel, event.data1, event.data2),
            CONTROL_CHANGE => self.on_control_change(event.channel, event.data1, event.data2),
            PITCH_BEND => self.on_pitch_bend(
                event.channel,
                u16::from(event.data1) | (u16::from(event.data2) << 7),
            ),
            _ => {}
        }
    }

    fn on_note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.notes_on.push((channel, note, velocity));
    }

    fn on_note_off(&mut self, channel: u8, note: u8, velocity: u8) {
        self.notes_off.push((channel, note, velocity));
    }

    fn on_control_change(&mut self, channel: u8, controller: u8, value: u8) {
        self.controls.push((channel, controller, value));
    }

    fn on_pitch_bend(&mut self, channel: u8, value: u16) {
        self.bends.push((channel, value));
    }
}

#[derive(Default)]
struct NotesOnly {
    notes: Vec<u8>,
}

impl MidiAction for NotesOnly {
    fn on_note_on(&mut self, _channel: u8, note: u8, _velocity: u8) {
        self.notes.push(note);
    }
}

#[test]
fn test_note_on() {
    let mut parser = MidiParser::new(Recorder::default());
    parser.parse(&[0x90, 0x3C, 0x64]);

    assert_eq!(parser.action().notes_on, vec![(0, 60, 100)]);
}

#[test]
fn test_running_status() {
    let mut parser = MidiParser::new(Recorder::default());
    parser.parse(&[0x91, 0x3C, 0x64, 0x3E, 0x50]);

    assert_eq!(parser.action().notes_on, vec![(1, 60, 100), (1, 62, 80)]);
}

#[test]
fn test_skips_framing_bytes() {
    // BLE-MIDI: header and timestamp bytes have the top bit set
    let mut parser = MidiParser::new(Recorder::default());
    parser.parse(&[0x80, 0x80, 0x85, 0x3C, 0x00]);

    assert_eq!(parser.action().notes_off, vec![(5, 60, 0)]);
}

#[test]
fn test_single_data_byte_command() {
    let mut parser = MidiParser::new(Recorder::default());
    parser.parse(&[0xC2, 0x07]);

    let events = &parser.action().events;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, PROGRAM_CHANGE);
    assert_eq!(events[0].data1, 7);
    assert_eq!(events[0].data2, 0);
}

#[test]
fn test_control_change_and_pitch_bend() {
    let mut parser = MidiParser::new(Recorder::default());
    parser.parse(&[0xB0, 0x07, 0x7F, 0xE3, 0x00, 0x40]);

    assert_eq!(parser.action().controls, vec![(0, 7, 127)]);
    assert_eq!(parser.action().bends, vec![(3, 0x2000)]);
}

#[test]
fn test_channel_filter() {
    let mut parser = MidiParser::new(Recorder::default()).with_filter_channel(Some(2));
    parser.parse(&[0x90, 0x3C, 0x64, 0x92, 0x40, 0x64]);

    assert_eq!(parser.filter_channel(), Some(2));
    assert_eq!(parser.action().notes_on, vec![(2, 64, 100)]);

    parser.set_filter_channel(None);
    parser.parse(&[0x90, 0x3C, 0x64]);
    assert_eq!(parser.action().notes_on.len(), 2);
}

#[test]
fn test_default_dispatch() {
    let mut parser = MidiParser::new(NotesOnly::default());
    parser.parse(&[0x90, 0x3C, 0x64, 0xB0, 0x07, 0x7F, 0x99, 0x24, 0x7F]);

    assert_eq!(parser.into_action().notes, vec![60, 36]);
}

#[test]
fn test_truncated_and_empty_input() {
    let mut parser = MidiParser::new(Recorder::default());
    parser.parse(&[]);
    parser.parse(&[0x90]);
    parser.parse(&[0xF8, 0xFA]);

    assert!(parser.action().events.is_empty());
}

#[test]
fn test_parser_sink_feeds_parser() {
    let mut sink = ParserSink::new(MidiParser::new(Recorder::default()));
    let data = [0x3C, 0x64];
    sink.on_midi_message(&ReceivedMidi {
        slot: 1,
        ssrc: 0x1234,
        timestamp: 0,
        status: 0x90,
        data: &data,
        continued_sysex_offset: 0,
    });

    assert_eq!(sink.parser().action().notes_on, vec![(0, 60, 100)]);
}

#[test]
fn test_parser_sink_skips_sysex() {
    let mut sink = ParserSink::new(MidiParser::new(Recorder::default()));
    let data = [0x7E, 0x7F, 0x06];
    sink.on_midi_message(&ReceivedMidi {
        slot: 1,
        ssrc: 0x1234,
        timestamp: 0,
        status: 0xF0,
        data: &data,
        continued_sysex_offset: 0,
    });

    assert!(sink.parser_mut().action_mut().events.is_empty());
}
