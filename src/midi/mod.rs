//! MIDI byte handling shared by the transports
//!
//! - [`status`]: status byte classification and data lengths
//! - [`MidiParser`]: running-status byte stream decoder
//! - [`ChannelMessage`]: outbound channel voice messages

mod message;
mod parser;
pub mod status;

#[cfg(test)]
mod message_tests;
#[cfg(test)]
mod parser_tests;

pub use message::{
    CC_ALL_NOTES_OFF, CC_LOCAL_CONTROL, CC_RESET_ALL_CONTROLLERS, ChannelMessage,
    PITCH_BEND_CENTER, frequency_to_note, note_to_frequency,
};
pub use parser::{
    CHANNEL_PRESSURE, CONTROL_CHANGE, ChannelEvent, MidiAction, MidiParser, NOTE_OFF, NOTE_ON,
    PITCH_BEND, POLY_PRESSURE, PROGRAM_CHANGE, ParserSink,
};
