//! RTP-MIDI payload format (RFC 6295 subset used by `AppleMIDI`)

mod header;
mod section;

#[cfg(test)]
mod header_tests;
#[cfg(test)]
mod proptest_tests;

pub use header::{PAYLOAD_TYPE_MIDI, RTP_FIRST_OCTET, RtpMidiDecodeError, RtpMidiHeader};
pub use section::{
    LONG_HEADER_SIZE, MAX_SECTION_LEN, MidiCommand, SectionHeader, decode_command_section,
    encode_packet, long_header, long_header_len, read_delta_time,
};
