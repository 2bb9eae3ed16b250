//! Outbound channel messages

use bytes::{BufMut, Bytes, BytesMut};

use super::parser::{
    CHANNEL_PRESSURE, CONTROL_CHANGE, NOTE_OFF, NOTE_ON, PITCH_BEND, POLY_PRESSURE, PROGRAM_CHANGE,
};

/// Controller number of All Notes Off
pub const CC_ALL_NOTES_OFF: u8 = 120;
/// Controller number of Reset All Controllers
pub const CC_RESET_ALL_CONTROLLERS: u8 = 121;
/// Controller number of Local Control
pub const CC_LOCAL_CONTROL: u8 = 122;

/// Center position of the pitch wheel
pub const PITCH_BEND_CENTER: u16 = 0x2000;

/// A MIDI channel voice message
///
/// Channels are masked to 4 bits and data values to 7 bits on encode.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    PolyPressure { channel: u8, note: u8, pressure: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    /// 14-bit value, `PITCH_BEND_CENTER` is neutral
    PitchBend { channel: u8, value: u16 },
}

impl ChannelMessage {
    /// Note On
    #[must_use]
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::NoteOn {
            channel,
            note,
            velocity,
        }
    }

    /// Note Off
    #[must_use]
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::NoteOff {
            channel,
            note,
            velocity,
        }
    }

    /// Control Change
    #[must_use]
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::ControlChange {
            channel,
            controller,
            value,
        }
    }

    /// Program Change
    #[must_use]
    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::ProgramChange { channel, program }
    }

    /// Polyphonic key pressure
    #[must_use]
    pub fn poly_pressure(channel: u8, note: u8, pressure: u8) -> Self {
        Self::PolyPressure {
            channel,
            note,
            pressure,
        }
    }

    /// Channel pressure
    #[must_use]
    pub fn channel_pressure(channel: u8, pressure: u8) -> Self {
        Self::ChannelPressure { channel, pressure }
    }

    /// Pitch Bend
    #[must_use]
    pub fn pitch_bend(channel: u8, value: u16) -> Self {
        Self::PitchBend { channel, value }
    }

    /// All Notes Off (CC 120)
    #[must_use]
    pub fn all_notes_off(channel: u8) -> Self {
        Self::control_change(channel, CC_ALL_NOTES_OFF, 0)
    }

    /// Reset All Controllers (CC 121)
    #[must_use]
    pub fn reset_all_controllers(channel: u8) -> Self {
        Self::control_change(channel, CC_RESET_ALL_CONTROLLERS, 0)
    }

    /// Local Control on/off (CC 122)
    #[must_use]
    pub fn local_control(channel: u8, active: bool) -> Self {
        Self::control_change(channel, CC_LOCAL_CONTROL, if active { 127 } else { 0 })
    }

    /// Channel 0-15
    #[must_use]
    pub fn channel(&self) -> u8 {
        let channel = match *self {
            Self::NoteOff { channel, .. }
            | Self::NoteOn { channel, .. }
            | Self::PolyPressure { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::ProgramChange { channel, .. }
            | Self::ChannelPressure { channel, .. }
            | Self::PitchBend { channel, .. } => channel,
        };
        channel & 0x0F
    }

    /// Complete status byte
    #[must_use]
    pub fn status(&self) -> u8 {
        let kind = match self {
            Self::NoteOff { .. } => NOTE_OFF,
            Self::NoteOn { .. } => NOTE_ON,
            Self::PolyPressure { .. } => POLY_PRESSURE,
            Self::ControlChange { .. } => CONTROL_CHANGE,
            Self::ProgramChange { .. } => PROGRAM_CHANGE,
            Self::ChannelPressure { .. } => CHANNEL_PRESSURE,
            Self::PitchBend { .. } => PITCH_BEND,
        };
        (kind << 4) | self.channel()
    }

    /// Encoded length including status
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::ProgramChange { .. } | Self::ChannelPressure { .. } => 2,
            _ => 3,
        }
    }

    /// Always false; every message carries a status byte
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Append the encoded message to `buf`
    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.status());
        match *self {
            Self::NoteOff { note, velocity, .. } | Self::NoteOn { note, velocity, .. } => {
                buf.put_u8(note & 0x7F);
                buf.put_u8(velocity & 0x7F);
            }
            Self::PolyPressure { note, pressure, .. } => {
                buf.put_u8(note & 0x7F);
                buf.put_u8(pressure & 0x7F);
            }
            Self::ControlChange {
                controller, value, ..
            } => {
                buf.put_u8(controller & 0x7F);
                buf.put_u8(value & 0x7F);
            }
            Self::ProgramChange { program: value, .. }
            | Self::ChannelPressure {
                pressure: value, ..
            } => {
                buf.put_u8(value & 0x7F);
            }
            #[allow(clippy::cast_possible_truncation)]
            Self::PitchBend { value, .. } => {
                buf.put_u8((value & 0x7F) as u8);
                buf.put_u8(((value >> 7) & 0x7F) as u8);
            }
        }
    }

    /// Encode to a standalone buffer
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(3);
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Rebuild a message from a status byte and its data bytes
    ///
    /// Returns `None` for system messages or missing data bytes.
    #[must_use]
    pub fn from_parts(status: u8, data: &[u8]) -> Option<Self> {
        let channel = status & 0x0F;
        let first = *data.first()?;
        let second = data.get(1).copied();

        let message = match status >> 4 {
            NOTE_OFF => Self::note_off(channel, first, second?),
            NOTE_ON => Self::note_on(channel, first, second?),
            POLY_PRESSURE => Self::poly_pressure(channel, first, second?),
            CONTROL_CHANGE => Self::control_change(channel, first, second?),
            PROGRAM_CHANGE => Self::program_change(channel, first),
            CHANNEL_PRESSURE => Self::channel_pressure(channel, first),
            PITCH_BEND => Self::pitch_bend(channel, u16::from(first) | (u16::from(second?) << 7)),
            _ => return None,
        };
        Some(message)
    }
}

/// Equal-tempered frequency of a MIDI note, A4 (69) = 440 Hz
#[must_use]
pub fn note_to_frequency(note: u8) -> f32 {
    440.0 * 2f32.powf((f32::from(note) - 69.0) / 12.0)
}

/// Nearest MIDI note for a frequency, clamped to 0-127
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn frequency_to_note(frequency: f32) -> u8 {
    if frequency.is_nan() || frequency <= 0.0 {
        return 0;
    }
    let note = 12.0 * (frequency / 440.0).log2() + 69.0;
    note.round().clamp(0.0, 127.0) as u8
}
