//! MIDI status byte classification

/// Start of System Exclusive
pub const SYSEX_START: u8 = 0xF0;

/// End of System Exclusive
pub const SYSEX_END: u8 = 0xF7;

/// Data bytes following a channel voice status, indexed by `(status >> 4) & 0x07`
const CHANNEL_DATA_BYTES: [u8; 8] = [
    2, // Note Off
    2, // Note On
    2, // Poly Pressure
    2, // Control Change
    1, // Program Change
    1, // Channel Pressure
    2, // Pitch Bend
    0, // System (see SYSTEM_DATA_BYTES)
];

/// Data bytes following a system status, indexed by `status & 0x0F`
const SYSTEM_DATA_BYTES: [u8; 16] = [
    1, // SysEx start (variable length)
    1, // MTC quarter frame
    2, // Song position
    1, // Song select
    0, // Reserved
    0, // Reserved
    0, // Tune request
    0, // SysEx end
    0, // Clock
    0, // Tick
    0, // Start
    0, // Continue
    0, // Stop
    0, // Reserved
    0, // Active sensing
    0, // Reset
];

/// Whether `byte` is a status byte
#[must_use]
pub fn is_status(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// Whether `status` opens a variable-length SysEx run
#[must_use]
pub fn is_sysex(status: u8) -> bool {
    status == SYSEX_START
}

/// Number of data bytes expected after `status`
#[must_use]
pub fn expected_data_bytes(status: u8) -> usize {
    let common = CHANNEL_DATA_BYTES[usize::from((status >> 4) & 0x07)];
    if common != 0 {
        return usize::from(common);
    }
    usize::from(SYSTEM_DATA_BYTES[usize::from(status & 0x0F)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_voice_lengths() {
        assert_eq!(expected_data_bytes(0x80), 2);
        assert_eq!(expected_data_bytes(0x9F), 2);
        assert_eq!(expected_data_bytes(0xA3), 2);
        assert_eq!(expected_data_bytes(0xB0), 2);
        assert_eq!(expected_data_bytes(0xC5), 1);
        assert_eq!(expected_data_bytes(0xD0), 1);
        assert_eq!(expected_data_bytes(0xE7), 2);
    }

    #[test]
    fn test_system_lengths() {
        assert_eq!(expected_data_bytes(0xF1), 1);
        assert_eq!(expected_data_bytes(0xF2), 2);
        assert_eq!(expected_data_bytes(0xF3), 1);
        assert_eq!(expected_data_bytes(0xF6), 0);
        assert_eq!(expected_data_bytes(0xF8), 0);
        assert_eq!(expected_data_bytes(0xFF), 0);
    }

    #[test]
    fn test_classification() {
        assert!(is_status(0x90));
        assert!(!is_status(0x3C));
        assert!(is_sysex(SYSEX_START));
        assert!(!is_sysex(SYSEX_END));
    }
}
