use proptest::prelude::*;

use super::*;
use crate::protocol::applemidi::ControlCommand;

proptest! {
    #[test]
    fn test_section_decode_any_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
        // Should not panic, return either Ok or Err
        let mut offset = 0;
        let _ = decode_command_section(&bytes, 0, &mut offset, |_| {});
    }

    #[test]
    fn test_header_decode_any_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..32)) {
        let _ = RtpMidiHeader::decode(&bytes);
    }

    #[test]
    fn test_control_decode_any_bytes(tail in proptest::collection::vec(any::<u8>(), 0..80)) {
        let mut bytes = vec![0xFF, 0xFF];
        bytes.extend(tail);
        let _ = ControlCommand::decode(&bytes);
    }

    #[test]
    fn test_header_encode_decode_roundtrip(
        sequence in any::<u16>(),
        timestamp in any::<u32>(),
        ssrc in any::<u32>(),
    ) {
        let header = RtpMidiHeader::new(sequence, timestamp, ssrc);
        let decoded = RtpMidiHeader::decode(&header.encode()).expect("Decode failed");
        prop_assert_eq!(decoded, header);
    }

    #[test]
    fn test_channel_messages_survive_section(
        notes in proptest::collection::vec((0x80u8..0xF0, 0u8..0x80, 0u8..0x80), 1..40),
    ) {
        let mut list = Vec::new();
        for (i, (status, d1, d2)) in notes.iter().enumerate() {
            if i > 0 {
                list.push(0x00);
            }
            list.push(*status);
            list.push(*d1);
            if crate::midi::status::expected_data_bytes(*status) == 2 {
                list.push(*d2);
            }
        }
        let mut section = long_header(list.len()).to_vec();
        section.extend_from_slice(&list);

        let mut decoded = Vec::new();
        let mut offset = 0;
        let count = decode_command_section(&section, 0, &mut offset, |cmd| {
            decoded.push((cmd.status, cmd.data.to_vec()));
        }).expect("Decode failed");

        prop_assert_eq!(count, notes.len());
        for ((status, d1, d2), (got_status, got_data)) in notes.iter().zip(decoded) {
            prop_assert_eq!(*status, got_status);
            prop_assert_eq!(got_data[0], *d1);
            if got_data.len() == 2 {
                prop_assert_eq!(got_data[1], *d2);
            }
        }
    }
}
