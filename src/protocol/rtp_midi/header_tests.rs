use super::*;

#[test]
fn test_header_encode() {
    let header = RtpMidiHeader::new(0x1234, 0xDEAD_BEEF, 0x0102_0304);
    let bytes = header.encode();

    assert_eq!(bytes[0], 0x80);
    assert_eq!(bytes[1], 0x61);
    assert_eq!(&bytes[2..4], &[0x12, 0x34]);
    assert_eq!(&bytes[4..8], &[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(&bytes[8..12], &[0x01, 0x02, 0x03, 0x04]);
}

#[test]
fn test_header_decode() {
    let raw = [0x80, 0x61, 0xFF, 0xFF, 0, 0, 0, 10, 0xCA, 0xFE, 0xBA, 0xBE, 0x03];
    let header = RtpMidiHeader::decode(&raw).unwrap();

    assert_eq!(header.sequence, 0xFFFF);
    assert_eq!(header.timestamp, 10);
    assert_eq!(header.ssrc, 0xCAFE_BABE);
}

#[test]
fn test_header_matches_ignores_marker() {
    assert!(RtpMidiHeader::matches(&[0x80, 0x61]));
    assert!(RtpMidiHeader::matches(&[0x80, 0xE1]));
    assert!(!RtpMidiHeader::matches(&[0x80, 0x60]));
    assert!(!RtpMidiHeader::matches(&[0xFF, 0xFF]));
    assert!(!RtpMidiHeader::matches(&[0x80]));
}

#[test]
fn test_header_rejects_csrc_padding_and_extension() {
    // CSRC count 1, extension bit, padding bit
    for first in [0x81, 0x90, 0xA0] {
        assert!(!RtpMidiHeader::matches(&[first, 0x61]));

        let mut raw = vec![first, 0x61, 0, 1, 0, 0, 0, 0, 0xCA, 0xFE, 0xBA, 0xBE];
        raw.extend_from_slice(&[0x90, 0x3C, 0x64, 0x00]);
        assert!(matches!(
            RtpMidiHeader::decode(&raw),
            Err(RtpMidiDecodeError::NotRtpMidi)
        ));
    }
}

#[test]
fn test_header_decode_too_short() {
    let raw = [0x80, 0x61, 0x00, 0x01, 0x00];
    assert!(matches!(
        RtpMidiHeader::decode(&raw),
        Err(RtpMidiDecodeError::Truncated(_))
    ));
}

#[test]
fn test_long_header_round_trip() {
    for len in [0usize, 1, 15, 16, 255, 256, 498, MAX_SECTION_LEN] {
        let header = long_header(len);
        assert_eq!(header[0] & 0x80, 0x80);
        assert_eq!(long_header_len(header), len);
    }
}
