use super::message::*;

#[test]
fn test_note_messages() {
    assert_eq!(&ChannelMessage::note_on(0, 60, 100).encode()[..], &[0x90, 0x3C, 0x64]);
    assert_eq!(&ChannelMessage::note_off(15, 60, 0).encode()[..], &[0x8F, 0x3C, 0x00]);
}

#[test]
fn test_values_are_masked() {
    let message = ChannelMessage::note_on(0x13, 0xBC, 0xFF);
    assert_eq!(message.channel(), 3);
    assert_eq!(&message.encode()[..], &[0x93, 0x3C, 0x7F]);
}

#[test]
fn test_one_data_byte_messages() {
    let program = ChannelMessage::program_change(2, 5);
    assert_eq!(program.len(), 2);
    assert_eq!(&program.encode()[..], &[0xC2, 0x05]);

    let pressure = ChannelMessage::channel_pressure(1, 0x40);
    assert_eq!(&pressure.encode()[..], &[0xD1, 0x40]);
}

#[test]
fn test_poly_pressure() {
    let message = ChannelMessage::poly_pressure(4, 60, 33);
    assert_eq!(message.len(), 3);
    assert_eq!(&message.encode()[..], &[0xA4, 60, 33]);
}

#[test]
fn test_controller_shortcuts() {
    assert_eq!(&ChannelMessage::all_notes_off(0).encode()[..], &[0xB0, 120, 0]);
    assert_eq!(&ChannelMessage::reset_all_controllers(1).encode()[..], &[0xB1, 121, 0]);
    assert_eq!(&ChannelMessage::local_control(2, true).encode()[..], &[0xB2, 122, 127]);
    assert_eq!(&ChannelMessage::local_control(2, false).encode()[..], &[0xB2, 122, 0]);
}

#[test]
fn test_pitch_bend_is_lsb_first() {
    let center = ChannelMessage::pitch_bend(0, PITCH_BEND_CENTER);
    assert_eq!(&center.encode()[..], &[0xE0, 0x00, 0x40]);

    let max = ChannelMessage::pitch_bend(0, 0x3FFF);
    assert_eq!(&max.encode()[..], &[0xE0, 0x7F, 0x7F]);
}

#[test]
fn test_from_parts() {
    assert_eq!(
        ChannelMessage::from_parts(0x90, &[0x3C, 0x64]),
        Some(ChannelMessage::note_on(0, 60, 100))
    );
    assert_eq!(
        ChannelMessage::from_parts(0xE5, &[0x00, 0x40]),
        Some(ChannelMessage::pitch_bend(5, PITCH_BEND_CENTER))
    );
    assert_eq!(
        ChannelMessage::from_parts(0xC0, &[0x01]),
        Some(ChannelMessage::program_change(0, 1))
    );
    assert_eq!(ChannelMessage::from_parts(0x90, &[0x3C]), None);
    assert_eq!(ChannelMessage::from_parts(0xF0, &[0x01, 0x02]), None);
    assert_eq!(ChannelMessage::from_parts(0x90, &[]), None);
}

#[test]
fn test_note_frequency_conversion() {
    assert!((note_to_frequency(69) - 440.0).abs() < 0.001);
    assert!((note_to_frequency(81) - 880.0).abs() < 0.01);
    assert!((note_to_frequency(60) - 261.626).abs() < 0.01);

    assert_eq!(frequency_to_note(440.0), 69);
    assert_eq!(frequency_to_note(261.63), 60);
    for note in 0..=127u8 {
        assert_eq!(frequency_to_note(note_to_frequency(note)), note);
    }
}

#[test]
fn test_frequency_to_note_out_of_range() {
    assert_eq!(frequency_to_note(0.0), 0);
    assert_eq!(frequency_to_note(-5.0), 0);
    assert_eq!(frequency_to_note(f32::NAN), 0);
    assert_eq!(frequency_to_note(100_000.0), 127);
}
