use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use applemidi::protocol::applemidi::{ControlCommand, SessionExchange};
use applemidi::protocol::rtp_midi::{RtpMidiHeader, decode_command_section, encode_packet};
use applemidi::testing::{ManualClock, RecordingSender, RecordingSink};
use applemidi::{
    AppleMidiSession, Channel, ChannelMessage, MidiAction, MidiParser, ParserSink, SessionConfig,
};

type Engine = AppleMidiSession<RecordingSender, RecordingSink, ManualClock>;

const HOST: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 7, 1));
const DEVICE: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 7, 2));
const HOST_SSRC: u32 = 0x0101_0101;
const DEVICE_SSRC: u32 = 0x0202_0202;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
struct NoteLog {
    notes: Vec<(u8, u8, u8)>,
    bends: Vec<(u8, u16)>,
}

impl MidiAction for NoteLog {
    fn on_note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.notes.push((channel, note, velocity));
    }

    fn on_pitch_bend(&mut self, channel: u8, value: u16) {
        self.bends.push((channel, value));
    }
}

fn engine(name: &str, ssrc: u32, clock: &ManualClock) -> Engine {
    let config = SessionConfig::builder()
        .local_name(name)
        .local_ssrc(ssrc)
        .max_peers(2)
        .build();
    AppleMidiSession::with_clock(config, RecordingSender::new(), RecordingSink::new(), clock.clone())
}

fn port(channel: Channel) -> u16 {
    match channel {
        Channel::Control => 5004,
        Channel::Data => 5005,
    }
}

/// Move every datagram `from` has queued into `to`
fn pump(from: &mut Engine, from_ip: IpAddr, to: &mut Engine) -> usize {
    let datagrams = from.sender_mut().drain();
    let count = datagrams.len();
    for datagram in datagrams {
        let channel = if datagram.destination.port() == 5004 {
            Channel::Control
        } else {
            Channel::Data
        };
        let source = SocketAddr::new(from_ip, port(datagram.channel));
        let _ = to.handle_datagram(source, &datagram.bytes, channel);
    }
    count
}

/// Host invites the device and both sides settle into a session on slot 1
fn linked(clock: &ManualClock) -> (Engine, Engine) {
    let mut host = engine("host", HOST_SSRC, clock);
    let mut device = engine("device", DEVICE_SSRC, clock);

    host.start_session(1, DEVICE, 5004).unwrap();
    for _ in 0..8 {
        if pump(&mut host, HOST, &mut device) + pump(&mut device, DEVICE, &mut host) == 0 {
            break;
        }
    }
    assert!(host.peer_info(1).unwrap().state.is_connected());
    (host, device)
}

#[test]
fn test_command_section_feeds_parser() {
    let mut offset = 0;
    let mut parser = MidiParser::new(NoteLog::default());

    decode_command_section(&[0x07, 0x90, 0x3C, 0x64], 0, &mut offset, |command| {
        let mut bytes = vec![command.status];
        bytes.extend_from_slice(command.data);
        parser.parse(&bytes);
    })
    .unwrap();

    assert_eq!(parser.action().notes, vec![(0, 60, 100)]);
}

#[test]
fn test_engine_with_parser_sink() {
    init_tracing();
    let clock = ManualClock::new(50_000);
    let config = SessionConfig::builder()
        .local_name("parser")
        .local_ssrc(HOST_SSRC)
        .build();
    let mut session = AppleMidiSession::with_clock(
        config,
        RecordingSender::new(),
        ParserSink::new(MidiParser::new(NoteLog::default())),
        clock,
    );
    let invitation = ControlCommand::Invitation(SessionExchange::new(3, DEVICE_SSRC, Some("device")));
    session
        .handle_datagram(SocketAddr::new(DEVICE, 5004), &invitation.encode(), Channel::Control)
        .unwrap();
    session
        .handle_datagram(SocketAddr::new(DEVICE, 5005), &invitation.encode(), Channel::Data)
        .unwrap();

    // Note on, running-status note on, pitch bend on channel 5
    let commands = [0x91, 64, 90, 0x00, 67, 91, 0x00, 0xE5, 0x00, 0x40];
    let packet = encode_packet(&RtpMidiHeader::new(1, 0, DEVICE_SSRC), &commands);
    session
        .handle_datagram(SocketAddr::new(DEVICE, 5005), &packet, Channel::Data)
        .unwrap();

    let log = session.sink().parser().action();
    assert_eq!(log.notes, vec![(1, 64, 90), (1, 67, 91)]);
    assert_eq!(log.bends, vec![(5, 0x2000)]);
}

#[test]
fn test_three_note_ons_share_one_datagram() {
    let clock = ManualClock::new(10_000);
    let (mut host, mut device) = linked(&clock);

    for note in [60, 64, 67] {
        host.send(1, &ChannelMessage::note_on(0, note, 100)).unwrap();
    }
    assert!(host.sender().sent().is_empty());
    host.flush(1).unwrap();

    let sent = host.sender().sent();
    assert_eq!(sent.len(), 1);
    let header = RtpMidiHeader::decode(&sent[0].bytes).unwrap();
    assert_eq!(header.ssrc, HOST_SSRC);
    // 9 command bytes plus two zero delta times
    assert_eq!(&sent[0].bytes[12..14], &[0x80, 11]);

    pump(&mut host, HOST, &mut device);
    let notes: Vec<u8> = device.sink().received().iter().map(|m| m.data[0]).collect();
    assert_eq!(notes, vec![60, 64, 67]);
    assert!(device.sink().received().iter().all(|m| m.status == 0x90));
}

#[test]
fn test_sysex_reassembles_across_datagrams() {
    let clock = ManualClock::new(10_000);
    let (mut host, mut device) = linked(&clock);

    let payload: Vec<u8> = (0..998u16).map(|i| (i % 0x80) as u8).collect();
    let mut sysex = vec![0xF0];
    sysex.extend_from_slice(&payload);
    sysex.push(0xF7);

    host.send_message(1, &sysex).unwrap();
    let datagrams = host.sender().sent().len();
    assert!(datagrams > 1);
    let sequences: Vec<u16> = host
        .sender()
        .sent()
        .iter()
        .map(|d| RtpMidiHeader::decode(&d.bytes).unwrap().sequence)
        .collect();
    assert_eq!(sequences, (0..datagrams as u16).collect::<Vec<_>>());

    pump(&mut host, HOST, &mut device);

    assert_eq!(device.sink().sysex_payload(), payload);
    let mut delivered = 0;
    for fragment in device.sink().received().iter().filter(|m| m.status == 0xF0) {
        assert_eq!(fragment.continued_sysex_offset, delivered);
        delivered += fragment.data.len();
    }
    assert_eq!(delivered, payload.len());
    assert_eq!(device.peer_info(1).unwrap().stats.packets_lost.get(), 0);
}

#[test]
fn test_sequence_wrap_is_not_loss() {
    let clock = ManualClock::new(10_000);
    let (_, mut device) = linked(&clock);
    let source = SocketAddr::new(HOST, 5005);

    for sequence in [0xFFFE, 0xFFFF, 0x0000, 0x0001] {
        let packet = encode_packet(&RtpMidiHeader::new(sequence, 0, HOST_SSRC), &[0xF8]);
        device.handle_datagram(source, &packet, Channel::Data).unwrap();
    }

    let peer = device.peer_info(1).unwrap();
    assert_eq!(peer.stats.packets_lost.get(), 0);
    assert_eq!(peer.stats.packets_received.get(), 4);

    let packet = encode_packet(&RtpMidiHeader::new(0x0005, 0, HOST_SSRC), &[0xF8]);
    device.handle_datagram(source, &packet, Channel::Data).unwrap();
    assert_eq!(device.peer_info(1).unwrap().stats.packets_lost.get(), 1);
    assert_eq!(device.peer_info(0).unwrap().stats.packets_lost.get(), 1);
}

#[test]
fn test_feedback_round_trip_between_engines() {
    let clock = ManualClock::new(10_000);
    let (mut host, mut device) = linked(&clock);

    for note in [60, 62] {
        host.send(1, &ChannelMessage::note_on(0, note, 80)).unwrap();
        host.flush(1).unwrap();
    }
    pump(&mut host, HOST, &mut device);

    // The device reports the last sequence it saw
    let feedback = ControlCommand::ReceiverFeedback {
        ssrc: DEVICE_SSRC,
        sequence: device.peer_info(1).unwrap().sequence_number.unwrap(),
    };
    host.handle_datagram(SocketAddr::new(DEVICE, 5004), &feedback.encode(), Channel::Control)
        .unwrap();
    assert_eq!(host.peer_info(0).unwrap().stats.packets_lost.get(), 0);

    // Stale report: three packets behind
    for note in [64, 65] {
        host.send(1, &ChannelMessage::note_on(0, note, 80)).unwrap();
        host.flush(1).unwrap();
    }
    host.sender_mut().clear();
    host.handle_datagram(SocketAddr::new(DEVICE, 5004), &feedback.encode(), Channel::Control)
        .unwrap();
    assert_eq!(host.peer_info(1).unwrap().stats.packets_lost.get(), 1);

    let reply = host.sender().commands();
    assert!(matches!(
        reply.as_slice(),
        [ControlCommand::ReceiverFeedback { ssrc: HOST_SSRC, .. }]
    ));
}
