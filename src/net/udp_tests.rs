use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use super::traits::{Channel, DatagramSender, MidiEventSink, ReceivedMidi};
use super::udp::*;
use crate::error::AppleMidiError;
use crate::midi::ChannelMessage;
use crate::protocol::applemidi::ControlCommand;
use crate::session::ConnectionState;
use crate::testing::RecordedMidi;
use crate::types::SessionConfig;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

struct ForwardingSink(mpsc::UnboundedSender<RecordedMidi>);

impl MidiEventSink for ForwardingSink {
    fn on_midi_message(&mut self, message: &ReceivedMidi<'_>) {
        let _ = self.0.send(message.into());
    }
}

async fn start_server(name: &str) -> (ServerHandle, mpsc::UnboundedReceiver<RecordedMidi>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let config = SessionConfig::builder().local_name(name).default_port(0).build();
    let (server, handle) = AppleMidiServer::bind_addr(config, ForwardingSink(tx), LOOPBACK)
        .await
        .unwrap();
    server.spawn();
    (handle, rx)
}

async fn wait_for_state(handle: &ServerHandle, slot: usize, state: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let info = handle.peer_info(slot).await.unwrap();
            if info.is_some_and(|peer| peer.state == state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session did not reach the expected state");
}

#[tokio::test]
async fn test_bind_pair_is_adjacent() {
    let (control, data) = bind_pair(LOOPBACK, 0).await.unwrap();

    let control_port = control.local_addr().unwrap().port();
    let data_port = data.local_addr().unwrap().port();
    assert_eq!(data_port, control_port + 1);
}

#[tokio::test]
async fn test_first_invitation_leaves_immediately() {
    let (handle, _rx) = start_server("eager").await;
    let remote = UdpSocket::bind(SocketAddr::new(LOOPBACK, 0)).await.unwrap();

    handle
        .start_session(1, remote.local_addr().unwrap())
        .await
        .unwrap();

    let mut buf = [0u8; 256];
    let (len, from) = tokio::time::timeout(Duration::from_secs(2), remote.recv_from(&mut buf))
        .await
        .expect("invitation was not sent")
        .unwrap();
    assert_eq!(from.port(), handle.control_port());
    assert!(matches!(
        ControlCommand::decode(&buf[..len]),
        Ok(ControlCommand::Invitation(_))
    ));

    let peer = handle.peer_info(1).await.unwrap().unwrap();
    assert_eq!(peer.stats.packets_sent.get(), 1);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_sender_delivers_without_backlog() {
    let (control, data) = bind_pair(LOOPBACK, 0).await.unwrap();
    control.writable().await.unwrap();
    data.writable().await.unwrap();
    let mut sender = UdpSender::new(Arc::new(control), Arc::new(data));
    let remote = UdpSocket::bind(SocketAddr::new(LOOPBACK, 0)).await.unwrap();
    let destination = remote.local_addr().unwrap();

    for byte in [1u8, 2, 3] {
        sender
            .send_datagram(Channel::Data, destination, &[byte])
            .unwrap();
    }
    assert_eq!(sender.retry(Channel::Data), 0);
    assert_eq!(sender.pending(Channel::Data), 0);
    assert_eq!(sender.pending(Channel::Control), 0);

    let mut received = Vec::new();
    let mut buf = [0u8; 16];
    for _ in 0..3 {
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), remote.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        received.extend_from_slice(&buf[..len]);
    }
    assert_eq!(received, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_handle_reports_ports() {
    let (handle, _rx) = start_server("ports").await;

    assert_ne!(handle.control_port(), 0);
    assert_eq!(handle.data_port(), handle.control_port() + 1);
    assert_ne!(handle.local_ssrc(), 0);
    assert!(handle.is_running());
    assert_eq!(handle.search_free_slot().await.unwrap(), Some(1));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_two_servers_connect_and_exchange_midi() {
    let (master, _master_rx) = start_server("master").await;
    let (responder, mut responder_rx) = start_server("responder").await;

    let target = SocketAddr::new(LOOPBACK, responder.control_port());
    master.start_session(1, target).await.unwrap();
    wait_for_state(&master, 1, ConnectionState::MasterConnected).await;

    let remote = master.peer_info(1).await.unwrap().unwrap();
    assert_eq!(remote.ssrc, responder.local_ssrc());
    assert_eq!(remote.name, "responder");

    let seen = responder.peer_info(1).await.unwrap().unwrap();
    assert_eq!(seen.ssrc, master.local_ssrc());
    assert_eq!(seen.data_port, master.data_port());

    master.send(1, &ChannelMessage::note_on(2, 64, 100)).await.unwrap();
    master.flush(1).await.unwrap();

    let midi = tokio::time::timeout(Duration::from_secs(5), responder_rx.recv())
        .await
        .expect("no MIDI received")
        .unwrap();
    assert_eq!(midi.slot, 1);
    assert_eq!(midi.ssrc, master.local_ssrc());
    assert_eq!(midi.status, 0x92);
    assert_eq!(midi.data, vec![64, 100]);

    master.terminate_session(1).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while responder.peer_info(1).await.unwrap().is_some() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("responder kept the session");

    master.shutdown().await;
    responder.shutdown().await;
}

#[tokio::test]
async fn test_requests_after_shutdown_fail() {
    let (handle, _rx) = start_server("closing").await;

    handle.shutdown().await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let err = handle.peer_info(0).await.unwrap_err();
    assert!(matches!(err, AppleMidiError::ServerClosed));
}

#[tokio::test]
async fn test_lifecycle_errors_cross_the_handle() {
    let (handle, _rx) = start_server("errors").await;

    let err = handle
        .start_session(0, SocketAddr::new(LOOPBACK, 5004))
        .await
        .unwrap_err();
    assert!(matches!(err, AppleMidiError::InvalidSlot { slot: 0 }));

    let err = handle.send_message(1, vec![0x90, 1, 1]).await.unwrap_err();
    assert!(matches!(err, AppleMidiError::SlotNotAllocated { slot: 1 }));

    handle.set_debug_level(3).await.unwrap();
    handle.shutdown().await;
}
