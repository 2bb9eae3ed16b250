//! `AppleMIDI` session engine
//!
//! Owns the peer table and drives every session from three entry points:
//! [`AppleMidiSession::handle_datagram`] for inbound traffic,
//! [`AppleMidiSession::tick`] for the flush and clock sync timers, and the
//! lifecycle calls (`start_session`, `terminate_session`, `send_message`).
//! All of them run to completion without blocking; callers sharing an
//! engine between threads must serialize access themselves.
//!
//! ```
//! use std::net::{IpAddr, Ipv4Addr, SocketAddr};
//!
//! use applemidi::{AppleMidiSession, Channel, ReceivedMidi, SessionConfig};
//!
//! fn send(_channel: Channel, _to: SocketAddr, bytes: &[u8]) -> std::io::Result<usize> {
//!     Ok(bytes.len())
//! }
//!
//! fn on_midi(midi: &ReceivedMidi<'_>) {
//!     println!("slot {}: {:02x} {:?}", midi.slot, midi.status, midi.data);
//! }
//!
//! let mut session = AppleMidiSession::new(SessionConfig::default(), send, on_midi);
//! session.start_session(1, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), 5004)?;
//! session.tick();
//! # Ok::<(), applemidi::AppleMidiError>(())
//! ```

use std::net::{IpAddr, SocketAddr};

use tracing::{debug, info, trace, warn};

use super::clock::{Clock, SystemClock};
use super::outbuffer::split_sysex;
use super::peer::{Peer, PeerView};
use super::sequence::SequenceCheck;
use super::state::ConnectionState;
use super::sync::{self, SyncOutcome, SyncPolicy};
use super::table::PeerTable;
use crate::error::{AppleMidiError, Result};
use crate::midi::ChannelMessage;
use crate::net::{Channel, DatagramSender, MidiEventSink, ReceivedMidi};
use crate::protocol::applemidi::{
    CommandCode, ControlCommand, SessionExchange, Synchronization, bounded_name,
};
use crate::protocol::rtp_midi::{RtpMidiHeader, decode_command_section, encode_packet};
use crate::types::{DebugLevel, SessionConfig};

/// `AppleMIDI` session and transport engine
pub struct AppleMidiSession<S, E, C = SystemClock> {
    config: SessionConfig,
    table: PeerTable,
    sender: S,
    sink: E,
    clock: C,
    debug_level: DebugLevel,
    flush_interval: u32,
    sync_policy: SyncPolicy,
}

impl<S: DatagramSender, E: MidiEventSink> AppleMidiSession<S, E, SystemClock> {
    /// Create an engine timed by the system clock
    pub fn new(config: SessionConfig, sender: S, sink: E) -> Self {
        Self::with_clock(config, sender, sink, SystemClock)
    }
}

impl<S: DatagramSender, E: MidiEventSink, C: Clock> AppleMidiSession<S, E, C> {
    /// Create an engine with an explicit time source
    pub fn with_clock(config: SessionConfig, sender: S, sink: E, clock: C) -> Self {
        let local_ssrc = config
            .local_ssrc
            .filter(|&ssrc| ssrc != 0)
            .unwrap_or_else(random_nonzero);
        let table = PeerTable::new(
            config.max_peers.max(SessionConfig::MIN_PEERS),
            config.outbuffer_size,
            local_ssrc,
            &config.local_name,
        );
        let debug_level = config.debug_level;

        if debug_level.logs(DebugLevel::Events) {
            info!(
                ssrc = local_ssrc,
                name = %table.local().name,
                slots = table.capacity(),
                "AppleMIDI session engine initialized"
            );
        }

        Self {
            flush_interval: SessionConfig::ticks(config.flush_interval),
            sync_policy: SyncPolicy::from_config(&config),
            config,
            table,
            sender,
            sink,
            clock,
            debug_level,
        }
    }

    // ===== Accessors =====

    /// Configuration the engine was built with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Local synchronization source id
    pub fn local_ssrc(&self) -> u32 {
        self.table.local().ssrc
    }

    /// Name announced in invitations
    pub fn local_name(&self) -> &str {
        &self.table.local().name
    }

    /// Number of slots including the local identity
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Current diagnostic verbosity
    pub fn debug_level(&self) -> DebugLevel {
        self.debug_level
    }

    /// Change diagnostic verbosity; values above 3 mean `Verbose`
    pub fn set_debug_level(&mut self, level: u8) {
        self.debug_level = DebugLevel::from_level(level);
    }

    /// Snapshot of an allocated slot (slot 0 is always allocated)
    pub fn peer_info(&self, slot: usize) -> Option<PeerView> {
        self.table
            .get(slot)
            .filter(|peer| !peer.is_free())
            .map(Peer::view)
    }

    /// First free remote slot
    pub fn search_free_slot(&self) -> Option<usize> {
        self.table.search_free_slot()
    }

    /// Outbound transport
    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Mutable outbound transport
    pub fn sender_mut(&mut self) -> &mut S {
        &mut self.sender
    }

    /// MIDI event sink
    pub fn sink(&self) -> &E {
        &self.sink
    }

    /// Mutable MIDI event sink
    pub fn sink_mut(&mut self) -> &mut E {
        &mut self.sink
    }

    /// Time source
    pub fn clock(&self) -> &C {
        &self.clock
    }

    // ===== Lifecycle =====

    /// Invite a peer into `slot` (master role)
    ///
    /// The data port is `control_port + 1`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlot` for slot 0 or out of range, `SlotBusy` if the
    /// slot holds a session or a pending invitation.
    pub fn start_session(&mut self, slot: usize, address: IpAddr, control_port: u16) -> Result<()> {
        self.check_remote_slot(slot)?;
        let local_ssrc = self.local_ssrc();
        let local_name = self.table.local().name.clone();
        let events = self.debug_level.logs(DebugLevel::Events);

        let peer = self.peer_mut(slot)?;
        if !peer.is_free() {
            if events {
                warn!(slot, "Cannot invite peer, slot already allocated");
            }
            return Err(AppleMidiError::SlotBusy { slot });
        }

        let token = random_nonzero();
        peer.reset();
        peer.address = Some(address);
        peer.control_port = control_port;
        peer.data_port = control_port.wrapping_add(1);
        peer.token = token;
        peer.state = ConnectionState::MasterConnectingControl;

        let destination = SocketAddr::new(address, control_port);
        if events {
            info!(slot, peer = %destination, token, "Inviting peer");
        }
        let invitation =
            ControlCommand::Invitation(SessionExchange::new(token, local_ssrc, Some(&local_name)));
        self.send_command(Channel::Control, destination, &invitation);
        Ok(())
    }

    /// End the session in `slot`
    ///
    /// Sends `EndSession` best-effort and frees the slot immediately.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlot` for slot 0 or out of range, `SlotNotAllocated`
    /// if the slot is free.
    pub fn terminate_session(&mut self, slot: usize) -> Result<()> {
        self.check_remote_slot(slot)?;
        let peer = self.peer_mut(slot)?;
        if peer.is_free() {
            if self.debug_level.logs(DebugLevel::Events) {
                warn!(slot, "No session to terminate");
            }
            return Err(AppleMidiError::SlotNotAllocated { slot });
        }

        if self.debug_level.logs(DebugLevel::Events) {
            let peer = self.peer_mut(slot)?;
            info!(slot, peer = ?peer.control_addr(), ssrc = peer.ssrc, "Terminating session");
        }
        self.end_session(slot);
        Ok(())
    }

    /// Drive the flush and clock sync timers; call about once per millisecond
    pub fn tick(&mut self) {
        let timestamp = self.clock.now();
        let now = self.clock.now_u32();
        let local_ssrc = self.local_ssrc();

        for slot in 0..self.table.capacity() {
            let flush_due = self
                .table
                .get(slot)
                .is_some_and(|peer| peer.outbuffer.flush_due(now, self.flush_interval));
            if flush_due {
                self.flush_slot(slot);
                if let Some(peer) = self.table.get_mut(slot) {
                    peer.outbuffer.mark_flushed(now);
                }
            }

            let Some(peer) = self.table.get_mut(slot) else {
                continue;
            };
            if !peer.state.is_connected() || !peer.sync.poll(now, &self.sync_policy) {
                continue;
            }
            let rounds = peer.sync.rounds();
            let Some(destination) = peer.data_addr() else {
                continue;
            };

            if self.debug_level.logs(DebugLevel::Verbose) {
                trace!(slot, rounds, peer = %destination, "Initiating clock sync");
            }
            let command = ControlCommand::Synchronization(sync::initiate(local_ssrc, timestamp));
            self.send_command(Channel::Data, destination, &command);
        }
    }

    /// Queue one MIDI message for `slot`
    ///
    /// Small messages are coalesced into the slot's output buffer until the
    /// next flush. Messages too large for one packet are split into SysEx
    /// fragments and sent immediately.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlot` for slot 0 or out of range, `SlotNotAllocated`
    /// if the slot is free.
    pub fn send_message(&mut self, slot: usize, bytes: &[u8]) -> Result<()> {
        self.check_remote_slot(slot)?;
        let peer = self.peer_mut(slot)?;
        if peer.is_free() {
            return Err(AppleMidiError::SlotNotAllocated { slot });
        }
        if bytes.is_empty() {
            return Ok(());
        }

        if bytes.len() >= peer.outbuffer.max_message_len() {
            let fragments = split_sysex(bytes, peer.outbuffer.max_fragment_len());
            if self.debug_level.logs(DebugLevel::Verbose) {
                trace!(
                    slot,
                    len = bytes.len(),
                    fragments = fragments.len(),
                    "Splitting oversized message"
                );
            }
            self.flush_slot(slot);
            for fragment in &fragments {
                let header = self.next_header();
                let packet = encode_packet(&header, fragment);
                self.send_packet(slot, &packet);
            }
            return Ok(());
        }

        if !peer.outbuffer.fits(bytes.len()) {
            self.flush_slot(slot);
        }
        if self.peer_mut(slot)?.outbuffer.is_empty() {
            let header = self.next_header();
            self.peer_mut(slot)?.outbuffer.start(&header);
        }
        self.peer_mut(slot)?.outbuffer.push(bytes);
        Ok(())
    }

    /// Queue a channel voice message for `slot`
    ///
    /// # Errors
    ///
    /// Same as [`send_message`](Self::send_message).
    pub fn send(&mut self, slot: usize, message: &ChannelMessage) -> Result<()> {
        self.send_message(slot, &message.encode())
    }

    /// Transmit whatever is buffered for `slot`; no-op on an empty buffer
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlot` if `slot` is out of range.
    pub fn flush(&mut self, slot: usize) -> Result<()> {
        if slot >= self.table.capacity() {
            return Err(AppleMidiError::InvalidSlot { slot });
        }
        self.flush_slot(slot);
        Ok(())
    }

    // ===== Inbound =====

    /// Dispatch one received datagram
    ///
    /// `channel` is the local socket it arrived on. Every failure is logged
    /// and the datagram dropped; the error only reports why.
    ///
    /// # Errors
    ///
    /// Returns a protocol error (`is_protocol_error`) for malformed,
    /// unknown or unsolicited datagrams.
    pub fn handle_datagram(&mut self, source: SocketAddr, data: &[u8], channel: Channel) -> Result<()> {
        if ControlCommand::is_control(data) {
            let command = ControlCommand::decode(data).map_err(|e| {
                if self.debug_level.logs(DebugLevel::Events) {
                    warn!(peer = %source, %channel, len = data.len(), error = %e, "Dropping control command");
                }
                AppleMidiError::from(e)
            })?;
            self.handle_control(source, channel, command)
        } else if RtpMidiHeader::matches(data) {
            self.handle_rtp_midi(source, data)
        } else {
            let mut leading = [0u8; 4];
            let n = data.len().min(4);
            leading[..n].copy_from_slice(&data[..n]);
            let leading = u32::from_be_bytes(leading);
            if self.debug_level.logs(DebugLevel::Events) {
                warn!(peer = %source, %channel, leading, "Dropping unknown datagram");
            }
            Err(AppleMidiError::UnknownDatagram { leading })
        }
    }

    fn handle_control(&mut self, source: SocketAddr, channel: Channel, command: ControlCommand) -> Result<()> {
        let threshold = if command.code() == CommandCode::Synchronization {
            DebugLevel::Verbose
        } else {
            DebugLevel::Commands
        };
        if self.debug_level.logs(threshold) {
            debug!(
                command = command.code().mnemonic(),
                peer = %source,
                %channel,
                ssrc = command.ssrc(),
                "Received control command"
            );
        }

        match command {
            ControlCommand::Invitation(invitation) => {
                self.handle_invitation(source, channel, &invitation);
                Ok(())
            }
            ControlCommand::InvitationAccepted(accepted) => {
                self.handle_accepted(source, channel, &accepted)
            }
            ControlCommand::InvitationRejected(rejected) => self.handle_rejected(source, &rejected),
            ControlCommand::EndSession(end) => self.handle_end_session(source, &end),
            ControlCommand::Synchronization(sync) => self.handle_sync(source, channel, &sync),
            ControlCommand::ReceiverFeedback { ssrc, sequence } => {
                self.handle_feedback(source, channel, ssrc, sequence)
            }
            ControlCommand::BitrateReceiveLimit { ssrc, limit } => {
                if self.debug_level.logs(DebugLevel::Commands) {
                    debug!(peer = %source, ssrc, limit, "Peer announced receive bitrate limit");
                }
                Ok(())
            }
        }
    }

    fn handle_invitation(&mut self, source: SocketAddr, channel: Channel, invitation: &SessionExchange) {
        let address = source.ip();
        let port = source.port();
        let local_ssrc = self.local_ssrc();
        let local_name = self.table.local().name.clone();
        let events = self.debug_level.logs(DebugLevel::Events);

        if invitation.ssrc == 0 {
            if events {
                warn!(peer = %source, token = invitation.token, "Invitation without a source id");
            }
            let reply = ControlCommand::InvitationRejected(SessionExchange::new(
                invitation.token,
                local_ssrc,
                None,
            ));
            self.send_command(channel, source, &reply);
            return;
        }

        let known = self.table.find(address, invitation.ssrc);
        let slot = known.or_else(|| {
            self.table.allocate(
                address,
                port,
                invitation.token,
                invitation.ssrc,
                invitation.name.as_deref().unwrap_or_default(),
            )
        });

        let Some(slot) = slot else {
            if events {
                warn!(
                    peer = %source,
                    ssrc = invitation.ssrc,
                    token = invitation.token,
                    "No free slot for invited peer"
                );
            }
            let reply = ControlCommand::InvitationRejected(SessionExchange::new(
                invitation.token,
                local_ssrc,
                None,
            ));
            self.send_command(channel, source, &reply);
            return;
        };

        if let Some(peer) = self.table.get_mut(slot) {
            if channel.is_data() {
                peer.data_port = port;
            } else {
                peer.control_port = port;
            }
            if events {
                if known.is_some() {
                    info!(slot, peer = %source, %channel, ssrc = peer.ssrc, name = %peer.name, "Peer already registered");
                } else {
                    info!(slot, peer = %source, %channel, ssrc = peer.ssrc, name = %peer.name, "New peer");
                }
            }
        }

        let reply = ControlCommand::InvitationAccepted(SessionExchange::new(
            invitation.token,
            local_ssrc,
            Some(&local_name),
        ));
        self.send_command(channel, source, &reply);

        if !channel.is_data() {
            if let Some(limit) = self.config.bitrate_receive_limit {
                let command = ControlCommand::BitrateReceiveLimit {
                    ssrc: local_ssrc,
                    limit,
                };
                self.send_command(Channel::Control, source, &command);
            }
        }
    }

    fn handle_accepted(&mut self, source: SocketAddr, channel: Channel, accepted: &SessionExchange) -> Result<()> {
        let address = source.ip();
        let port = source.port();
        let events = self.debug_level.logs(DebugLevel::Events);

        let pending = self.table.remotes().find(|peer| {
            peer.address == Some(address)
                && match peer.state {
                    ConnectionState::MasterConnectingControl => {
                        !channel.is_data() && peer.control_port == port
                    }
                    ConnectionState::MasterConnectingData => {
                        channel.is_data() && peer.data_port == port
                    }
                    _ => false,
                }
        });
        let Some(slot) = pending.map(|peer| peer.slot) else {
            if events {
                warn!(peer = %source, %channel, ssrc = accepted.ssrc, "Unsolicited invitation accept");
            }
            return Err(AppleMidiError::UnknownPeer {
                ssrc: accepted.ssrc,
            });
        };

        let local_ssrc = self.local_ssrc();
        let local_name = self.table.local().name.clone();
        let peer = self.peer_mut(slot)?;

        if peer.token != accepted.token {
            if events {
                warn!(
                    slot,
                    peer = %source,
                    expected = peer.token,
                    token = accepted.token,
                    "Invitation accept with wrong token, ending session"
                );
            }
            self.end_session(slot);
            return Ok(());
        }

        if peer.state == ConnectionState::MasterConnectingControl {
            peer.ssrc = accepted.ssrc;
            if let Some(name) = &accepted.name {
                peer.name = bounded_name(name).to_string();
            }
            peer.state = ConnectionState::MasterConnectingData;
            let token = peer.token;
            let destination = peer.data_addr();

            if events {
                info!(slot, peer = %source, ssrc = peer.ssrc, name = %peer.name, "Control port accepted, inviting data port");
            }
            if let Some(destination) = destination {
                let invitation = ControlCommand::Invitation(SessionExchange::new(
                    token,
                    local_ssrc,
                    Some(&local_name),
                ));
                self.send_command(Channel::Data, destination, &invitation);
            }
        } else {
            peer.state = ConnectionState::MasterConnected;
            peer.sync.restart();
            if events {
                info!(slot, peer = %source, ssrc = peer.ssrc, name = %peer.name, "Session established");
            }
        }
        Ok(())
    }

    fn handle_rejected(&mut self, source: SocketAddr, rejected: &SessionExchange) -> Result<()> {
        let address = source.ip();
        let events = self.debug_level.logs(DebugLevel::Events);

        let pending = self
            .table
            .remotes()
            .find(|peer| {
                peer.state.is_connecting()
                    && peer.token == rejected.token
                    && peer.address == Some(address)
            })
            .map(|peer| peer.slot);
        let Some(slot) = pending else {
            if events {
                warn!(peer = %source, token = rejected.token, "Unsolicited invitation reject");
            }
            return Err(AppleMidiError::UnknownPeer {
                ssrc: rejected.ssrc,
            });
        };

        if events {
            info!(slot, peer = %source, "Peer rejected invitation, releasing slot");
        }
        self.end_session(slot);
        Ok(())
    }

    fn handle_end_session(&mut self, source: SocketAddr, end: &SessionExchange) -> Result<()> {
        let events = self.debug_level.logs(DebugLevel::Events);
        match self.table.release(end.ssrc) {
            Some(slot) => {
                if events {
                    info!(slot, peer = %source, ssrc = end.ssrc, "Peer ended session");
                }
                Ok(())
            }
            None => {
                if events {
                    warn!(peer = %source, ssrc = end.ssrc, "End session from unregistered peer");
                }
                Err(AppleMidiError::UnknownPeer { ssrc: end.ssrc })
            }
        }
    }

    fn handle_sync(&mut self, source: SocketAddr, channel: Channel, received: &Synchronization) -> Result<()> {
        let verbose = self.debug_level.logs(DebugLevel::Verbose);
        let Some(slot) = self.table.find(source.ip(), received.ssrc) else {
            if self.debug_level.logs(DebugLevel::Events) {
                warn!(peer = %source, ssrc = received.ssrc, "Clock sync from unregistered peer");
            }
            return Err(AppleMidiError::UnknownPeer {
                ssrc: received.ssrc,
            });
        };

        if verbose {
            trace!(
                slot,
                count = received.count,
                ts1 = received.timestamps[0],
                ts2 = received.timestamps[1],
                ts3 = received.timestamps[2],
                "Clock sync round"
            );
        }

        match sync::respond(received, self.local_ssrc(), self.clock.now()) {
            SyncOutcome::Reply(reply) => {
                self.send_command(channel, source, &ControlCommand::Synchronization(reply));
            }
            SyncOutcome::Complete(estimate) => {
                if verbose {
                    trace!(
                        slot,
                        peer_round_trip = estimate.peer_round_trip,
                        local_round_trip = estimate.local_round_trip,
                        offset = estimate.offset,
                        "Clock sync complete"
                    );
                }
                self.peer_mut(slot)?.clock_estimate = Some(estimate);
            }
        }
        Ok(())
    }

    fn handle_feedback(&mut self, source: SocketAddr, channel: Channel, ssrc: u32, sequence: u16) -> Result<()> {
        let Some(slot) = self.table.find(source.ip(), ssrc) else {
            if self.debug_level.logs(DebugLevel::Events) {
                warn!(peer = %source, ssrc, "Receiver feedback from unregistered peer");
            }
            return Err(AppleMidiError::UnknownPeer { ssrc });
        };

        let local = self.table.local();
        let local_ssrc = local.ssrc;
        let last_sent = local.sequence.last();
        if !local.sequence.acknowledges(sequence) {
            if self.debug_level.logs(DebugLevel::Events) {
                warn!(slot, peer = %source, ssrc, sequence, last_sent = ?last_sent, "Receiver feedback indicates packet loss");
            }
            self.table.local_mut().stats.packets_lost.increment();
            self.peer_mut(slot)?.stats.packets_lost.increment();
        }

        let echo = self.peer_mut(slot)?.sequence.last().unwrap_or(0);
        let reply = ControlCommand::ReceiverFeedback {
            ssrc: local_ssrc,
            sequence: echo,
        };
        self.send_command(channel, source, &reply);
        Ok(())
    }

    fn handle_rtp_midi(&mut self, source: SocketAddr, data: &[u8]) -> Result<()> {
        let events = self.debug_level.logs(DebugLevel::Events);
        let verbose = self.debug_level.logs(DebugLevel::Verbose);

        let header = RtpMidiHeader::decode(data).map_err(|e| {
            if events {
                warn!(peer = %source, len = data.len(), error = %e, "Dropping RTP-MIDI packet");
            }
            AppleMidiError::from(e)
        })?;
        let Some(slot) = self.table.find(source.ip(), header.ssrc) else {
            if events {
                warn!(peer = %source, ssrc = header.ssrc, "MIDI from unregistered peer");
            }
            return Err(AppleMidiError::UnknownPeer { ssrc: header.ssrc });
        };

        let peer = self.peer_mut(slot)?;
        let check = peer.sequence.record(header.sequence);
        if let SequenceCheck::Gap { expected } = check {
            if events {
                warn!(slot, peer = %source, ssrc = header.ssrc, sequence = header.sequence, expected, "Detected packet loss");
            }
            peer.stats.packets_lost.increment();
        }
        peer.stats.packets_received.increment();
        let mut sysex_offset = peer.continued_sysex_offset;

        let local = self.table.local_mut();
        if check.is_gap() {
            local.stats.packets_lost.increment();
        }
        local.stats.packets_received.increment();

        let sink = &mut self.sink;
        let result = decode_command_section(
            &data[RtpMidiHeader::SIZE..],
            header.timestamp,
            &mut sysex_offset,
            |command| {
                if verbose {
                    trace!(slot, status = command.status, len = command.data.len(), "MIDI command");
                }
                sink.on_midi_message(&ReceivedMidi {
                    slot,
                    ssrc: header.ssrc,
                    timestamp: command.timestamp,
                    status: command.status,
                    data: command.data,
                    continued_sysex_offset: command.continued_sysex_offset,
                });
            },
        );
        self.peer_mut(slot)?.continued_sysex_offset = sysex_offset;

        match result {
            Ok(count) => {
                if verbose {
                    trace!(slot, sequence = header.sequence, count, "Decoded RTP-MIDI packet");
                }
                Ok(())
            }
            Err(e) => {
                if events {
                    warn!(slot, peer = %source, error = %e, "Failed to decode RTP-MIDI payload");
                }
                Err(e.into())
            }
        }
    }

    // ===== Internals =====

    fn check_remote_slot(&self, slot: usize) -> Result<()> {
        if slot == 0 || slot >= self.table.capacity() {
            return Err(AppleMidiError::InvalidSlot { slot });
        }
        Ok(())
    }

    fn peer_mut(&mut self, slot: usize) -> Result<&mut Peer> {
        self.table
            .get_mut(slot)
            .ok_or(AppleMidiError::InvalidSlot { slot })
    }

    /// Send `EndSession` to the slot's control port and free it
    fn end_session(&mut self, slot: usize) {
        let local_ssrc = self.local_ssrc();
        let Some(peer) = self.table.get(slot) else {
            return;
        };
        let token = peer.token;
        if let Some(destination) = peer.control_addr() {
            let command = ControlCommand::EndSession(SessionExchange::new(token, local_ssrc, None));
            self.send_command(Channel::Control, destination, &command);
        }
        self.table.release_slot(slot);
    }

    fn next_header(&mut self) -> RtpMidiHeader {
        let timestamp = self.clock.now_u32();
        let local = self.table.local_mut();
        let sequence = local.sequence.next_outgoing();
        RtpMidiHeader::new(sequence, timestamp, local.ssrc)
    }

    fn flush_slot(&mut self, slot: usize) {
        let Some(peer) = self.table.get_mut(slot) else {
            return;
        };
        let Some(packet) = peer.outbuffer.take() else {
            return;
        };
        self.send_packet(slot, &packet);
    }

    fn send_packet(&mut self, slot: usize, packet: &[u8]) {
        let Some(destination) = self.table.get(slot).and_then(Peer::data_addr) else {
            return;
        };
        if transmit(&mut self.sender, Channel::Data, destination, packet) {
            if let Some(peer) = self.table.get_mut(slot) {
                peer.stats.packets_sent.increment();
            }
            self.table.local_mut().stats.packets_sent.increment();
        }
    }

    fn send_command(&mut self, channel: Channel, destination: SocketAddr, command: &ControlCommand) {
        if !transmit(&mut self.sender, channel, destination, &command.encode()) {
            return;
        }
        let slot = self
            .table
            .remotes()
            .find(|peer| peer.is_reached_by(destination))
            .map(|peer| peer.slot);
        if let Some(peer) = slot.and_then(|slot| self.table.get_mut(slot)) {
            peer.stats.packets_sent.increment();
        }
        self.table.local_mut().stats.packets_sent.increment();
    }
}

fn transmit<S: DatagramSender>(sender: &mut S, channel: Channel, destination: SocketAddr, bytes: &[u8]) -> bool {
    match sender.send_datagram(channel, destination, bytes) {
        Ok(_) => true,
        Err(e) => {
            warn!(peer = %destination, %channel, len = bytes.len(), error = %e, "Failed to send datagram");
            false
        }
    }
}

fn random_nonzero() -> u32 {
    loop {
        let value: u32 = rand::random();
        if value != 0 {
            return value;
        }
    }
}
