//! Session slot contents

use std::net::{IpAddr, SocketAddr};

use super::outbuffer::OutBuffer;
use super::sequence::SequenceTracker;
use super::state::ConnectionState;
use super::sync::{ClockEstimate, SyncSchedule};

/// Counter that sticks at `u32::MAX`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SaturatingCounter(u32);

impl SaturatingCounter {
    /// Add one unless saturated
    pub fn increment(&mut self) {
        self.0 = self.0.saturating_add(1);
    }

    /// Current value
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Whether the counter can no longer advance
    #[must_use]
    pub fn is_saturated(self) -> bool {
        self.0 == u32::MAX
    }
}

impl From<u32> for SaturatingCounter {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Packet statistics of one slot
///
/// On the local identity these aggregate over all peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerStats {
    /// Datagrams sent, control commands and RTP-MIDI alike
    pub packets_sent: SaturatingCounter,
    /// RTP-MIDI packets received
    pub packets_received: SaturatingCounter,
    /// Sequence gaps and unacknowledged feedback
    pub packets_lost: SaturatingCounter,
}

/// One entry of the peer table
#[derive(Debug)]
pub struct Peer {
    pub(crate) slot: usize,
    pub(crate) ssrc: u32,
    pub(crate) name: String,
    pub(crate) address: Option<IpAddr>,
    pub(crate) control_port: u16,
    pub(crate) data_port: u16,
    pub(crate) token: u32,
    pub(crate) state: ConnectionState,
    pub(crate) sequence: SequenceTracker,
    pub(crate) continued_sysex_offset: usize,
    pub(crate) outbuffer: OutBuffer,
    pub(crate) sync: SyncSchedule,
    pub(crate) stats: PeerStats,
    pub(crate) clock_estimate: Option<ClockEstimate>,
}

impl Peer {
    pub(crate) fn new(slot: usize, outbuffer_size: usize) -> Self {
        Self {
            slot,
            ssrc: 0,
            name: String::new(),
            address: None,
            control_port: 0,
            data_port: 0,
            token: 0,
            state: ConnectionState::Slave,
            sequence: SequenceTracker::new(),
            continued_sysex_offset: 0,
            outbuffer: OutBuffer::new(outbuffer_size),
            sync: SyncSchedule::default(),
            stats: PeerStats::default(),
            clock_estimate: None,
        }
    }

    /// Slot holds neither a session nor a pending invitation
    ///
    /// The local identity is never free.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.slot != 0 && self.ssrc == 0 && self.state == ConnectionState::Slave
    }

    /// Whether datagrams to `destination` belong to this session
    pub(crate) fn is_reached_by(&self, destination: SocketAddr) -> bool {
        !self.is_free()
            && self.address == Some(destination.ip())
            && (self.control_port == destination.port() || self.data_port == destination.port())
    }

    /// Return the slot to its initial state
    pub(crate) fn reset(&mut self) {
        let capacity = self.outbuffer.capacity();
        *self = Self::new(self.slot, capacity);
    }

    /// Control port endpoint
    #[must_use]
    pub fn control_addr(&self) -> Option<SocketAddr> {
        self.address.map(|ip| SocketAddr::new(ip, self.control_port))
    }

    /// Data port endpoint
    #[must_use]
    pub fn data_addr(&self) -> Option<SocketAddr> {
        self.address.map(|ip| SocketAddr::new(ip, self.data_port))
    }

    /// Snapshot for callers
    #[must_use]
    pub fn view(&self) -> PeerView {
        PeerView {
            slot: self.slot,
            ssrc: self.ssrc,
            name: self.name.clone(),
            address: self.address,
            control_port: self.control_port,
            data_port: self.data_port,
            state: self.state,
            sequence_number: self.sequence.last(),
            continued_sysex_offset: self.continued_sysex_offset,
            buffered_bytes: self.outbuffer.len(),
            sync_rounds: self.sync.rounds(),
            stats: self.stats,
            clock_estimate: self.clock_estimate,
        }
    }
}

/// Read-only snapshot of a session slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerView {
    /// Slot index, 0 is the local identity
    pub slot: usize,
    /// Synchronization source id (0 while an outbound invitation is pending)
    pub ssrc: u32,
    /// Display name
    pub name: String,
    /// Peer address
    pub address: Option<IpAddr>,
    /// Control port
    pub control_port: u16,
    /// Data port
    pub data_port: u16,
    /// Handshake state
    pub state: ConnectionState,
    /// Last sequence number received (remote) or sent (local identity)
    pub sequence_number: Option<u16>,
    /// SysEx bytes delivered so far for a SysEx in progress
    pub continued_sysex_offset: usize,
    /// Bytes waiting in the outgoing buffer
    pub buffered_bytes: usize,
    /// Clock sync rounds initiated (saturates at the fast round count)
    pub sync_rounds: u32,
    /// Packet statistics
    pub stats: PeerStats,
    /// Latest completed clock sync
    pub clock_estimate: Option<ClockEstimate>,
}
