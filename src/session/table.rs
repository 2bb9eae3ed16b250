//! Fixed-capacity session table

use std::net::IpAddr;
use std::ops::Range;

use super::peer::Peer;
use super::state::ConnectionState;
use crate::protocol::applemidi::bounded_name;

/// Session slots; slot 0 is the local identity
#[derive(Debug)]
pub struct PeerTable {
    peers: Vec<Peer>,
}

impl PeerTable {
    /// Create a table of `capacity` slots with the local identity in slot 0
    #[must_use]
    pub fn new(capacity: usize, outbuffer_size: usize, local_ssrc: u32, local_name: &str) -> Self {
        let mut peers: Vec<Peer> = (0..capacity.max(1))
            .map(|slot| Peer::new(slot, outbuffer_size))
            .collect();
        peers[0].ssrc = local_ssrc;
        peers[0].name = bounded_name(local_name).to_string();

        Self { peers }
    }

    /// Number of slots including the local identity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.peers.len()
    }

    /// Indices of the remote slots
    #[must_use]
    pub fn remote_slots(&self) -> Range<usize> {
        1..self.peers.len()
    }

    /// The local identity
    #[must_use]
    pub fn local(&self) -> &Peer {
        &self.peers[0]
    }

    pub(crate) fn local_mut(&mut self) -> &mut Peer {
        &mut self.peers[0]
    }

    /// Slot by index
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&Peer> {
        self.peers.get(slot)
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> Option<&mut Peer> {
        self.peers.get_mut(slot)
    }

    /// Iterate over the remote slots
    pub fn remotes(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter().skip(1)
    }

    /// Remote slot with this address and source id
    #[must_use]
    pub fn find(&self, address: IpAddr, ssrc: u32) -> Option<usize> {
        if ssrc == 0 {
            return None;
        }
        self.remotes()
            .find(|peer| peer.ssrc == ssrc && peer.address == Some(address))
            .map(|peer| peer.slot)
    }

    /// First free remote slot
    #[must_use]
    pub fn search_free_slot(&self) -> Option<usize> {
        self.remotes().find(|peer| peer.is_free()).map(|peer| peer.slot)
    }

    /// Register an invited peer
    ///
    /// Re-invitations from a known `(address, ssrc)` return the existing
    /// slot unchanged. Otherwise the first free slot is populated with
    /// `port` as both control and data port until the second leg arrives.
    /// Source id 0 marks a free slot and is never registered.
    pub fn allocate(
        &mut self,
        address: IpAddr,
        port: u16,
        token: u32,
        ssrc: u32,
        name: &str,
    ) -> Option<usize> {
        if ssrc == 0 {
            return None;
        }
        if let Some(slot) = self.find(address, ssrc) {
            return Some(slot);
        }

        let slot = self.search_free_slot()?;
        let peer = &mut self.peers[slot];
        peer.reset();
        peer.address = Some(address);
        peer.control_port = port;
        peer.data_port = port;
        peer.token = token;
        peer.ssrc = ssrc;
        peer.name = bounded_name(name).to_string();
        peer.state = ConnectionState::Slave;
        Some(slot)
    }

    /// Free the remote slot with this source id
    pub fn release(&mut self, ssrc: u32) -> Option<usize> {
        if ssrc == 0 {
            return None;
        }
        let slot = self.remotes().find(|peer| peer.ssrc == ssrc)?.slot;
        self.peers[slot].reset();
        Some(slot)
    }

    /// Free a remote slot by index; pending invitations have no source id yet
    pub fn release_slot(&mut self, slot: usize) -> bool {
        if slot == 0 {
            return false;
        }
        match self.peers.get_mut(slot) {
            Some(peer) => {
                peer.reset();
                true
            }
            None => false,
        }
    }
}
