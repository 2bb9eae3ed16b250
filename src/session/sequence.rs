//! RTP-MIDI sequence number tracking

/// Outcome of recording an inbound sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// First packet of the session
    First,
    /// Exactly the expected successor
    InOrder,
    /// Anything else; one loss is counted regardless of the gap size
    Gap {
        /// The sequence number that was expected
        expected: u16,
    },
}

impl SequenceCheck {
    /// Whether this packet indicates loss or reordering
    #[must_use]
    pub fn is_gap(self) -> bool {
        matches!(self, Self::Gap { .. })
    }
}

/// Tracks the last sequence number seen (remote peers) or sent (local identity)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceTracker {
    last: Option<u16>,
}

impl SequenceTracker {
    /// Create a new sequence tracker
    #[must_use]
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Last recorded sequence number
    #[must_use]
    pub fn last(&self) -> Option<u16> {
        self.last
    }

    /// Sequence number expected next (wrapping)
    #[must_use]
    pub fn expected(&self) -> Option<u16> {
        self.last.map(|seq| seq.wrapping_add(1))
    }

    /// Record a received packet
    pub fn record(&mut self, seq: u16) -> SequenceCheck {
        let check = match self.expected() {
            None => SequenceCheck::First,
            Some(expected) if expected == seq => SequenceCheck::InOrder,
            Some(expected) => SequenceCheck::Gap { expected },
        };
        self.last = Some(seq);
        check
    }

    /// Allocate the next outgoing sequence number
    ///
    /// Starts at 0 and wraps after `0xFFFF`.
    pub fn next_outgoing(&mut self) -> u16 {
        let seq = self.expected().unwrap_or(0);
        self.last = Some(seq);
        seq
    }

    /// Whether a peer's feedback acknowledges one of our two latest packets
    ///
    /// With nothing sent yet every report is accepted.
    #[must_use]
    pub fn acknowledges(&self, reported: u16) -> bool {
        match self.last {
            None => true,
            Some(last) => reported == last || reported == last.wrapping_sub(1),
        }
    }

    /// Reset the tracker
    pub fn reset(&mut self) {
        self.last = None;
    }
}
