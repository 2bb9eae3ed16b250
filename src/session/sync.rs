//! Three-round clock synchronization (CK)
//!
//! ```text
//! initiator                     responder
//!   CK count=0 [t1, 0, 0]   ->
//!                           <-  CK count=1 [t1, t2, 0]
//!   CK count=2 [t1, t2, t3] ->
//! ```
//!
//! The initiator is the master side of a connected session; it starts a new
//! exchange on every due timer tick.

use super::clock::is_due;
use crate::protocol::applemidi::Synchronization;
use crate::types::SessionConfig;

/// Spacing of master-initiated sync rounds, in 100µs ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Spacing while fewer than `fast_rounds` have been sent
    pub start_interval: u32,
    /// Spacing afterwards
    pub regular_interval: u32,
    /// Number of rounds at `start_interval`
    pub fast_rounds: u32,
}

impl SyncPolicy {
    /// Derive the policy from session configuration
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            start_interval: SessionConfig::ticks(config.sync_start_interval),
            regular_interval: SessionConfig::ticks(config.sync_regular_interval),
            fast_rounds: config.sync_fast_rounds,
        }
    }
}

/// Per-peer sync timer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSchedule {
    last: Option<u32>,
    rounds: u32,
}

impl SyncSchedule {
    /// Make the next round due immediately and restart the fast phase
    pub fn restart(&mut self) {
        self.last = None;
        self.rounds = 0;
    }

    /// Rounds initiated so far (saturates at the fast round count)
    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Returns true and records the round if one is due at `now`
    pub fn poll(&mut self, now: u32, policy: &SyncPolicy) -> bool {
        let interval = if self.rounds < policy.fast_rounds {
            policy.start_interval
        } else {
            policy.regular_interval
        };
        let due = self.last.is_none_or(|last| is_due(last, now, interval));
        if due {
            self.last = Some(now);
            if self.rounds < policy.fast_rounds {
                self.rounds += 1;
            }
        }
        due
    }
}

/// Result of a completed exchange, seen from the responder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockEstimate {
    /// `t3 - t1` on the initiator's clock
    pub peer_round_trip: u64,
    /// `now - t2` on our clock
    pub local_round_trip: u64,
    /// Initiator clock minus ours, `(t1 + t3) / 2 - t2`
    pub offset: i64,
}

impl ClockEstimate {
    /// Compute from the three stamps of a count-2 command received at `now`
    #[must_use]
    pub fn from_exchange(timestamps: [u64; 3], now: u64) -> Self {
        let [t1, t2, t3] = timestamps;
        let midpoint = (i128::from(t1) + i128::from(t3)) / 2;
        let offset = (midpoint - i128::from(t2)).clamp(i128::from(i64::MIN), i128::from(i64::MAX));

        Self {
            peer_round_trip: t3.wrapping_sub(t1),
            local_round_trip: now.wrapping_sub(t2),
            offset: i64::try_from(offset).unwrap_or_default(),
        }
    }

    /// One-way latency estimate from the initiator's round trip, in 100µs ticks
    #[must_use]
    pub fn latency(&self) -> u64 {
        self.peer_round_trip / 2
    }
}

/// What to do with a received sync command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Send this command back to the sender
    Reply(Synchronization),
    /// Exchange finished; nothing to send
    Complete(ClockEstimate),
}

/// Advance an exchange by one round
#[must_use]
pub fn respond(received: &Synchronization, local_ssrc: u32, now: u64) -> SyncOutcome {
    let mut timestamps = received.timestamps;
    let count = match received.count {
        0 => {
            timestamps[1] = now;
            1
        }
        1 => {
            timestamps[2] = now;
            2
        }
        2 => return SyncOutcome::Complete(ClockEstimate::from_exchange(timestamps, now)),
        _ => {
            timestamps = [now, 0, 0];
            0
        }
    };

    SyncOutcome::Reply(Synchronization {
        ssrc: local_ssrc,
        count,
        timestamps,
    })
}

/// First round of a new exchange
#[must_use]
pub fn initiate(local_ssrc: u32, now: u64) -> Synchronization {
    Synchronization {
        ssrc: local_ssrc,
        count: 0,
        timestamps: [now, 0, 0],
    }
}
