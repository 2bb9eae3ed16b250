//! Session management
//!
//! [`AppleMidiSession`] is the engine; the remaining modules hold the
//! pieces it is built from and are public for callers that want to drive
//! them directly.

mod clock;
mod engine;
mod outbuffer;
mod peer;
mod sequence;
mod state;
pub mod sync;
mod table;


pub use clock::{Clock, SystemClock, is_due};
pub use engine::AppleMidiSession;
pub use outbuffer::{HEADER_RESERVE, OutBuffer, split_sysex};
pub use peer::{Peer, PeerStats, PeerView, SaturatingCounter};
pub use sequence::{SequenceCheck, SequenceTracker};
pub use state::ConnectionState;
pub use sync::{ClockEstimate, SyncOutcome, SyncPolicy, SyncSchedule};
pub use table::PeerTable;
