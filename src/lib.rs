//! # applemidi
//!
//! A pure Rust `AppleMIDI` / RTP-MIDI session and transport engine.
//!
//! ## Features
//!
//! - Session handshake in both roles (invite and accept)
//! - Three-round clock synchronization
//! - RTP-MIDI payload decoding with running status and SysEx continuation
//! - Outbound coalescing and SysEx fragmentation
//! - Tokio UDP server and mDNS advertisement
//!
//! ## Example
//!
//! ```rust,no_run
//! use applemidi::net::udp::AppleMidiServer;
//! use applemidi::{ChannelMessage, ReceivedMidi, SessionConfig};
//!
//! fn print_midi(midi: &ReceivedMidi<'_>) {
//!     println!("slot {} -> {:02x} {:?}", midi.slot, midi.status, midi.data);
//! }
//!
//! # async fn example() -> Result<(), applemidi::AppleMidiError> {
//! let config = SessionConfig::builder().local_name("Studio").build();
//! let (mut server, handle) = AppleMidiServer::bind(config, print_midi).await?;
//! server.advertise()?;
//! server.spawn();
//!
//! handle.start_session(1, "192.168.1.40:5004".parse().unwrap()).await?;
//! handle.send(1, &ChannelMessage::note_on(0, 60, 100)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Engine**: [`AppleMidiSession`] - synchronous, socket-free protocol core
//! - **Transport**: [`net::udp`] - tokio server feeding the engine
//! - **Low-level**: [`protocol`] codecs and [`midi`] helpers

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod discovery;
pub mod midi;
pub mod net;
pub mod protocol;
pub mod session;

// Re-exports
pub use error::{AppleMidiError, Result};
pub use midi::{ChannelMessage, MidiAction, MidiParser, ParserSink};
pub use net::{Channel, DatagramSender, MidiEventSink, ReceivedMidi};
pub use session::{AppleMidiSession, Clock, ConnectionState, PeerStats, PeerView, SystemClock};
pub use types::{DebugLevel, SessionConfig, SessionConfigBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AppleMidiError, AppleMidiSession, Channel, ChannelMessage, ConnectionState,
        DatagramSender, DebugLevel, MidiEventSink, ReceivedMidi, SessionConfig,
    };
}
