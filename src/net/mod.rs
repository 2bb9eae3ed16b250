//! Transport boundary
//!
//! The engine never touches sockets itself. It sends through a
//! [`DatagramSender`] and hands decoded MIDI to a [`MidiEventSink`];
//! `udp` drives an engine from a pair of tokio UDP sockets.

mod traits;

#[cfg(feature = "tokio-runtime")]
pub mod udp;
#[cfg(all(test, feature = "tokio-runtime"))]
mod udp_tests;

pub use traits::{Channel, DatagramSender, MidiEventSink, ReceivedMidi};
