//! mDNS advertisement of `AppleMIDI` sessions

pub mod advertiser;

pub use advertiser::{AdvertiserConfig, AdvertiserError, SessionAdvertiser};

/// Service type for `AppleMIDI` discovery
pub const APPLE_MIDI_SERVICE_TYPE: &str = "_apple-midi._udp.local.";
