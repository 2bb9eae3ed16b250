use std::time::Duration;

use crate::protocol::applemidi::bounded_name;

/// Width of one timestamp tick
pub const TICK: Duration = Duration::from_micros(100);

/// Verbosity of session diagnostics
///
/// Levels are cumulative; each one also logs everything below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DebugLevel {
    /// Nothing beyond transport failures
    Silent = 0,
    /// Session lifecycle, drops and losses
    #[default]
    Events = 1,
    /// Every received control command
    Commands = 2,
    /// Clock sync rounds and decoded MIDI
    Verbose = 3,
}

impl DebugLevel {
    /// Numeric level, clamped to `Verbose`
    #[must_use]
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Silent,
            1 => Self::Events,
            2 => Self::Commands,
            _ => Self::Verbose,
        }
    }

    /// Whether messages at `level` are emitted
    #[must_use]
    pub fn logs(self, level: Self) -> bool {
        self >= level
    }
}

impl From<u8> for DebugLevel {
    fn from(level: u8) -> Self {
        Self::from_level(level)
    }
}

/// Configuration of an `AppleMIDI` session engine
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name announced in invitations (default: "MIDIbox")
    pub local_name: String,

    /// Fixed local synchronization source id (None = random, non-zero)
    pub local_ssrc: Option<u32>,

    /// Peer table capacity including the local identity (default: 5)
    pub max_peers: usize,

    /// Control port used by the UDP server; data port is one higher (default: 5004)
    pub default_port: u16,

    /// Outgoing RTP-MIDI packet buffer size (default: 512)
    pub outbuffer_size: usize,

    /// Maximum age of buffered outgoing MIDI (default: 1ms)
    pub flush_interval: Duration,

    /// Clock sync spacing during the first rounds (default: 100ms)
    pub sync_start_interval: Duration,

    /// Clock sync spacing afterwards (default: 20s)
    pub sync_regular_interval: Duration,

    /// Number of rounds at the start interval (default: 10)
    pub sync_fast_rounds: u32,

    /// Announce a receive bitrate limit after accepting an invitation
    pub bitrate_receive_limit: Option<u32>,

    /// Diagnostic verbosity (default: `Events`)
    pub debug_level: DebugLevel,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_name: "MIDIbox".to_string(),
            local_ssrc: None,
            max_peers: 5,
            default_port: 5004,
            outbuffer_size: 512,
            flush_interval: Duration::from_millis(1),
            sync_start_interval: Duration::from_millis(100),
            sync_regular_interval: Duration::from_secs(20),
            sync_fast_rounds: 10,
            bitrate_receive_limit: None,
            debug_level: DebugLevel::Events,
        }
    }
}

impl SessionConfig {
    /// Smallest usable peer table: the local identity plus one remote
    pub const MIN_PEERS: usize = 2;

    /// Smallest buffer that holds the packet header plus a few bytes
    pub const MIN_OUTBUFFER_SIZE: usize = 64;

    /// Create a new config builder
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Convert a duration to 100µs ticks, saturating at `u32::MAX`
    #[must_use]
    pub fn ticks(duration: Duration) -> u32 {
        let ticks = duration.as_micros() / TICK.as_micros();
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }
}

/// Builder for `SessionConfig`
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set the announced session name (bounded to 63 bytes)
    #[must_use]
    pub fn local_name(mut self, name: impl AsRef<str>) -> Self {
        self.config.local_name = bounded_name(name.as_ref()).to_string();
        self
    }

    /// Use a fixed local synchronization source id
    ///
    /// Zero is ignored and a random id is chosen instead.
    #[must_use]
    pub fn local_ssrc(mut self, ssrc: u32) -> Self {
        self.config.local_ssrc = (ssrc != 0).then_some(ssrc);
        self
    }

    /// Set the peer table capacity (at least 2)
    #[must_use]
    pub fn max_peers(mut self, max_peers: usize) -> Self {
        self.config.max_peers = max_peers.max(SessionConfig::MIN_PEERS);
        self
    }

    /// Set the control port for the UDP server
    #[must_use]
    pub fn default_port(mut self, port: u16) -> Self {
        self.config.default_port = port;
        self
    }

    /// Set the outgoing packet buffer size
    #[must_use]
    pub fn outbuffer_size(mut self, size: usize) -> Self {
        self.config.outbuffer_size = size.max(SessionConfig::MIN_OUTBUFFER_SIZE);
        self
    }

    /// Set the flush interval for buffered MIDI
    #[must_use]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// Set clock sync spacing: `start` for the first `fast_rounds`, then `regular`
    #[must_use]
    pub fn sync_intervals(mut self, start: Duration, regular: Duration, fast_rounds: u32) -> Self {
        self.config.sync_start_interval = start;
        self.config.sync_regular_interval = regular;
        self.config.sync_fast_rounds = fast_rounds;
        self
    }

    /// Announce a receive bitrate limit to peers
    #[must_use]
    pub fn bitrate_receive_limit(mut self, limit: u32) -> Self {
        self.config.bitrate_receive_limit = Some(limit);
        self
    }

    /// Set diagnostic verbosity
    #[must_use]
    pub fn debug_level(mut self, level: DebugLevel) -> Self {
        self.config.debug_level = level;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> SessionConfig {
        self.config
    }
}
