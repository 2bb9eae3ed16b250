use std::fmt;

/// Handshake state of one session slot
///
/// `Slave` is both the initial state and the state of a released slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No outbound handshake role
    #[default]
    Slave,
    /// Invitation sent on the control port, awaiting accept
    MasterConnectingControl,
    /// Control leg accepted, invitation sent on the data port
    MasterConnectingData,
    /// Both legs accepted; this side drives clock sync
    MasterConnected,
}

impl ConnectionState {
    /// Waiting for an invitation reply
    #[must_use]
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            Self::MasterConnectingControl | Self::MasterConnectingData
        )
    }

    /// Both handshake legs completed in the master role
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::MasterConnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slave => write!(f, "Slave"),
            Self::MasterConnectingControl => write!(f, "MasterConnectingControl"),
            Self::MasterConnectingData => write!(f, "MasterConnectingData"),
            Self::MasterConnected => write!(f, "MasterConnected"),
        }
    }
}
