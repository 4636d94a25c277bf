//! Connection status reporting.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::SelfIdentity;

/// The connection state machine's externally visible position.
///
/// Exactly one value is current at any instant; transitions are driven only
/// by engine events or explicit lifecycle calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Disconnected,
    QrPending,
    Authenticated,
    Connected,
}

impl ConnectionStatus {
    /// Whether outbound sends are allowed. `Connected` and `Authenticated`
    /// differ only for reporting.
    pub fn is_usable(self) -> bool {
        matches!(self, ConnectionStatus::Connected | ConnectionStatus::Authenticated)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Disconnected => "DISCONNECTED",
            ConnectionStatus::QrPending => "QR_PENDING",
            ConnectionStatus::Authenticated => "AUTHENTICATED",
            ConnectionStatus::Connected => "CONNECTED",
        };
        f.write_str(label)
    }
}

/// Point-in-time view of the gateway for polling callers.
///
/// Produced by [`ConnectionManager::status`](super::manager::ConnectionManager::status);
/// reading one never blocks and never mutates state.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub status: ConnectionStatus,
    /// Rendered pairing challenge, present only while one is outstanding.
    pub qr_image: Option<String>,
    /// Populated once a connection is open.
    pub identity: Option<SelfIdentity>,
    /// Automatic reconnect attempts since the last successful open.
    pub reconnect_attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_states() {
        assert!(ConnectionStatus::Connected.is_usable());
        assert!(ConnectionStatus::Authenticated.is_usable());
        assert!(!ConnectionStatus::QrPending.is_usable());
        assert!(!ConnectionStatus::Disconnected.is_usable());
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "DISCONNECTED");
        assert_eq!(ConnectionStatus::QrPending.to_string(), "QR_PENDING");
        assert_eq!(ConnectionStatus::Authenticated.to_string(), "AUTHENTICATED");
        assert_eq!(ConnectionStatus::Connected.to_string(), "CONNECTED");
    }
}
