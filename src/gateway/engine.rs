//! Protocol Engine Boundary
//!
//! The chat-protocol engine is an external capability consumed through the
//! trait pair below: [`EngineTransport`] opens a live handle,
//! [`EngineHandle`] accepts sends and lifecycle calls, and the handle reports
//! progress through an [`EngineEvent`] stream. The reconnect/state-machine
//! and normalization logic is written once against these traits and tested
//! with [`MockTransport`](super::mock::MockTransport).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::gateway::status::ConnectionStatus;
use crate::session::{SelfIdentity, SessionAuthState};

/// Address suffix for manually constructed (unverified) recipient addresses.
pub const UNVERIFIED_ADDRESS_SUFFIX: &str = "c.us";

/// Canonical recipient address on the messaging network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatAddress(pub String);

impl ChatAddress {
    /// Manual address construction from bare digits, used when address
    /// resolution fails or reports the number unregistered.
    pub fn unverified(digits: &str) -> Self {
        Self(format!("{digits}@{UNVERIFIED_ADDRESS_SUFFIX}"))
    }
}

impl fmt::Display for ChatAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options for an outbound send.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Whether the engine may mark the recipient chat as seen. Always
    /// disabled by the dispatcher; the side effect destabilizes at least one
    /// engine implementation.
    pub mark_seen: bool,
}

/// Why the engine reported a closed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Explicit logout. Terminal: the session is never reconnected
    /// automatically.
    LoggedOut,
    /// Anything else: network drop, stream error, engine restart.
    ConnectionLost(String),
}

impl DisconnectReason {
    /// Classify a raw close-reason string from an engine that does not
    /// distinguish logout structurally.
    pub fn classify(raw: &str) -> Self {
        let normalized = raw.to_ascii_lowercase();
        if normalized.contains("logout") || normalized.contains("logged out") {
            DisconnectReason::LoggedOut
        } else {
            DisconnectReason::ConnectionLost(raw.to_string())
        }
    }
}

/// Events emitted by a live engine handle.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A pairing challenge must be displayed and scanned out-of-band.
    PairingChallenge(String),
    /// The identity credential changed and should be re-persisted.
    CredentialsChanged,
    /// The session authenticated against persisted credentials.
    Authenticated,
    /// Authentication was rejected; the session stays down.
    AuthFailure(String),
    /// The connection is open and usable.
    Opened(SelfIdentity),
    /// The connection closed.
    Closed(DisconnectReason),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Failures at the engine boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("address lookup failed: {0}")]
    Resolve(String),

    #[error("logout failed: {0}")]
    Logout(String),
}

/// Caller-facing gateway errors.
///
/// Only [`MessageDispatcher::send`](super::dispatcher::MessageDispatcher::send)
/// surfaces these; every other failure is observable through status polling
/// or logs. Display strings double as the humanized messages shown to users,
/// so they never carry engine internals.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("WhatsApp client not initialized")]
    NotInitialized,

    #[error("WhatsApp is not connected (status: {0}). Please scan the QR code.")]
    NotReady(ConnectionStatus),

    #[error(
        "WhatsApp session sync issue. Please logout from WhatsApp in Settings \
         and scan the QR code again."
    )]
    SessionUnstable,

    #[error("WhatsApp session timeout. Please try again, or re-connect in Settings.")]
    SessionTimeout,

    #[error("Failed to send WhatsApp message: {0}")]
    Send(String),
}

/// Configuration bundle handed to the transport when opening a handle.
pub struct EngineSession {
    /// Loaded credential state; the engine mutates it through the shared
    /// cell and signals [`EngineEvent::CredentialsChanged`].
    pub auth: SessionAuthState,
    /// How long the engine may spend establishing the transport.
    pub connect_timeout: Duration,
    /// Device name advertised to the network.
    pub device_name: String,
}

/// A live connection to the messaging network.
#[async_trait]
pub trait EngineHandle: Send + Sync + 'static {
    /// Send a text message. The returned value is the engine's own response,
    /// echoed back to callers opaquely.
    async fn send_text(
        &self,
        address: &ChatAddress,
        body: &str,
        options: SendOptions,
    ) -> EngineResult<Value>;

    /// Resolve bare digits to the canonical address for a registered number.
    /// `Ok(None)` means the number does not appear to be registered.
    async fn resolve_address(&self, digits: &str) -> EngineResult<Option<ChatAddress>>;

    /// Protocol-level logout. Triggers a [`DisconnectReason::LoggedOut`]
    /// close on the event stream.
    async fn logout(&self) -> EngineResult<()>;

    /// Forceful local teardown. Must not surface as a network close on the
    /// event stream.
    async fn terminate(&self, reason: &str);
}

/// Factory for live engine handles.
///
/// `open` returns once the engine is constructed; handshake progress is
/// reported through the returned event stream, so callers never block on
/// authentication.
#[async_trait]
pub trait EngineTransport: Clone + Send + Sync + 'static {
    type Handle: EngineHandle;

    async fn open(
        &self,
        session: EngineSession,
    ) -> EngineResult<(Arc<Self::Handle>, mpsc::Receiver<EngineEvent>)>;
}
