//! Message Dispatcher
//!
//! Turns a caller-supplied phone number and text into a network-normalized
//! send against the active connection, with classified failure reporting.
//! This is the only surface that raises errors directly to callers.

use tracing::{debug, info, warn};

use crate::gateway::engine::{
    ChatAddress, EngineError, EngineHandle, EngineTransport, GatewayError, SendOptions,
};
use crate::gateway::manager::ConnectionManager;

/// Result of a successful send: the address the message went to plus the
/// engine's response, echoed opaquely (no schema ownership).
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub address: ChatAddress,
    pub response: serde_json::Value,
}

/// Caller-facing send surface over a [`ConnectionManager`].
pub struct MessageDispatcher<T: EngineTransport> {
    manager: ConnectionManager<T>,
}

impl<T: EngineTransport> MessageDispatcher<T> {
    pub fn new(manager: ConnectionManager<T>) -> Self {
        Self { manager }
    }

    /// Send `text` to `raw_number`.
    ///
    /// Fails fast when no connection exists or the session is not in a
    /// usable state; initialization is asynchronous, so a same-call
    /// initialize-then-send would race it. Callers are expected to retry
    /// shortly after initializing.
    pub async fn send(&self, raw_number: &str, text: &str) -> Result<SendReceipt, GatewayError> {
        let status = self.manager.status().status;
        debug!(number = raw_number, %status, "attempting to send message");

        let handle = self
            .manager
            .current_handle()
            .ok_or(GatewayError::NotInitialized)?;
        if !status.is_usable() {
            return Err(GatewayError::NotReady(status));
        }

        let digits = normalize_number(raw_number, &self.manager.config().country_code);

        // Resolution is flaky on some engines, so an unresolvable or
        // unregistered number degrades to manual address construction
        // instead of failing the send.
        let address = match handle.resolve_address(&digits).await {
            Ok(Some(address)) => address,
            Ok(None) => {
                warn!(%digits, "number does not appear to be registered, using manual address");
                ChatAddress::unverified(&digits)
            }
            Err(e) => {
                warn!(%digits, error = %e, "address lookup failed, using manual address");
                ChatAddress::unverified(&digits)
            }
        };

        match handle
            .send_text(&address, text, SendOptions { mark_seen: false })
            .await
        {
            Ok(response) => {
                info!(%address, "message sent");
                Ok(SendReceipt { address, response })
            }
            Err(e) => Err(classify_send_failure(e)),
        }
    }
}

/// Map an engine-level send failure onto a humanized caller-facing error.
fn classify_send_failure(err: EngineError) -> GatewayError {
    let message = match err {
        EngineError::Send(m) => m,
        other => other.to_string(),
    };

    if message.contains("markedUnread") {
        // Known-unstable engine condition: the chat session itself is in a
        // bad state and only re-pairing clears it.
        GatewayError::SessionUnstable
    } else if message == "t" {
        GatewayError::SessionTimeout
    } else {
        GatewayError::Send(message)
    }
}

/// Normalize a caller-supplied phone number into bare digits with the
/// configured country code applied.
///
/// A leading national trunk `0` is replaced by the country code; a bare
/// 10-digit local number is prefixed with it; a number already starting with
/// the country code and longer than 10 digits passes through. Best-effort
/// heuristic, not validation.
pub fn normalize_number(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with(country_code) && digits.len() > 10 {
        digits
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("{country_code}{rest}")
    } else if digits.len() == 10 {
        format!("{country_code}{digits}")
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_formatting_characters() {
        assert_eq!(normalize_number("+92 (300) 123-4567", "92"), "923001234567");
    }

    #[test]
    fn test_normalize_replaces_trunk_prefix() {
        assert_eq!(normalize_number("0300 1234567", "92"), "923001234567");
    }

    #[test]
    fn test_normalize_prefixes_bare_local_number() {
        assert_eq!(normalize_number("3001234567", "92"), "923001234567");
    }

    #[test]
    fn test_normalize_leaves_prefixed_number_unchanged() {
        assert_eq!(normalize_number("923001234567", "92"), "923001234567");
    }

    #[test]
    fn test_normalize_respects_configured_country_code() {
        assert_eq!(normalize_number("0612345678", "31"), "31612345678");
    }

    #[test]
    fn test_normalize_passes_through_other_shapes() {
        // Neither trunk-prefixed, 10 digits, nor country-prefixed: left as-is.
        assert_eq!(normalize_number("44123456789012", "92"), "44123456789012");
    }

    #[test]
    fn test_classify_marked_unread_is_session_unstable() {
        let err = EngineError::Send(
            "Evaluation failed: TypeError: Cannot read properties of undefined \
             (reading 'markedUnread')"
                .to_string(),
        );

        assert!(matches!(
            classify_send_failure(err),
            GatewayError::SessionUnstable
        ));
    }

    #[test]
    fn test_classify_bare_t_is_session_timeout() {
        let err = EngineError::Send("t".to_string());

        assert!(matches!(
            classify_send_failure(err),
            GatewayError::SessionTimeout
        ));
    }

    #[test]
    fn test_classify_other_failures_keep_their_message() {
        let err = EngineError::Send("rate limited".to_string());

        match classify_send_failure(err) {
            GatewayError::Send(m) => assert_eq!(m, "rate limited"),
            other => panic!("expected Send, got {:?}", other),
        }
    }
}
