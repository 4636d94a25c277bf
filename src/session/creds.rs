//! Identity credential model.
//!
//! The identity credential is the opaque cryptographic state the protocol
//! engine needs to resume an authenticated session without a fresh pairing
//! challenge. We own its persistence shape (JSON under the `creds` key) but
//! never interpret the key material ourselves.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// A public/private key pair as raw bytes.
///
/// The private half is wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct KeyPair {
    pub public: Vec<u8>,
    pub private: Vec<u8>,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(&self.public))
            .field("private", &"<redacted>")
            .finish()
    }
}

/// Pre-key signed by the identity key at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPreKey {
    pub key_pair: KeyPair,
    pub signature: Vec<u8>,
    pub key_id: u32,
}

/// The account identity behind a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfIdentity {
    /// Protocol-level self address (e.g. `923001234567@s.whatsapp.net`).
    pub address: String,
    /// Display name advertised to chat peers.
    pub display_name: String,
    /// Label for the transport the session runs over.
    pub transport: String,
}

/// Durable identity credential set.
///
/// Created once by [`fresh_credentials`] when nothing is persisted, then
/// mutated only by the protocol engine and re-persisted on every
/// credentials-changed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityCredentials {
    pub noise_key: KeyPair,
    pub signed_identity_key: KeyPair,
    pub signed_pre_key: SignedPreKey,
    pub registration_id: u32,
    #[serde(default)]
    pub me: Option<SelfIdentity>,
}

/// Typed representation of an app-state sync key record.
///
/// The engine validates this shape internally; handing it a raw JSON blob for
/// this category breaks that validation, so the key accessor rehydrates every
/// record of this category before returning it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStateSyncKeyData {
    #[serde(default)]
    pub key_data: Option<Vec<u8>>,
    #[serde(default)]
    pub fingerprint: Option<KeyFingerprint>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFingerprint {
    #[serde(default)]
    pub raw_id: Option<u32>,
    #[serde(default)]
    pub current_index: Option<u32>,
    #[serde(default)]
    pub device_indexes: Vec<u32>,
}

fn random_key_pair() -> KeyPair {
    let mut public = vec![0u8; 32];
    let mut private = vec![0u8; 32];
    OsRng.fill_bytes(&mut public);
    OsRng.fill_bytes(&mut private);
    KeyPair { public, private }
}

/// Generate a fresh identity credential set.
///
/// Key material is random; the registration id is a 14-bit value per the
/// protocol's registration scheme. The result is not persisted until the
/// first credentials-changed event triggers a save.
pub fn fresh_credentials() -> IdentityCredentials {
    let mut signature = vec![0u8; 64];
    OsRng.fill_bytes(&mut signature);

    IdentityCredentials {
        noise_key: random_key_pair(),
        signed_identity_key: random_key_pair(),
        signed_pre_key: SignedPreKey {
            key_pair: random_key_pair(),
            signature,
            key_id: 1,
        },
        registration_id: OsRng.next_u32() & 0x3fff,
        me: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_credentials_are_unique() {
        let a = fresh_credentials();
        let b = fresh_credentials();

        assert_ne!(a.noise_key, b.noise_key);
        assert_ne!(a.signed_identity_key, b.signed_identity_key);
        assert_ne!(a.signed_pre_key.key_pair, b.signed_pre_key.key_pair);
    }

    #[test]
    fn test_registration_id_is_14_bit() {
        for _ in 0..64 {
            assert!(fresh_credentials().registration_id <= 0x3fff);
        }
    }

    #[test]
    fn test_fresh_credentials_have_no_identity() {
        assert!(fresh_credentials().me.is_none());
    }

    #[test]
    fn test_credentials_serde_roundtrip() {
        let mut creds = fresh_credentials();
        creds.me = Some(SelfIdentity {
            address: "923001234567@s.whatsapp.net".to_string(),
            display_name: "Pharmacy".to_string(),
            transport: "web".to_string(),
        });

        let value = serde_json::to_value(&creds).unwrap();
        let decoded: IdentityCredentials = serde_json::from_value(value).unwrap();

        assert_eq!(decoded, creds);
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let pair = random_key_pair();
        let rendered = format!("{:?}", pair);

        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&hex::encode(&pair.private)));
    }

    #[test]
    fn test_app_state_sync_key_decodes_from_sparse_json() {
        let value = serde_json::json!({ "keyData": [1, 2, 3] });

        let decoded: AppStateSyncKeyData = serde_json::from_value(value).unwrap();

        assert_eq!(decoded.key_data, Some(vec![1, 2, 3]));
        assert!(decoded.fingerprint.is_none());
        assert!(decoded.timestamp.is_none());
    }
}
