//! Session credential state: identity credential model, fresh-credential
//! generation, and the in-memory auth state built over the credential store.

pub mod creds;
pub mod state;

pub use creds::{
    fresh_credentials, AppStateSyncKeyData, IdentityCredentials, KeyFingerprint, KeyPair,
    SelfIdentity, SignedPreKey,
};
pub use state::{KeyAccessor, KeyCategory, KeyRecord, SessionAuthState, CREDS_KEY};
