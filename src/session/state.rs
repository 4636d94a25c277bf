//! Session auth state
//!
//! In-memory view of the durable credential set: the identity credential plus
//! a lazily-read accessor for every other key category. Built from the
//! credential store at session start and handed to the protocol engine as
//! part of its configuration bundle.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::creds::{fresh_credentials, AppStateSyncKeyData, IdentityCredentials};
use crate::store::CredentialStore;

/// Store key of the identity credential record.
pub const CREDS_KEY: &str = "creds";

/// Signal key categories persisted alongside the identity credential.
///
/// Every record of a category is stored under the composite key
/// `{category}-{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCategory {
    PreKey,
    Session,
    SenderKey,
    SenderKeyMemory,
    AppStateSyncKey,
    AppStateSyncVersion,
}

impl KeyCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyCategory::PreKey => "pre-key",
            KeyCategory::Session => "session",
            KeyCategory::SenderKey => "sender-key",
            KeyCategory::SenderKeyMemory => "sender-key-memory",
            KeyCategory::AppStateSyncKey => "app-state-sync-key",
            KeyCategory::AppStateSyncVersion => "app-state-sync-version",
        }
    }
}

impl fmt::Display for KeyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn composite_key(category: KeyCategory, id: &str) -> String {
    format!("{category}-{id}")
}

/// A credential record as handed back to the protocol engine.
///
/// Most categories travel as opaque JSON; app-state sync keys must be the
/// typed representation (see [`AppStateSyncKeyData`]).
#[derive(Debug, Clone, PartialEq)]
pub enum KeyRecord {
    Raw(Value),
    AppStateSyncKey(AppStateSyncKeyData),
}

fn rehydrate(category: KeyCategory, value: Value) -> Option<KeyRecord> {
    match category {
        KeyCategory::AppStateSyncKey => match serde_json::from_value(value) {
            Ok(data) => Some(KeyRecord::AppStateSyncKey(data)),
            Err(e) => {
                warn!(%category, error = %e, "undecodable key record, treating as absent");
                None
            }
        },
        _ => Some(KeyRecord::Raw(value)),
    }
}

/// Read/write access to the non-identity key categories.
#[derive(Debug, Clone)]
pub struct KeyAccessor {
    store: CredentialStore,
}

impl KeyAccessor {
    pub fn new(store: CredentialStore) -> Self {
        Self { store }
    }

    /// Fetch the records for `ids` in `category`, one concurrent read per id.
    ///
    /// Absent and unreadable records both map to `None`; the protocol treats
    /// each key independently, so there is no ordering between the reads.
    pub async fn get(
        &self,
        category: KeyCategory,
        ids: &[String],
    ) -> HashMap<String, Option<KeyRecord>> {
        let fetches: Vec<_> = ids
            .iter()
            .map(|id| {
                let store = self.store.clone();
                let key = composite_key(category, id);
                let id = id.clone();
                async move {
                    let record = store.read(&key).await.and_then(|v| rehydrate(category, v));
                    (id, record)
                }
            })
            .collect();

        join_all(fetches).await.into_iter().collect()
    }

    /// Apply a batch of key updates: present values are written, null/absent
    /// values delete the record.
    ///
    /// All leaf operations run concurrently. The batch is not atomic: a
    /// partial failure leaves some keys written and others not, and each key
    /// is independently idempotent and recoverable on the next fetch.
    pub async fn set(&self, updates: HashMap<KeyCategory, HashMap<String, Option<Value>>>) {
        let mut ops = Vec::new();
        for (category, entries) in updates {
            for (id, value) in entries {
                let store = self.store.clone();
                let key = composite_key(category, &id);
                ops.push(async move {
                    match value {
                        Some(v) if !v.is_null() => store.write(&key, &v).await,
                        _ => store.delete(&key).await,
                    }
                });
            }
        }
        join_all(ops).await;
    }
}

/// The loaded session state: identity credential plus key accessor.
///
/// Cloning shares the underlying credential cell, so the engine's mutations
/// are visible to [`SessionAuthState::save_identity`]. Owned by the active
/// connection and rebuilt on every full re-initialization.
#[derive(Debug, Clone)]
pub struct SessionAuthState {
    creds: Arc<RwLock<IdentityCredentials>>,
    keys: KeyAccessor,
    store: CredentialStore,
}

impl SessionAuthState {
    /// Load the identity credential from the store, synthesizing a fresh one
    /// when nothing usable is persisted. Fresh credentials stay in memory
    /// until the first [`save_identity`](Self::save_identity).
    pub async fn load(store: CredentialStore) -> Self {
        let creds = match store.read(CREDS_KEY).await {
            Some(value) => match serde_json::from_value(value) {
                Ok(creds) => {
                    debug!("restored persisted identity credentials");
                    creds
                }
                Err(e) => {
                    warn!(error = %e, "persisted credentials unreadable, generating fresh identity");
                    fresh_credentials()
                }
            },
            None => {
                info!("no persisted credentials, generating fresh identity");
                fresh_credentials()
            }
        };

        Self {
            creds: Arc::new(RwLock::new(creds)),
            keys: KeyAccessor::new(store.clone()),
            store,
        }
    }

    pub fn keys(&self) -> &KeyAccessor {
        &self.keys
    }

    /// Snapshot of the current identity credential.
    pub async fn credentials(&self) -> IdentityCredentials {
        self.creds.read().await.clone()
    }

    /// Mutate the identity credential in place.
    ///
    /// Engine-facing: the protocol engine updates key material here and then
    /// emits a credentials-changed event so the manager persists it.
    pub async fn update_credentials<F>(&self, mutate: F)
    where
        F: FnOnce(&mut IdentityCredentials),
    {
        mutate(&mut *self.creds.write().await);
    }

    /// Persist the identity credential under its fixed key.
    ///
    /// Encode or write failures are logged and swallowed; persistence must
    /// never block the event-processing path.
    pub async fn save_identity(&self) {
        let creds = self.creds.read().await.clone();
        match serde_json::to_value(&creds) {
            Ok(value) => self.store.write(CREDS_KEY, &value).await,
            Err(e) => error!(error = %e, "failed to encode identity credentials"),
        }
    }
}
