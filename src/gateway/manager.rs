//! Connection Manager
//!
//! Owns the single live engine handle and drives it through the
//! connect → authenticate → ready → disconnect → reconnect state machine.
//! Engine events are consumed by exactly one task per handle; all shared
//! state lives behind one sync lock that is never held across a suspension
//! point, so status updates are plain local mutations.
//!
//! Lifecycle failures never propagate to callers: `initialize()` resets the
//! status to `DISCONNECTED` and logs, and callers observe progress by polling
//! [`ConnectionManager::status`].

use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::MessagingConfig;
use crate::gateway::engine::{
    DisconnectReason, EngineEvent, EngineHandle, EngineResult, EngineSession, EngineTransport,
};
use crate::gateway::status::{ConnectionStatus, StatusSnapshot};
use crate::qr;
use crate::session::{SelfIdentity, SessionAuthState};
use crate::store::CredentialStore;

/// Automatic reconnect attempts allowed before manual intervention.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

struct SharedState<H> {
    /// The singleton connection handle. At most one exists at any instant.
    handle: Option<Arc<H>>,
    /// True while an `initialize()` call is between its existence check and
    /// the handle install, closing the check-then-create race.
    initializing: bool,
    status: ConnectionStatus,
    qr_image: Option<String>,
    identity: Option<SelfIdentity>,
    reconnect_attempts: u32,
    /// Bumped on every handle install, logout, and hard reset. Stale event
    /// tasks, reconnect timers, and superseded initializations compare their
    /// captured value against this and stand down.
    generation: u64,
}

impl<H> SharedState<H> {
    fn new() -> Self {
        Self {
            handle: None,
            initializing: false,
            status: ConnectionStatus::Disconnected,
            qr_image: None,
            identity: None,
            reconnect_attempts: 0,
            generation: 0,
        }
    }

    /// Drop the handle and return to the disconnected baseline. Leaves the
    /// reconnect counter and generation alone; callers decide those.
    fn clear_connection(&mut self) -> Option<Arc<H>> {
        self.status = ConnectionStatus::Disconnected;
        self.qr_image = None;
        self.identity = None;
        self.handle.take()
    }
}

enum CloseOutcome {
    LoggedOut,
    Reconnect(u32),
    Exhausted,
    Stale,
}

/// Owner of the single logical connection to the messaging network.
///
/// Cheap to clone; clones share the connection, status, and credential store.
pub struct ConnectionManager<T: EngineTransport> {
    transport: T,
    store: CredentialStore,
    config: Arc<MessagingConfig>,
    state: Arc<RwLock<SharedState<T::Handle>>>,
}

impl<T: EngineTransport> Clone for ConnectionManager<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            store: self.store.clone(),
            config: Arc::clone(&self.config),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: EngineTransport> ConnectionManager<T> {
    pub fn new(transport: T, store: CredentialStore, config: MessagingConfig) -> Self {
        Self {
            transport,
            store,
            config: Arc::new(config),
            state: Arc::new(RwLock::new(SharedState::new())),
        }
    }

    pub fn config(&self) -> &MessagingConfig {
        &self.config
    }

    /// Point-in-time status view. Never blocks, never mutates.
    pub fn status(&self) -> StatusSnapshot {
        let st = self.state.read().unwrap();
        StatusSnapshot {
            status: st.status,
            qr_image: st.qr_image.clone(),
            identity: st.identity.clone(),
            reconnect_attempts: st.reconnect_attempts,
        }
    }

    pub(crate) fn current_handle(&self) -> Option<Arc<T::Handle>> {
        self.state.read().unwrap().handle.clone()
    }

    fn current_generation(&self) -> u64 {
        self.state.read().unwrap().generation
    }

    /// Open the connection if none exists.
    ///
    /// Returns without blocking on the handshake; authentication progress
    /// arrives through engine events. A no-op while a handle exists or
    /// another initialization is in flight.
    pub async fn initialize(&self) {
        if let Err(e) = self.try_initialize().await {
            error!(error = %e, "failed to initialize messaging connection");
            let mut st = self.state.write().unwrap();
            st.status = ConnectionStatus::Disconnected;
            st.qr_image = None;
        }
    }

    async fn try_initialize(&self) -> EngineResult<()> {
        let token = {
            let mut st = self.state.write().unwrap();
            if st.handle.is_some() || st.initializing {
                debug!("connection already initialized, nothing to do");
                return Ok(());
            }
            st.initializing = true;
            st.generation
        };

        info!("initializing messaging connection");
        let auth = SessionAuthState::load(self.store.clone()).await;
        let session = EngineSession {
            auth: auth.clone(),
            connect_timeout: self.config.connect_timeout(),
            device_name: self.config.device_name.clone(),
        };

        let opened = self.transport.open(session).await;

        let (engine, events) = match opened {
            Ok(parts) => parts,
            Err(e) => {
                self.state.write().unwrap().initializing = false;
                return Err(e);
            }
        };

        let installed = {
            let mut st = self.state.write().unwrap();
            st.initializing = false;
            if st.generation == token {
                st.generation += 1;
                st.handle = Some(Arc::clone(&engine));
                Some(st.generation)
            } else {
                // logout() or hard_reset() ran while the engine was opening;
                // the last writer of status wins.
                None
            }
        };

        match installed {
            Some(session_generation) => {
                self.spawn_event_loop(auth, events, session_generation);
                Ok(())
            }
            None => {
                warn!("initialization superseded, discarding new connection");
                engine.terminate("superseded").await;
                Ok(())
            }
        }
    }

    fn spawn_event_loop(
        &self,
        auth: SessionAuthState,
        mut events: mpsc::Receiver<EngineEvent>,
        session_generation: u64,
    ) {
        let mgr = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if mgr.current_generation() != session_generation {
                    debug!("session superseded, dropping remaining engine events");
                    break;
                }
                match event {
                    EngineEvent::PairingChallenge(raw) => {
                        info!("pairing challenge received");
                        // Render failure keeps QR_PENDING: the challenge is
                        // still outstanding from the network's perspective.
                        let image = qr::render_pairing_qr(&raw);
                        let mut st = mgr.state.write().unwrap();
                        st.status = ConnectionStatus::QrPending;
                        st.qr_image = image;
                    }
                    EngineEvent::CredentialsChanged => {
                        debug!("credentials changed, persisting");
                        auth.save_identity().await;
                    }
                    EngineEvent::Authenticated => {
                        info!("session authenticated");
                        mgr.state.write().unwrap().status = ConnectionStatus::Authenticated;
                    }
                    EngineEvent::AuthFailure(message) => {
                        error!(%message, "authentication failure");
                        mgr.state.write().unwrap().status = ConnectionStatus::Disconnected;
                    }
                    EngineEvent::Opened(mut identity) => {
                        info!(address = %identity.address, "connection open");
                        if identity.display_name.is_empty() {
                            identity.display_name = mgr.config.device_name.clone();
                        }
                        let mut st = mgr.state.write().unwrap();
                        st.status = ConnectionStatus::Connected;
                        st.qr_image = None;
                        st.identity = Some(identity);
                        st.reconnect_attempts = 0;
                    }
                    EngineEvent::Closed(reason) => {
                        mgr.on_closed(reason, session_generation);
                        break;
                    }
                }
            }
        });
    }

    fn on_closed(&self, reason: DisconnectReason, session_generation: u64) {
        let outcome = {
            let mut st = self.state.write().unwrap();
            if st.generation != session_generation {
                CloseOutcome::Stale
            } else {
                st.clear_connection();
                match reason {
                    DisconnectReason::LoggedOut => CloseOutcome::LoggedOut,
                    DisconnectReason::ConnectionLost(why) => {
                        if st.reconnect_attempts < MAX_RECONNECT_ATTEMPTS {
                            st.reconnect_attempts += 1;
                            warn!(
                                reason = %why,
                                attempt = st.reconnect_attempts,
                                max = MAX_RECONNECT_ATTEMPTS,
                                "connection closed"
                            );
                            CloseOutcome::Reconnect(st.reconnect_attempts)
                        } else {
                            warn!(reason = %why, "connection closed");
                            CloseOutcome::Exhausted
                        }
                    }
                }
            }
        };

        match outcome {
            CloseOutcome::Stale => debug!("stale close event ignored"),
            CloseOutcome::LoggedOut => info!("logged out, automatic reconnect disabled"),
            CloseOutcome::Reconnect(attempt) => {
                self.schedule_reconnect(session_generation, attempt)
            }
            CloseOutcome::Exhausted => {
                error!(
                    max = MAX_RECONNECT_ATTEMPTS,
                    "reconnect attempts exhausted, manual initialization required"
                );
            }
        }
    }

    fn schedule_reconnect(&self, session_generation: u64, attempt: u32) {
        let mgr = self.clone();
        let delay = self.config.reconnect_delay();
        info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // A successful reconnect bumps the generation, so duplicate
            // timers from racing close events fire at most one initialize.
            if mgr.current_generation() != session_generation {
                debug!("reconnect cancelled, session superseded");
                return;
            }
            info!(attempt, "attempting automatic reconnect");
            mgr.initialize().await;
        });
    }

    /// Log out and clear the local session.
    ///
    /// Always succeeds from the caller's perspective: local state is cleared
    /// first, and a failed network-side logout is only logged. The session
    /// stays down until the next explicit `initialize()`.
    pub async fn logout(&self) {
        let engine = {
            let mut st = self.state.write().unwrap();
            st.generation += 1;
            st.reconnect_attempts = 0;
            st.clear_connection()
        };

        match engine {
            Some(engine) => {
                if let Err(e) = engine.logout().await {
                    warn!(error = %e, "network logout failed, local session cleared anyway");
                } else {
                    info!("logged out from messaging network");
                }
            }
            None => debug!("logout with no active connection, local state cleared"),
        }
    }

    /// Destroy the persisted session and force re-pairing from scratch.
    ///
    /// The live handle is torn down with a synthetic local reason, which
    /// never surfaces as a network close and so never enters the reconnect
    /// path. Re-initialization is scheduled after a short delay so the wipe
    /// lands in durable storage before a fresh identity is generated.
    pub async fn hard_reset(&self) {
        warn!("hard reset requested, wiping persisted session");
        let engine = {
            let mut st = self.state.write().unwrap();
            st.generation += 1;
            st.reconnect_attempts = 0;
            st.clear_connection()
        };

        if let Some(engine) = engine {
            engine.terminate("hard reset").await;
        }

        self.store.wipe_all().await;

        let mgr = self.clone();
        let delay = self.config.reset_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            mgr.initialize().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::MockTransport;
    use std::path::PathBuf;
    use tempfile::TempDir;

    async fn test_manager() -> (TempDir, MockTransport, ConnectionManager<MockTransport>) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(&dir.path().join("session.db"))
            .await
            .unwrap();
        let transport = MockTransport::new();
        let mut config = MessagingConfig::new(PathBuf::from("unused"));
        config.reconnect_delay_ms = 20;
        config.reset_delay_ms = 20;
        let manager = ConnectionManager::new(transport.clone(), store, config);
        (dir, transport, manager)
    }

    #[tokio::test]
    async fn test_initial_status_is_disconnected() {
        let (_dir, _transport, manager) = test_manager().await;

        let snapshot = manager.status();
        assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
        assert!(snapshot.qr_image.is_none());
        assert!(snapshot.identity.is_none());
        assert_eq!(snapshot.reconnect_attempts, 0);
    }

    #[tokio::test]
    async fn test_initialize_failure_resets_status() {
        let (_dir, transport, manager) = test_manager().await;
        transport.fail_next_open("engine unavailable");

        manager.initialize().await;

        assert_eq!(manager.status().status, ConnectionStatus::Disconnected);
        assert!(manager.current_handle().is_none());
    }

    #[tokio::test]
    async fn test_initialize_failure_allows_retry() {
        let (_dir, transport, manager) = test_manager().await;
        transport.fail_next_open("engine unavailable");

        manager.initialize().await;
        manager.initialize().await;

        assert_eq!(transport.open_count(), 2);
        assert!(manager.current_handle().is_some());
    }

    #[tokio::test]
    async fn test_logout_without_connection_succeeds() {
        let (_dir, transport, manager) = test_manager().await;

        manager.logout().await;

        assert_eq!(manager.status().status, ConnectionStatus::Disconnected);
        assert_eq!(transport.open_count(), 0);
    }
}
